// ==========================================
// 通用报表引擎 - 引擎层
// ==========================================
// 职责: 排序编解码、过滤、分页、表头、CSV 导出、时间桶选择
// 红线: 引擎不拼 SQL，只产出查询描述交给记录源
// ==========================================

pub mod buckets;
pub mod csv_stream;
pub mod filter;
pub mod header;
pub mod paginator;
pub mod sort_codec;

// 重导出核心引擎
pub use buckets::{select_buckets, BucketSelection};
pub use csv_stream::{encode_lossy, CsvOptions, CsvShape, CsvStream, ExportError};
pub use filter::{active_filters, filter_editor, FilterChain, FilterError, FilterSummary, FilterWidget};
pub use header::{column_header, cross_header, row_header, ColumnHeader, CrossHeader, HeaderCell, RowHeader, SortState};
pub use paginator::{PageItem, PageLink, PageWindow, PaginationError, Paginator};
pub use sort_codec::{parse_token, SortCodec, SortDecision, SortTokenError};
