// ==========================================
// 通用报表引擎 - 导入层
// ==========================================
// 职责: 分隔文本批量导入（新增/更新 + 操作日志）
// 支持: 逗号 / 分号分隔的 CSV 文本
// ==========================================

// 模块声明
pub mod bulk_importer;
pub mod error;
pub mod field_validator;
pub mod file_parser;
pub mod header_mapper;

// 重导出核心类型
pub use bulk_importer::{BulkImporter, DEFAULT_CHUNK_SIZE};
pub use error::{ImportError, ImportResult};
pub use field_validator::FieldValidator;
pub use file_parser::UploadParser;
pub use header_mapper::HeaderMap;
