// ==========================================
// 通用报表引擎 - 领域模型层
// ==========================================
// 职责: 报表定义、请求参数、字段值、导入模式、操作日志、用户偏好
// 红线: 不含数据访问逻辑
// ==========================================

pub mod action_log;
pub mod import;
pub mod preference;
pub mod query;
pub mod report;
pub mod request;
pub mod types;
pub mod value;

// 重导出核心类型
pub use action_log::{AuditAction, AuditEntry};
pub use import::{
    FailureKind, FieldKind, ImportFailure, ImportOutcome, ImportSchema, ImportWarning,
    SchemaField,
};
pub use preference::UserPreference;
pub use query::{OrderDescriptor, OrderTerm, Predicate, Query};
pub use report::{
    BucketSpec, ColumnSpec, CrossSpec, Editable, ReportConfigError, ReportDefinition,
    ReportDefinitionBuilder, RowSpec, SortKey,
};
pub use request::{QueryParams, RequestContext};
pub use types::{CsvDelimiter, FilterOperator, OutputFormat, ReportKind, SortDirection};
pub use value::{Record, RecordAccess, Value};
