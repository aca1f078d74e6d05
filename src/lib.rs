// ==========================================
// 通用报表引擎 - 核心库
// ==========================================
// 职责: 声明式报表定义 → 排序 / 过滤 / 分页 / CSV 导出 / 批量导入
// 技术栈: Rust + SQLite (rusqlite)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 报表定义、查询描述、值类型
pub mod domain;

// 数据仓储层 - 查询源与导入存储
pub mod repository;

// 引擎层 - 排序、过滤、分页、表头、导出
pub mod engine;

// 导入层 - CSV 上传
pub mod importer;

// 配置层 - 引擎配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA 统一）
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 请求编排
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

pub use domain::{
    BucketSpec, ColumnSpec, CrossSpec, CsvDelimiter, FilterOperator, ImportSchema, OutputFormat,
    QueryParams, Record, RecordAccess, ReportDefinition, ReportKind, RequestContext, RowSpec,
    SchemaField, SortDirection, Value,
};

pub use engine::{CsvShape, CsvStream, FilterChain, Paginator, SortCodec};

pub use importer::BulkImporter;

pub use repository::{ImportStore, MemoryTable, QuerySource, SqliteTable};

pub use config::{ConfigManager, EngineConfig};

pub use api::{ApiError, ApiResult, ReportApi};

// ==========================================
// 常量定义
// ==========================================

// 库版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
