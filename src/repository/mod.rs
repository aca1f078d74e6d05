// ==========================================
// 通用报表引擎 - 数据仓储层
// ==========================================
// 红线: Repository 不含业务逻辑
// 职责: 提供记录源与引擎表的数据访问，屏蔽数据库细节
// 约束: 所有查询使用参数化，字段名经白名单校验
// ==========================================

pub mod action_log_repo;
pub mod bucket_repo;
pub mod error;
pub mod memory_source;
pub mod preference_repo;
pub mod query_source;
pub mod sql_builder;
pub mod sqlite_source;

// 重导出核心仓储
pub use action_log_repo::ActionLogRepository;
pub use bucket_repo::BucketRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use memory_source::MemoryTable;
pub use preference_repo::PreferenceRepository;
pub use query_source::{ImportStore, QuerySource, RecordStream};
pub use sqlite_source::{ColumnKind, SqliteTable, DEFAULT_BATCH_SIZE};
