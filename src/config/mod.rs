// ==========================================
// 通用报表引擎 - 配置层
// ==========================================
// 职责: 引擎参数与计划当前日期的读写
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod engine_config;
pub mod error;

// 重导出核心配置管理器
pub use config_manager::{config_keys, ConfigManager, GLOBAL_SCOPE};
pub use engine_config::EngineConfig;
pub use error::{ConfigError, ConfigResult};
