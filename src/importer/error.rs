// ==========================================
// 通用报表引擎 - 导入模块错误类型
// ==========================================
// 工具: thiserror 派生宏
// 范围: 仅限逃逸出单行处理的错误（事务/解析）；行级问题进入 ImportOutcome
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 导入模块错误类型
#[derive(Error, Debug)]
pub enum ImportError {
    // ===== 文件相关错误 =====
    #[error("CSV 解析失败: {0}")]
    CsvParseError(String),

    #[error("导入模式无效: {0}")]
    InvalidSchema(String),

    // ===== 存储错误（事务开启/提交） =====
    #[error(transparent)]
    Store(#[from] RepositoryError),
}

// 实现 From<csv::Error>
impl From<csv::Error> for ImportError {
    fn from(err: csv::Error) -> Self {
        ImportError::CsvParseError(err.to_string())
    }
}

/// Result 类型别名
pub type ImportResult<T> = Result<T, ImportError>;
