// ==========================================
// 通用报表引擎 - API层错误类型
// ==========================================
// 职责: 请求级错误分类，将下层错误转换为用户可理解的消息
// 映射: BadRequest/InvalidUpload → 400, NotFound → 404, 其余 → 500
// ==========================================

use crate::config::error::ConfigError;
use crate::domain::report::ReportConfigError;
use crate::domain::types::UnsupportedDelimiter;
use crate::engine::csv_stream::ExportError;
use crate::engine::filter::FilterError;
use crate::engine::paginator::PaginationError;
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 请求错误
    // ==========================================
    #[error("请求无效: {0}")]
    BadRequest(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("上传无效: {0}")]
    InvalidUpload(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    Database(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::BadRequest(_) | ApiError::InvalidUpload(_) => 400,
            ApiError::NotFound(_) => 404,
            ApiError::Database(_) | ApiError::Internal(_) | ApiError::Other(_) => 500,
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::UnknownColumn { table, column } => {
                ApiError::BadRequest(format!("{} 不支持按字段 {} 查询", table, column))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::BadRequest(format!("字段{}错误: {}", field, message))
            }
            RepositoryError::LockError(msg) => {
                ApiError::Database(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseTransactionError(msg)
            | RepositoryError::DatabaseQueryError(msg) => ApiError::Database(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::Database(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::ForeignKeyViolation(msg) => {
                ApiError::Database(format!("外键约束违反: {}", msg))
            }
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

impl From<FilterError> for ApiError {
    fn from(err: FilterError) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<PaginationError> for ApiError {
    fn from(err: PaginationError) -> Self {
        ApiError::NotFound(err.to_string())
    }
}

impl From<UnsupportedDelimiter> for ApiError {
    fn from(err: UnsupportedDelimiter) -> Self {
        ApiError::BadRequest(err.to_string())
    }
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        match err {
            ExportError::Source(inner) => inner.into(),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Store(inner) => inner.into(),
            ImportError::CsvParseError(msg) => ApiError::InvalidUpload(msg),
            ImportError::InvalidSchema(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Database(e) => ApiError::Database(e.to_string()),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<ReportConfigError> for ApiError {
    fn from(err: ReportConfigError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let not_found: ApiError = PaginationError::OutOfRange {
            page: 5,
            total_pages: 2,
        }
        .into();
        assert_eq!(not_found.status_code(), 404);

        let bad: ApiError = UnsupportedDelimiter("tab".to_string()).into();
        assert_eq!(bad.status_code(), 400);

        let db: ApiError = RepositoryError::DatabaseQueryError("boom".to_string()).into();
        assert!(matches!(db, ApiError::Database(_)));
        assert_eq!(db.status_code(), 500);

        // 外部存储实现返回的 anyhow 错误
        let external: ApiError = RepositoryError::from(anyhow::anyhow!("disk full")).into();
        assert!(matches!(external, ApiError::Other(_)));
        assert_eq!(external.status_code(), 500);

        let schema: ApiError = ImportError::InvalidSchema("no key".to_string()).into();
        assert_eq!(schema.status_code(), 500);

        let nested: ApiError = ExportError::Source(RepositoryError::UnknownColumn {
            table: "demand".to_string(),
            column: "secret".to_string(),
        })
        .into();
        assert_eq!(nested.status_code(), 400);
    }
}
