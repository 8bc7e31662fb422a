// ==========================================
// 用户导入服务 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型，把下层错误转换为用户可读的错误消息
// 映射: ValidationError → 400, NotFound → 404, Conflict → 409, 其他 → 500
// ==========================================

use crate::engine::error::SessionError;
use crate::importer::error::ImportError;
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 输入错误
    // ==========================================
    #[error("数据验证失败: {0}")]
    ValidationError(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("数据冲突: {0}")]
    Conflict(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::ValidationError(_) => 400,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            _ => 500,
        }
    }

    /// 机器可读错误码
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::ValidationError(_) => "VALIDATION_ERROR",
            ApiError::NotFound(_) => "NOT_FOUND",
            ApiError::Conflict(_) => "CONFLICT",
            ApiError::DatabaseError(_) => "DATABASE_ERROR",
            ApiError::DatabaseConnectionError(_) => "DATABASE_CONNECTION_ERROR",
            ApiError::InternalError(_) => "INTERNAL_ERROR",
            ApiError::Other(_) => "OTHER_ERROR",
        }
    }

    /// 错误标题（面向用户）
    pub fn title(&self) -> &'static str {
        match self {
            ApiError::ValidationError(_) => "请求无效",
            ApiError::NotFound(_) => "未找到",
            ApiError::Conflict(_) => "数据冲突",
            _ => "服务器错误",
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
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::Conflict(format!("唯一约束违反: {}", msg))
            }
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 ImportError 转换
// ==========================================
impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::UnsupportedFormat(_)
            | ImportError::FormatError(_)
            | ImportError::MissingColumns(_)
            | ImportError::EmptyFile => ApiError::ValidationError(err.to_string()),
            ImportError::ExportError(msg) => ApiError::InternalError(msg),
            ImportError::Other(err) => ApiError::Other(err),
        }
    }
}

// ==========================================
// 从 SessionError 转换
// ==========================================
impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(_)
            | SessionError::RowIndexOutOfRange { .. }
            | SessionError::UnknownColumn(_) => ApiError::NotFound(err.to_string()),
            SessionError::InvalidValue(_) => ApiError::ValidationError(err.to_string()),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
