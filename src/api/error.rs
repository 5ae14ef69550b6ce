// ==========================================
// 选举计票系统 - API层错误类型
// ==========================================
// 职责: 汇总引擎层与仓储层错误，所有拒绝必须指明违反的前置条件
// ==========================================

use crate::engine::error::{EngineError, ErrorKind};
use crate::repository::error::RepositoryError;
use thiserror::Error;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 引擎错误（校验 / 不存在 / 权限 / 前置条件）
    // ==========================================
    #[error(transparent)]
    Engine(#[from] EngineError),

    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    #[error("资源未找到: {0}")]
    NotFound(String),

    // ==========================================
    // 并发控制错误
    // ==========================================
    #[error("并发修改冲突: {0}")]
    OptimisticLockFailure(String),

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 与引擎层一致的错误分类；数据访问错误归为 None
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            ApiError::Engine(err) => Some(err.kind()),
            ApiError::InvalidInput(_) => Some(ErrorKind::Validation),
            ApiError::NotFound(_) => Some(ErrorKind::NotFound),
            ApiError::OptimisticLockFailure(_) => Some(ErrorKind::Precondition),
            ApiError::DatabaseError(_) | ApiError::Internal(_) | ApiError::Other(_) => None,
        }
    }
}

// ==========================================
// 从 RepositoryError 转换
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::OptimisticLockFailure { bundle_id, version } => {
                ApiError::OptimisticLockFailure(format!(
                    "bundle {} was modified concurrently (version {} already exists)",
                    bundle_id, version
                ))
            }
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{} (id={}) does not exist", entity, id))
            }
            RepositoryError::LockError(msg) | RepositoryError::DatabaseQueryError(msg) => {
                ApiError::DatabaseError(msg)
            }
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::DatabaseError(format!("unique constraint violated: {}", msg))
            }
            RepositoryError::Serialization(msg) => {
                ApiError::DatabaseError(format!("stored payload is unreadable: {}", msg))
            }
            RepositoryError::FieldValueError { field, message } => {
                ApiError::DatabaseError(format!("invalid stored field {}: {}", field, message))
            }
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
