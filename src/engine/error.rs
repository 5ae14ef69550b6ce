// ==========================================
// 选举计票系统 - 引擎层错误类型
// ==========================================
// 工具: thiserror 派生宏
// 红线: 所有拒绝必须显式给出被违反的前置条件
// ==========================================

use crate::domain::types::BundleState;
use thiserror::Error;

/// 错误类别（对外契约）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    Permission,
    Precondition,
}

/// 引擎层错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    // ===== 校验错误 =====
    #[error("当前状态不允许此操作: state={state}, operation={operation}")]
    StateConflict {
        operation: &'static str,
        state: String,
    },

    #[error("数据验证失败: {0}")]
    Validation(String),

    #[error("无效选票: {0}")]
    InvalidBallot(String),

    // ===== 资源不存在 =====
    #[error("资源未找到: {entity} id={id}")]
    NotFound { entity: &'static str, id: String },

    // ===== 权限错误 =====
    #[error("权限不足: {0}")]
    PermissionDenied(String),

    // ===== 一致性/前置条件错误 =====
    #[error("前置条件不满足: {0}")]
    Precondition(String),

    #[error("票包编号已被占用: number={number}")]
    DuplicateBundleNumber { number: u32 },

    #[error("双重比例分配未收敛: iterations={iterations}")]
    NoConvergence { iterations: u32 },
}

impl EngineError {
    pub fn state_conflict(operation: &'static str, state: BundleState) -> Self {
        EngineError::StateConflict {
            operation,
            state: state.to_string(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        EngineError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::StateConflict { .. }
            | EngineError::Validation(_)
            | EngineError::InvalidBallot(_) => ErrorKind::Validation,
            EngineError::NotFound { .. } => ErrorKind::NotFound,
            EngineError::PermissionDenied(_) => ErrorKind::Permission,
            EngineError::Precondition(_)
            | EngineError::DuplicateBundleNumber { .. }
            | EngineError::NoConvergence { .. } => ErrorKind::Precondition,
        }
    }
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;
