// ==========================================
// 选举计票系统 - 计票区结果写锁
// ==========================================
// 职责: 同一计票区结果的写操作串行执行
//       (读取事件/结果 → 工作流校验 → 追加事件 → 重建投影)
// 共享: BundleApi 与 ResultApi 持有同一个 ResultLocks
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::types::ResultId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::trace;

#[derive(Debug, Clone, Default)]
pub struct ResultLocks {
    locks: Arc<Mutex<HashMap<ResultId, Arc<Mutex<()>>>>>,
}

impl ResultLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 持有计票区结果的写锁执行 `f`
    pub fn with_lock<T>(&self, result_id: &ResultId, f: impl FnOnce() -> ApiResult<T>) -> ApiResult<T> {
        let lock = {
            let mut locks = self
                .locks
                .lock()
                .map_err(|e| ApiError::Internal(format!("result lock registry poisoned: {}", e)))?;
            locks.entry(*result_id).or_default().clone()
        };

        let _guard = lock
            .lock()
            .map_err(|e| ApiError::Internal(format!("result lock poisoned: {}", e)))?;
        trace!(result_id = %result_id, "result write lock acquired");
        f()
    }
}
