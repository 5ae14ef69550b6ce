// ==========================================
// 选举计票系统 - 调用上下文
// ==========================================
// 职责: 显式传递"当前用户/当前租户"，不使用进程级全局状态
// ==========================================

use crate::domain::types::{CountingCircleId, Role};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// ==========================================
// ActorContext - 操作者上下文
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorContext {
    pub user_id: String,
    pub tenant_id: String,
    pub roles: BTreeSet<Role>,
    /// 可读取的计票区（由权限协作方解析）
    pub readable_circles: BTreeSet<CountingCircleId>,
}

impl ActorContext {
    pub fn new(
        user_id: impl Into<String>,
        tenant_id: impl Into<String>,
        roles: impl IntoIterator<Item = Role>,
        readable_circles: impl IntoIterator<Item = CountingCircleId>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            tenant_id: tenant_id.into(),
            roles: roles.into_iter().collect(),
            readable_circles: readable_circles.into_iter().collect(),
        }
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn is_admin(&self) -> bool {
        self.has_role(Role::ElectionAdmin)
    }

    /// 审核员或管理员
    pub fn can_review(&self) -> bool {
        self.has_role(Role::BundleController) || self.is_admin()
    }

    /// 可录入票包（录入员或管理员）
    pub fn can_enter_bundles(&self) -> bool {
        self.has_role(Role::BundleCreator) || self.is_admin()
    }

    pub fn can_read_circle(&self, circle_id: &CountingCircleId) -> bool {
        self.readable_circles.contains(circle_id)
    }
}
