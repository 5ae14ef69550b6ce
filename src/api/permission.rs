// ==========================================
// 选举计票系统 - 权限/租户解析
// ==========================================
// 职责: 解析调用方可读取的计票区集合
// 用途: 部分结果的可见范围；拒绝跨租户的票包操作
// ==========================================

use crate::api::error::ApiResult;
use crate::domain::context::ActorContext;
use crate::domain::types::{CountingCircleId, PoliticalBusinessId};
use crate::engine::error::EngineError;
use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};

/// 权限解析接口（外部协作方）
#[async_trait]
pub trait PermissionResolver: Send + Sync {
    /// 调用方在某选举中可读取的计票区
    async fn readable_circles(
        &self,
        ctx: &ActorContext,
        political_business_id: &PoliticalBusinessId,
    ) -> ApiResult<BTreeSet<CountingCircleId>>;
}

/// 直接使用 ActorContext 中携带的可读计票区
#[derive(Debug, Default, Clone, Copy)]
pub struct ContextPermissionResolver;

#[async_trait]
impl PermissionResolver for ContextPermissionResolver {
    async fn readable_circles(
        &self,
        ctx: &ActorContext,
        _political_business_id: &PoliticalBusinessId,
    ) -> ApiResult<BTreeSet<CountingCircleId>> {
        Ok(ctx.readable_circles.clone())
    }
}

/// 按租户配置的静态权限表
///
/// 未登记的租户没有任何可读计票区
#[derive(Debug, Default, Clone)]
pub struct StaticPermissionResolver {
    tenants: BTreeMap<String, BTreeSet<CountingCircleId>>,
}

impl StaticPermissionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tenant(
        mut self,
        tenant_id: impl Into<String>,
        circles: impl IntoIterator<Item = CountingCircleId>,
    ) -> Self {
        self.tenants
            .entry(tenant_id.into())
            .or_default()
            .extend(circles);
        self
    }
}

#[async_trait]
impl PermissionResolver for StaticPermissionResolver {
    async fn readable_circles(
        &self,
        ctx: &ActorContext,
        _political_business_id: &PoliticalBusinessId,
    ) -> ApiResult<BTreeSet<CountingCircleId>> {
        Ok(self.tenants.get(&ctx.tenant_id).cloned().unwrap_or_default())
    }
}

/// 调用方必须能读取该计票区
pub fn ensure_circle_readable(ctx: &ActorContext, counting_circle_id: &CountingCircleId) -> ApiResult<()> {
    if ctx.can_read_circle(counting_circle_id) {
        Ok(())
    } else {
        Err(EngineError::PermissionDenied(format!(
            "counting circle {} is not accessible for user {}",
            counting_circle_id, ctx.user_id
        ))
        .into())
    }
}
