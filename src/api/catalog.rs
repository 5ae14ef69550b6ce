// ==========================================
// 选举计票系统 - 选举目录
// ==========================================
// 职责: 选举定义、选举联合、议席分配触发与定稿标记（进程内）
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::domain::political_business::{PoliticalBusiness, ProportionalElectionUnion};
use crate::domain::types::{ElectionUnionId, PoliticalBusinessId};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct CatalogState {
    businesses: BTreeMap<PoliticalBusinessId, PoliticalBusiness>,
    unions: BTreeMap<ElectionUnionId, ProportionalElectionUnion>,
    mandate_distribution_triggered: BTreeSet<PoliticalBusinessId>,
    finalized: BTreeSet<PoliticalBusinessId>,
}

#[derive(Debug, Default)]
pub struct ElectionCatalog {
    state: RwLock<CatalogState>,
}

impl ElectionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> ApiResult<RwLockReadGuard<'_, CatalogState>> {
        self.state
            .read()
            .map_err(|e| ApiError::Other(anyhow::anyhow!("election catalog lock poisoned: {}", e)))
    }

    fn write(&self) -> ApiResult<RwLockWriteGuard<'_, CatalogState>> {
        self.state
            .write()
            .map_err(|e| ApiError::Other(anyhow::anyhow!("election catalog lock poisoned: {}", e)))
    }

    pub fn register_business(&self, business: PoliticalBusiness) -> ApiResult<()> {
        self.write()?.businesses.insert(business.id, business);
        Ok(())
    }

    pub fn register_union(&self, union: ProportionalElectionUnion) -> ApiResult<()> {
        let mut state = self.write()?;
        if let Some(missing) = union
            .election_ids
            .iter()
            .find(|id| !state.businesses.contains_key(id))
        {
            return Err(ApiError::NotFound(format!("PoliticalBusiness (id={})", missing)));
        }
        state.unions.insert(union.id, union);
        Ok(())
    }

    pub fn business(&self, id: &PoliticalBusinessId) -> ApiResult<PoliticalBusiness> {
        self.read()?
            .businesses
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("PoliticalBusiness (id={})", id)))
    }

    pub fn union(&self, id: &ElectionUnionId) -> ApiResult<ProportionalElectionUnion> {
        self.read()?
            .unions
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("ProportionalElectionUnion (id={})", id)))
    }

    /// 包含该选举的选举联合
    pub fn union_of(&self, business_id: &PoliticalBusinessId) -> ApiResult<Option<ProportionalElectionUnion>> {
        Ok(self
            .read()?
            .unions
            .values()
            .find(|u| u.election_ids.contains(business_id))
            .cloned())
    }

    pub fn trigger_mandate_distribution(&self, business_id: PoliticalBusinessId) -> ApiResult<()> {
        self.write()?.mandate_distribution_triggered.insert(business_id);
        Ok(())
    }

    pub fn is_mandate_distribution_triggered(&self, business_id: &PoliticalBusinessId) -> ApiResult<bool> {
        Ok(self.read()?.mandate_distribution_triggered.contains(business_id))
    }

    pub fn mark_finalized(&self, business_id: PoliticalBusinessId) -> ApiResult<()> {
        self.write()?.finalized.insert(business_id);
        Ok(())
    }

    pub fn is_finalized(&self, business_id: &PoliticalBusinessId) -> ApiResult<bool> {
        Ok(self.read()?.finalized.contains(business_id))
    }

    /// 上游结果变化后撤销触发与定稿
    pub fn reset_distribution(&self, business_id: &PoliticalBusinessId) -> ApiResult<bool> {
        let mut state = self.write()?;
        let triggered = state.mandate_distribution_triggered.remove(business_id);
        let finalized = state.finalized.remove(business_id);
        Ok(triggered || finalized)
    }
}
