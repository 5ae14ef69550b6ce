// ==========================================
// 选举计票系统 - 抽签决定
// ==========================================
// 职责: 记录操作员裁决；上游票数变化后协调（失效/丢弃）裁决
// 红线: 裁决只在并列集合与裁决时一致时生效
// ==========================================

use crate::domain::apportionment::{LotDecision, LotDecisionResolution, LotDecisionState};
use crate::domain::context::ActorContext;
use crate::engine::error::{EngineError, EngineResult};
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// 决定 id → 裁决
pub type Resolutions = BTreeMap<String, LotDecisionResolution>;

/// 查找与当前并列情况匹配的裁决，返回被选中的实体
///
/// 并列集合已变化或选中实体不在其中时视为无效
pub fn matching_choice(resolutions: &Resolutions, decision: &LotDecision) -> Option<String> {
    let resolution = resolutions.get(&decision.id)?;
    if resolution.tied_entity_ids != decision.tied_ids() {
        warn!(
            decision_id = %decision.id,
            "lot decision resolution is stale: tied set changed"
        );
        return None;
    }
    if !decision.involves(&resolution.chosen_entity_id) {
        return None;
    }
    Some(resolution.chosen_entity_id.clone())
}

/// 尝试用已有裁决解决一个并列
///
/// 返回已标记状态的决定与被选中的实体（未解决时为 None）
pub fn settle(mut decision: LotDecision, resolutions: &Resolutions) -> (LotDecision, Option<String>) {
    match matching_choice(resolutions, &decision) {
        Some(chosen) => {
            decision.state = LotDecisionState::Resolved {
                chosen_entity_id: chosen.clone(),
            };
            (decision, Some(chosen))
        }
        None => (decision, None),
    }
}

// ==========================================
// LotDecisionRegistry - 裁决登记
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct LotDecisionRegistry {
    resolutions: Resolutions,
}

impl LotDecisionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_resolutions(resolutions: impl IntoIterator<Item = LotDecisionResolution>) -> Self {
        Self {
            resolutions: resolutions
                .into_iter()
                .map(|r| (r.decision_id.clone(), r))
                .collect(),
        }
    }

    pub fn resolutions(&self) -> &Resolutions {
        &self.resolutions
    }

    /// 裁决一个可用的抽签决定
    ///
    /// # 参数
    /// - `available`: 最近一次议席分配给出的决定
    /// - `decision_id`: 决定 id
    /// - `chosen_entity_id`: 获胜实体
    pub fn resolve(
        &mut self,
        available: &[LotDecision],
        decision_id: &str,
        chosen_entity_id: &str,
        ctx: &ActorContext,
    ) -> EngineResult<LotDecisionResolution> {
        if !ctx.is_admin() {
            return Err(EngineError::PermissionDenied(format!(
                "user {} may not resolve lot decisions",
                ctx.user_id
            )));
        }

        let decision = available
            .iter()
            .find(|d| d.id == decision_id)
            .ok_or_else(|| EngineError::not_found("LotDecision", decision_id))?;

        if !decision.involves(chosen_entity_id) {
            return Err(EngineError::Validation(format!(
                "entity {} is not part of lot decision {}",
                chosen_entity_id, decision_id
            )));
        }

        let resolution = LotDecisionResolution {
            decision_id: decision.id.clone(),
            tied_entity_ids: decision.tied_ids(),
            chosen_entity_id: chosen_entity_id.to_string(),
            resolved_by: ctx.user_id.clone(),
            resolved_at: Utc::now(),
        };
        self.resolutions
            .insert(resolution.decision_id.clone(), resolution.clone());

        info!(
            decision_id = %decision_id,
            chosen = %chosen_entity_id,
            user_id = %ctx.user_id,
            "lot decision resolved"
        );
        Ok(resolution)
    }

    /// 按当前可用决定协调裁决
    ///
    /// 丢弃并列已消失或并列集合已变化的裁决，返回被丢弃的 id
    pub fn reconcile(&mut self, available: &[LotDecision]) -> Vec<String> {
        let current: BTreeMap<&str, &LotDecision> =
            available.iter().map(|d| (d.id.as_str(), d)).collect();

        let stale: Vec<String> = self
            .resolutions
            .values()
            .filter(|r| match current.get(r.decision_id.as_str()) {
                Some(decision) => decision.tied_ids() != r.tied_entity_ids,
                None => true,
            })
            .map(|r| r.decision_id.clone())
            .collect();

        for id in &stale {
            self.resolutions.remove(id);
            info!(decision_id = %id, "lot decision resolution dropped");
        }
        stale
    }
}
