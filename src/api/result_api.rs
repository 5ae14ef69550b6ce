// ==========================================
// 选举计票系统 - 结果 API
// ==========================================
// 职责: 计票区结果录入与状态、总结果（完整/部分）、议席分配、抽签裁决、定稿
// 红线: 总结果每次从持久化的计票区结果整体重算
// 红线: 存在待决抽签时拒绝定稿
// ==========================================

use crate::api::catalog::ElectionCatalog;
use crate::api::error::{ApiError, ApiResult};
use crate::api::permission::{ensure_circle_readable, PermissionResolver};
use crate::api::result_lock::ResultLocks;
use crate::config::TallyConfig;
use crate::domain::apportionment::{LotDecision, LotDecisionResolution};
use crate::domain::bundle::BallotSubtotal;
use crate::domain::context::ActorContext;
use crate::domain::political_business::{PoliticalBusiness, ProportionalElectionUnion};
use crate::domain::result::{CountingCircleResult, EndResult, VoterCounts, VotingCardCount};
use crate::domain::types::{
    ApportionmentMethod, CountingCircleId, CountingCircleResultState, ElectionUnionId,
    PoliticalBusinessId, ResultId, VotingChannel,
};
use crate::engine::aggregator::{AggregationScope, ResultAggregator};
use crate::engine::error::EngineError;
use crate::engine::events::{ChangeKind, ChangeNotification, ChangePublisher, OptionalChangePublisher};
use crate::engine::lot_decision::LotDecisionRegistry;
use crate::engine::orchestrator::{
    ApportionmentOrchestrator, ApportionmentOutcome, ElectionApportionment, UnionApportionment,
};
use crate::repository::{CountingCircleResultRepository, LotDecisionRepository};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// 不经票包直接录入的计票区数据
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConventionalResultEntry {
    pub subtotal: BallotSubtotal,
    pub voting_cards: BTreeMap<VotingChannel, VotingCardCount>,
    pub voter_counts: VoterCounts,
}

/// 一次议席分配的范围与结果
///
/// Hagenbach-Bischoff 的范围是选举本身，双重比例的范围是选举联合
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopedApportionment {
    pub scope_id: Uuid,
    pub outcome: ApportionmentOutcome,
    pub end_results: Vec<EndResult>,
}

impl ScopedApportionment {
    pub fn end_result(&self, business_id: &PoliticalBusinessId) -> Option<&EndResult> {
        self.end_results
            .iter()
            .find(|r| &r.political_business_id == business_id)
    }
}

// ==========================================
// ResultApi - 结果 API
// ==========================================
pub struct ResultApi {
    catalog: Arc<ElectionCatalog>,
    locks: ResultLocks,
    result_repo: Arc<CountingCircleResultRepository>,
    lot_decision_repo: Arc<LotDecisionRepository>,
    permissions: Arc<dyn PermissionResolver>,
    orchestrator: ApportionmentOrchestrator,
    publisher: OptionalChangePublisher,
}

impl ResultApi {
    pub fn new(
        config: &TallyConfig,
        catalog: Arc<ElectionCatalog>,
        locks: ResultLocks,
        result_repo: Arc<CountingCircleResultRepository>,
        lot_decision_repo: Arc<LotDecisionRepository>,
        permissions: Arc<dyn PermissionResolver>,
        publisher: Option<Arc<dyn ChangePublisher>>,
    ) -> Self {
        let publisher = match publisher {
            Some(p) => OptionalChangePublisher::with_publisher(p),
            None => OptionalChangePublisher::none(),
        };

        Self {
            catalog,
            locks,
            result_repo,
            lot_decision_repo,
            permissions,
            orchestrator: ApportionmentOrchestrator::new(config),
            publisher,
        }
    }

    // ==========================================
    // 选举定义
    // ==========================================

    pub fn register_business(&self, business: PoliticalBusiness) -> ApiResult<()> {
        if business.number_of_mandates == 0 {
            return Err(ApiError::InvalidInput(format!(
                "political business {} must have at least one mandate",
                business.id
            )));
        }
        info!(political_business_id = %business.id, name = %business.name, "political business registered");
        self.catalog.register_business(business)
    }

    pub fn register_union(&self, union: ProportionalElectionUnion) -> ApiResult<()> {
        for election_id in &union.election_ids {
            let business = self.catalog.business(election_id)?;
            let method = business.as_proportional().map(|pe| pe.method);
            if method != Some(ApportionmentMethod::DoubleProportional) {
                return Err(ApiError::InvalidInput(format!(
                    "election {} cannot join a double proportional union",
                    election_id
                )));
            }
        }
        info!(election_union_id = %union.id, elections = union.election_ids.len(), "election union registered");
        self.catalog.register_union(union)
    }

    // ==========================================
    // 计票区结果
    // ==========================================

    /// 为计票区开立结果（状态 SubmissionOngoing）
    pub fn create_result(
        &self,
        ctx: &ActorContext,
        political_business_id: &PoliticalBusinessId,
        counting_circle_id: &CountingCircleId,
    ) -> ApiResult<CountingCircleResult> {
        let business = self.catalog.business(political_business_id)?;
        if !business.counting_circle_ids.contains(counting_circle_id) {
            return Err(ApiError::InvalidInput(format!(
                "counting circle {} does not take part in {}",
                counting_circle_id, business.id
            )));
        }
        ensure_circle_readable(ctx, counting_circle_id)?;

        let existing = self.result_repo.list_by_business(political_business_id)?;
        if existing.iter().any(|r| &r.counting_circle_id == counting_circle_id) {
            return Err(ApiError::InvalidInput(format!(
                "a result for counting circle {} already exists",
                counting_circle_id
            )));
        }

        let result = CountingCircleResult::new(Uuid::new_v4(), business.id, *counting_circle_id);
        self.result_repo.upsert(&result)?;
        info!(
            result_id = %result.id,
            political_business_id = %business.id,
            counting_circle_id = %counting_circle_id,
            "counting circle result created"
        );
        self.publish(&result, ChangeKind::CountingCircleResultChanged);
        Ok(result)
    }

    pub fn get_result(&self, ctx: &ActorContext, result_id: &ResultId) -> ApiResult<CountingCircleResult> {
        let result = self.load_result(result_id)?;
        ensure_circle_readable(ctx, &result.counting_circle_id)?;
        Ok(result)
    }

    /// 录入直接小计、投票卡与选民数（整体覆盖）
    pub fn enter_conventional_results(
        &self,
        ctx: &ActorContext,
        result_id: &ResultId,
        entry: ConventionalResultEntry,
    ) -> ApiResult<CountingCircleResult> {
        let result = self
            .locks
            .with_lock(result_id, || self.enter_conventional_locked(ctx, result_id, entry))?;

        self.publish(&result, ChangeKind::CountingCircleResultChanged);
        Ok(result)
    }

    fn enter_conventional_locked(
        &self,
        ctx: &ActorContext,
        result_id: &ResultId,
        entry: ConventionalResultEntry,
    ) -> ApiResult<CountingCircleResult> {
        let result = self.load_result(result_id)?;
        ensure_circle_readable(ctx, &result.counting_circle_id)?;
        if !ctx.can_enter_bundles() {
            return Err(EngineError::PermissionDenied(format!(
                "user {} may not enter results",
                ctx.user_id
            ))
            .into());
        }
        if !result.state.accepts_bundles() {
            return Err(EngineError::StateConflict {
                operation: "EnterConventionalResults",
                state: result.state.to_string(),
            }
            .into());
        }

        Ok(self.result_repo.update(result_id, |r| {
            r.conventional = entry.subtotal;
            r.voting_cards = entry.voting_cards;
            r.voter_counts = entry.voter_counts;
        })?)
    }

    /// 计票区结果状态迁移
    ///
    /// - 录入完成/修正完成: 录入员，且不得有未审核票包
    /// - 其余迁移（审定、核实、退回修正）: 选举管理员
    pub fn update_result_state(
        &self,
        ctx: &ActorContext,
        result_id: &ResultId,
        next: CountingCircleResultState,
    ) -> ApiResult<CountingCircleResult> {
        let (result, previous) = self.locks.with_lock(result_id, || {
            let current = self.load_result(result_id)?;
            ensure_circle_readable(ctx, &current.counting_circle_id)?;

            if !current.state.can_transition_to(next) {
                return Err(EngineError::StateConflict {
                    operation: "UpdateResultState",
                    state: current.state.to_string(),
                }
                .into());
            }

            let allowed = match next {
                CountingCircleResultState::SubmissionDone | CountingCircleResultState::CorrectionDone => {
                    ctx.can_enter_bundles()
                }
                _ => ctx.is_admin(),
            };
            if !allowed {
                return Err(EngineError::PermissionDenied(format!(
                    "user {} may not move result {} to {}",
                    ctx.user_id, current.id, next
                ))
                .into());
            }

            if next.is_done() && !current.state.is_done() && current.open_bundle_count > 0 {
                return Err(EngineError::Precondition(format!(
                    "{} bundle(s) of result {} are not reviewed yet",
                    current.open_bundle_count, current.id
                ))
                .into());
            }

            let result = self.result_repo.update(result_id, |r| r.state = next)?;
            Ok((result, current.state))
        })?;

        if previous.is_done() && !next.is_done()
            && self.catalog.reset_distribution(&result.political_business_id)?
        {
            warn!(
                political_business_id = %result.political_business_id,
                "result reopened, mandate distribution must be triggered again"
            );
        }

        info!(
            result_id = %result.id,
            from = %previous,
            to = %next,
            user_id = %ctx.user_id,
            "counting circle result state changed"
        );
        self.publish(&result, ChangeKind::CountingCircleResultChanged);
        self.publish_business(&result.political_business_id, ChangeKind::EndResultChanged);
        Ok(result)
    }

    // ==========================================
    // 总结果
    // ==========================================

    /// 完整总结果
    ///
    /// 已定稿的选举同时返回议席与当选状态
    pub fn end_result(&self, political_business_id: &PoliticalBusinessId) -> ApiResult<EndResult> {
        if self.catalog.is_finalized(political_business_id)? {
            let apportionment = self.apportion(political_business_id)?;
            let mut end_result = apportionment
                .end_result(political_business_id)
                .cloned()
                .ok_or_else(|| ApiError::NotFound(format!("EndResult (id={})", political_business_id)))?;
            end_result.finalized = true;
            return Ok(end_result);
        }
        let business = self.catalog.business(political_business_id)?;
        self.aggregate(&business, &AggregationScope::Full)
    }

    /// 调用方可见计票区的部分总结果（监控视图）
    pub async fn partial_end_result(
        &self,
        ctx: &ActorContext,
        political_business_id: &PoliticalBusinessId,
    ) -> ApiResult<EndResult> {
        let business = self.catalog.business(political_business_id)?;
        let circles = self
            .permissions
            .readable_circles(ctx, political_business_id)
            .await?;
        self.aggregate(&business, &AggregationScope::Partial { circles })
    }

    fn aggregate(&self, business: &PoliticalBusiness, scope: &AggregationScope) -> ApiResult<EndResult> {
        let results = self.result_repo.list_by_business(&business.id)?;
        Ok(ResultAggregator::aggregate(business, &results, scope))
    }

    // ==========================================
    // 议席分配
    // ==========================================

    /// 触发议席分配（全部计票区完成后由管理员执行）
    pub fn trigger_mandate_distribution(
        &self,
        ctx: &ActorContext,
        political_business_id: &PoliticalBusinessId,
    ) -> ApiResult<()> {
        ensure_admin(ctx, "trigger the mandate distribution")?;
        let end_result = self.end_result(political_business_id)?;
        if !end_result.all_circles_done() {
            return Err(EngineError::Validation(format!(
                "mandate distribution requires all counting circles to be done ({}/{})",
                end_result.count_of_done_circles, end_result.total_count_of_circles
            ))
            .into());
        }

        self.catalog.trigger_mandate_distribution(*political_business_id)?;
        info!(
            political_business_id = %political_business_id,
            user_id = %ctx.user_id,
            "mandate distribution triggered"
        );
        self.publish_business(political_business_id, ChangeKind::EndResultChanged);
        Ok(())
    }

    /// 单个选举的 Hagenbach-Bischoff 分配
    pub fn apportion_election(&self, political_business_id: &PoliticalBusinessId) -> ApiResult<ElectionApportionment> {
        let business = self.catalog.business(political_business_id)?;
        let end_result = self.aggregate(&business, &AggregationScope::Full)?;
        let triggered = self.catalog.is_mandate_distribution_triggered(&business.id)?;

        let registry = LotDecisionRegistry::from_resolutions(self.lot_decision_repo.list(&business.id)?);
        let apportionment =
            self.orchestrator
                .apportion_election(&business, &end_result, triggered, registry.resolutions())?;

        self.reconcile(&business.id, registry, &apportionment.outcome.lot_decisions)?;
        Ok(apportionment)
    }

    /// 选举联合的双重比例分配
    pub fn apportion_union(&self, union_id: &ElectionUnionId) -> ApiResult<UnionApportionment> {
        let union = self.catalog.union(union_id)?;
        let mut businesses = Vec::with_capacity(union.election_ids.len());
        let mut end_results = Vec::with_capacity(union.election_ids.len());
        let mut triggered = true;
        for election_id in &union.election_ids {
            let business = self.catalog.business(election_id)?;
            end_results.push(self.aggregate(&business, &AggregationScope::Full)?);
            triggered &= self.catalog.is_mandate_distribution_triggered(election_id)?;
            businesses.push(business);
        }

        let registry = LotDecisionRegistry::from_resolutions(self.lot_decision_repo.list(&union.id)?);
        let apportionment = self.orchestrator.apportion_union(
            &union,
            &businesses,
            &end_results,
            triggered,
            registry.resolutions(),
        )?;

        self.reconcile(&union.id, registry, &apportionment.outcome.lot_decisions)?;
        Ok(apportionment)
    }

    /// 按选举的分配方法执行分配
    pub fn apportion(&self, political_business_id: &PoliticalBusinessId) -> ApiResult<ScopedApportionment> {
        let business = self.catalog.business(political_business_id)?;
        let method = business
            .as_proportional()
            .map(|pe| pe.method)
            .ok_or_else(|| {
                ApiError::InvalidInput(format!(
                    "political business {} is not a proportional election",
                    business.id
                ))
            })?;

        match method {
            ApportionmentMethod::HagenbachBischoff => {
                let apportionment = self.apportion_election(&business.id)?;
                Ok(ScopedApportionment {
                    scope_id: business.id,
                    outcome: ApportionmentOutcome::HagenbachBischoff(apportionment.outcome),
                    end_results: vec![apportionment.end_result],
                })
            }
            ApportionmentMethod::DoubleProportional => {
                let union = self.catalog.union_of(&business.id)?.ok_or_else(|| {
                    ApiError::InvalidInput(format!(
                        "election {} is not part of an election union",
                        business.id
                    ))
                })?;
                let apportionment = self.apportion_union(&union.id)?;
                Ok(ScopedApportionment {
                    scope_id: union.id,
                    outcome: ApportionmentOutcome::DoubleProportional(apportionment.outcome),
                    end_results: apportionment.end_results,
                })
            }
        }
    }

    // ==========================================
    // 抽签
    // ==========================================

    /// 当前可用的抽签决定（含已裁决）
    pub fn lot_decisions(&self, political_business_id: &PoliticalBusinessId) -> ApiResult<Vec<LotDecision>> {
        Ok(self.apportion(political_business_id)?.outcome.lot_decisions().to_vec())
    }

    /// 裁决抽签
    ///
    /// 裁决后重新分配会得到相同的确定结果
    pub fn resolve_lot_decision(
        &self,
        ctx: &ActorContext,
        political_business_id: &PoliticalBusinessId,
        decision_id: &str,
        chosen_entity_id: &str,
    ) -> ApiResult<LotDecisionResolution> {
        let apportionment = self.apportion(political_business_id)?;
        let mut registry =
            LotDecisionRegistry::from_resolutions(self.lot_decision_repo.list(&apportionment.scope_id)?);
        let resolution = registry.resolve(
            apportionment.outcome.lot_decisions(),
            decision_id,
            chosen_entity_id,
            ctx,
        )?;
        self.lot_decision_repo.save(&apportionment.scope_id, &resolution)?;

        for end_result in &apportionment.end_results {
            self.publish_business(&end_result.political_business_id, ChangeKind::LotDecisionsChanged);
        }
        Ok(resolution)
    }

    // ==========================================
    // 定稿
    // ==========================================

    pub fn finalize(&self, ctx: &ActorContext, political_business_id: &PoliticalBusinessId) -> ApiResult<EndResult> {
        ensure_admin(ctx, "finalize end results")?;
        let apportionment = self.apportion(political_business_id)?;
        let mut end_result = apportionment
            .end_result(political_business_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("EndResult (id={})", political_business_id)))?;

        ApportionmentOrchestrator::finalize(&mut end_result, apportionment.outcome.lot_decisions())?;
        self.catalog.mark_finalized(*political_business_id)?;

        info!(
            political_business_id = %political_business_id,
            user_id = %ctx.user_id,
            "end result finalized"
        );
        self.publish_business(political_business_id, ChangeKind::EndResultChanged);
        Ok(end_result)
    }

    // ==========================================
    // 内部
    // ==========================================

    /// 丢弃并列已消失或已变化的裁决
    fn reconcile(
        &self,
        scope_id: &Uuid,
        mut registry: LotDecisionRegistry,
        available: &[LotDecision],
    ) -> ApiResult<()> {
        let stale = registry.reconcile(available);
        if !stale.is_empty() {
            let removed = self.lot_decision_repo.delete(scope_id, &stale)?;
            warn!(scope_id = %scope_id, removed, "stale lot decision resolutions removed");
        }
        Ok(())
    }

    fn load_result(&self, result_id: &ResultId) -> ApiResult<CountingCircleResult> {
        self.result_repo
            .find_by_id(result_id)?
            .ok_or_else(|| ApiError::NotFound(format!("CountingCircleResult (id={})", result_id)))
    }

    fn publish(&self, result: &CountingCircleResult, kind: ChangeKind) {
        self.publisher.publish(ChangeNotification::new(
            result.political_business_id,
            Some(result.id),
            None,
            kind,
        ));
    }

    fn publish_business(&self, political_business_id: &PoliticalBusinessId, kind: ChangeKind) {
        self.publisher
            .publish(ChangeNotification::new(*political_business_id, None, None, kind));
    }
}

fn ensure_admin(ctx: &ActorContext, action: &str) -> ApiResult<()> {
    if ctx.is_admin() {
        Ok(())
    } else {
        Err(EngineError::PermissionDenied(format!("user {} may not {}", ctx.user_id, action)).into())
    }
}
