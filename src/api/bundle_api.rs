// ==========================================
// 选举计票系统 - 票包 API
// ==========================================
// 职责: 票包命令入口 (加载事件 → 工作流 → 追加事件 → 投影 → 通知)
// 红线: 拒绝的命令不写入任何事件
// 并发: 同一计票区结果的命令持有结果写锁串行执行（编号分配、小计投影）
//       写锁之外的写入方由事件版本乐观锁拦截
// ==========================================

use crate::api::catalog::ElectionCatalog;
use crate::api::error::{ApiError, ApiResult};
use crate::api::permission::ensure_circle_readable;
use crate::api::result_lock::ResultLocks;
use crate::config::TallyConfig;
use crate::domain::bundle::{BallotInput, Bundle};
use crate::domain::context::ActorContext;
use crate::domain::result::CountingCircleResult;
use crate::domain::types::{BundleId, ListId, ResultId};
use crate::engine::bundle_workflow::{BundleCommand, BundleEnvironment, BundleNumbers, BundleWorkflow};
use crate::engine::events::{
    ChangeKind, ChangeNotification, ChangePublisher, EventEnvelope, OptionalChangePublisher,
};
use crate::engine::projector::EventProjector;
use crate::repository::{BundleEventRepository, CountingCircleResultRepository};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

/// 一次命令在写锁内的产出
struct Dispatched {
    result: CountingCircleResult,
    bundle: Bundle,
    events: Vec<EventEnvelope>,
    affects_result: bool,
}

// ==========================================
// BundleApi - 票包 API
// ==========================================
pub struct BundleApi {
    config: TallyConfig,
    catalog: Arc<ElectionCatalog>,
    locks: ResultLocks,
    event_repo: Arc<BundleEventRepository>,
    result_repo: Arc<CountingCircleResultRepository>,
    publisher: OptionalChangePublisher,
}

impl BundleApi {
    pub fn new(
        config: TallyConfig,
        catalog: Arc<ElectionCatalog>,
        locks: ResultLocks,
        event_repo: Arc<BundleEventRepository>,
        result_repo: Arc<CountingCircleResultRepository>,
        publisher: Option<Arc<dyn ChangePublisher>>,
    ) -> Self {
        let publisher = match publisher {
            Some(p) => OptionalChangePublisher::with_publisher(p),
            None => OptionalChangePublisher::none(),
        };

        Self {
            config,
            catalog,
            locks,
            event_repo,
            result_repo,
            publisher,
        }
    }

    // ==========================================
    // 命令接口
    // ==========================================

    /// 创建票包
    ///
    /// # 参数
    /// - number: None 时由系统分配最小空闲编号
    /// - list_id: 名单票包
    pub fn create_bundle(
        &self,
        ctx: &ActorContext,
        result_id: &ResultId,
        number: Option<u32>,
        list_id: Option<ListId>,
    ) -> ApiResult<Bundle> {
        let command = BundleCommand::Create {
            bundle_id: Uuid::new_v4(),
            number,
            list_id,
        };
        self.dispatch(ctx, result_id, None, command)
    }

    pub fn add_or_update_ballot(
        &self,
        ctx: &ActorContext,
        bundle_id: &BundleId,
        ballot: BallotInput,
    ) -> ApiResult<Bundle> {
        self.execute(ctx, bundle_id, BundleCommand::AddOrUpdateBallot { ballot })
    }

    /// 删除最后一张选票
    pub fn delete_last_ballot(&self, ctx: &ActorContext, bundle_id: &BundleId) -> ApiResult<Bundle> {
        self.execute(ctx, bundle_id, BundleCommand::DeleteBallot)
    }

    pub fn submission_finished(&self, ctx: &ActorContext, bundle_id: &BundleId) -> ApiResult<Bundle> {
        self.execute(ctx, bundle_id, BundleCommand::SubmissionFinished)
    }

    pub fn correction_finished(&self, ctx: &ActorContext, bundle_id: &BundleId) -> ApiResult<Bundle> {
        self.execute(ctx, bundle_id, BundleCommand::CorrectionFinished)
    }

    pub fn reject_review(&self, ctx: &ActorContext, bundle_id: &BundleId) -> ApiResult<Bundle> {
        self.execute(ctx, bundle_id, BundleCommand::RejectReview)
    }

    pub fn succeed_review(&self, ctx: &ActorContext, bundle_id: &BundleId) -> ApiResult<Bundle> {
        self.execute(ctx, bundle_id, BundleCommand::SucceedReview)
    }

    pub fn delete_bundle(&self, ctx: &ActorContext, bundle_id: &BundleId) -> ApiResult<Bundle> {
        self.execute(ctx, bundle_id, BundleCommand::Delete)
    }

    /// 对已存在票包执行任意命令
    pub fn execute(
        &self,
        ctx: &ActorContext,
        bundle_id: &BundleId,
        command: BundleCommand,
    ) -> ApiResult<Bundle> {
        let result_id = self.locate_bundle(bundle_id)?;
        self.dispatch(ctx, &result_id, Some(bundle_id), command)
    }

    // ==========================================
    // 查询接口
    // ==========================================

    pub fn get_bundle(&self, ctx: &ActorContext, bundle_id: &BundleId) -> ApiResult<Bundle> {
        let mut projector = EventProjector::new();
        projector.apply_all(self.event_repo.load_by_bundle(bundle_id)?);
        let bundle = projector
            .bundle(bundle_id)
            .ok_or_else(|| ApiError::NotFound(format!("Bundle (id={})", bundle_id)))?;

        let result = self.load_result(&bundle.result_id)?;
        ensure_circle_readable(ctx, &result.counting_circle_id)?;
        Ok(bundle)
    }

    /// 某计票区结果下的全部票包（按编号排序，含已删除）
    pub fn list_bundles(&self, ctx: &ActorContext, result_id: &ResultId) -> ApiResult<Vec<Bundle>> {
        let result = self.load_result(result_id)?;
        ensure_circle_readable(ctx, &result.counting_circle_id)?;
        Ok(self.project(result_id)?.bundles_for_result(result_id))
    }

    /// 从事件日志重建计票区结果的票包小计
    ///
    /// 事件重复投递或乱序时结果不变
    pub fn reproject_result(&self, result_id: &ResultId) -> ApiResult<CountingCircleResult> {
        let (result, projector) = self.locks.with_lock(result_id, || {
            let projector = self.project(result_id)?;
            let result = self.result_repo.update(result_id, |r| projector.project_into(r))?;
            Ok((result, projector))
        })?;

        info!(
            result_id = %result_id,
            events = projector.event_count(),
            open_bundles = result.open_bundle_count,
            "counting circle result reprojected"
        );
        Ok(result)
    }

    // ==========================================
    // 内部流程
    // ==========================================

    fn dispatch(
        &self,
        ctx: &ActorContext,
        result_id: &ResultId,
        bundle_id: Option<&BundleId>,
        command: BundleCommand,
    ) -> ApiResult<Bundle> {
        let dispatched = self
            .locks
            .with_lock(result_id, || self.dispatch_locked(ctx, result_id, bundle_id, command))?;

        self.notify(&dispatched);
        Ok(dispatched.bundle)
    }

    /// 持有结果写锁: 读取 → 工作流 → 追加 → 从事件日志重建小计
    fn dispatch_locked(
        &self,
        ctx: &ActorContext,
        result_id: &ResultId,
        bundle_id: Option<&BundleId>,
        command: BundleCommand,
    ) -> ApiResult<Dispatched> {
        let result = self.load_result(result_id)?;
        let business = self.catalog.business(&result.political_business_id)?;
        let rules = business.ballot_rules();

        let projector = self.project(result_id)?;
        let bundles = projector.bundles_for_result(result_id);
        let numbers = BundleNumbers::from_bundles(&bundles);
        let current = match bundle_id {
            Some(id) => Some(
                projector
                    .bundle(id)
                    .ok_or_else(|| ApiError::NotFound(format!("Bundle (id={})", id)))?,
            ),
            None => None,
        };

        let env = BundleEnvironment {
            result: &result,
            rules: &rules,
            numbers: &numbers,
        };
        let outcome = BundleWorkflow::new(&self.config).handle(current.as_ref(), command, ctx, &env)?;

        self.event_repo.append(&outcome.events)?;

        let affects_result = outcome.events.iter().any(|e| e.payload.affects_aggregate());
        let result = if affects_result {
            let durable = self.project(result_id)?;
            self.result_repo.update(result_id, |r| durable.project_into(r))?
        } else {
            result
        };

        Ok(Dispatched {
            result,
            bundle: outcome.bundle,
            events: outcome.events,
            affects_result,
        })
    }

    fn notify(&self, dispatched: &Dispatched) {
        let Dispatched {
            result,
            bundle,
            events,
            affects_result,
        } = dispatched;
        let delivered = self.publisher.publish(ChangeNotification::new(
            result.political_business_id,
            Some(result.id),
            Some(bundle.id),
            ChangeKind::BundleChanged,
        ));
        if *affects_result {
            self.publisher.publish(ChangeNotification::new(
                result.political_business_id,
                Some(result.id),
                None,
                ChangeKind::CountingCircleResultChanged,
            ));
        }
        debug!(
            bundle_id = %bundle.id,
            events = events.len(),
            delivered,
            "bundle change published"
        );
    }

    fn project(&self, result_id: &ResultId) -> ApiResult<EventProjector> {
        let mut projector = EventProjector::new();
        projector.apply_all(self.event_repo.load_by_result(result_id)?);
        Ok(projector)
    }

    fn load_result(&self, result_id: &ResultId) -> ApiResult<CountingCircleResult> {
        self.result_repo
            .find_by_id(result_id)?
            .ok_or_else(|| ApiError::NotFound(format!("CountingCircleResult (id={})", result_id)))
    }

    fn locate_bundle(&self, bundle_id: &BundleId) -> ApiResult<ResultId> {
        self.event_repo
            .load_by_bundle(bundle_id)?
            .first()
            .map(|e| e.result_id)
            .ok_or_else(|| ApiError::NotFound(format!("Bundle (id={})", bundle_id)))
    }
}
