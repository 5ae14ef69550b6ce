// ==========================================
// 选举计票系统 - 票包审核工作流
// ==========================================
// 职责: 命令处理 (当前状态, 命令, 上下文, 配置) → (新状态, 事件)
// 状态机:
//   InProcess → ReadyForReview → Reviewed
//   ReadyForReview → InCorrection → ReadyForReview
//   非 Reviewed 状态 → Deleted
// 红线: 创建者不能审核自己的票包
// 红线: 处理器不修改输入，任何拒绝都不产生事件
// ==========================================

use crate::config::TallyConfig;
use crate::domain::bundle::{Ballot, BallotInput, Bundle};
use crate::domain::context::ActorContext;
use crate::domain::political_business::BallotRules;
use crate::domain::result::CountingCircleResult;
use crate::domain::types::{BundleId, BundleState, ListId};
use crate::engine::ballot_validator::BallotValidator;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::events::{BundleEvent, EventEnvelope};
use crate::engine::sampling::draw_review_sample;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

// ==========================================
// 命令
// ==========================================
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BundleCommand {
    Create {
        bundle_id: BundleId,
        /// None 时由系统分配（仅自动编号）
        number: Option<u32>,
        list_id: Option<ListId>,
    },
    AddOrUpdateBallot {
        ballot: BallotInput,
    },
    DeleteBallot,
    SubmissionFinished,
    CorrectionFinished,
    RejectReview,
    SucceedReview,
    Delete,
}

impl BundleCommand {
    pub fn name(&self) -> &'static str {
        match self {
            BundleCommand::Create { .. } => "CreateBundle",
            BundleCommand::AddOrUpdateBallot { .. } => "AddOrUpdateBallot",
            BundleCommand::DeleteBallot => "DeleteBallot",
            BundleCommand::SubmissionFinished => "SubmissionFinished",
            BundleCommand::CorrectionFinished => "CorrectionFinished",
            BundleCommand::RejectReview => "RejectReview",
            BundleCommand::SucceedReview => "SucceedReview",
            BundleCommand::Delete => "DeleteBundle",
        }
    }
}

// ==========================================
// 票包编号
// ==========================================

/// 某计票区结果下的票包编号占用情况
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleNumbers {
    pub active: BTreeSet<u32>,
    pub deleted: BTreeSet<u32>,
}

impl BundleNumbers {
    pub fn from_bundles<'b>(bundles: impl IntoIterator<Item = &'b Bundle>) -> Self {
        let mut numbers = BundleNumbers::default();
        for bundle in bundles {
            if bundle.state.is_active() {
                numbers.active.insert(bundle.number);
            } else {
                numbers.deleted.insert(bundle.number);
            }
        }
        numbers
    }

    /// 分配票包编号
    ///
    /// - 自动编号: 未指定时取最小空闲编号（已删除编号可复用）
    /// - 手动编号: 必须指定，已删除编号保持占用
    pub fn allocate(&self, requested: Option<u32>, automatic: bool) -> EngineResult<u32> {
        match requested {
            Some(0) => Err(EngineError::Validation(
                "bundle number must be at least 1".to_string(),
            )),
            Some(number) => {
                let blocked = self.active.contains(&number)
                    || (!automatic && self.deleted.contains(&number));
                if blocked {
                    Err(EngineError::DuplicateBundleNumber { number })
                } else {
                    Ok(number)
                }
            }
            None if automatic => {
                let mut candidate = 1;
                while self.active.contains(&candidate) {
                    candidate += 1;
                }
                Ok(candidate)
            }
            None => Err(EngineError::Validation(
                "a bundle number is required when automatic numbering is disabled".to_string(),
            )),
        }
    }
}

// ==========================================
// 命令处理环境
// ==========================================

/// 命令处理所需的只读上下文
pub struct BundleEnvironment<'a> {
    pub result: &'a CountingCircleResult,
    pub rules: &'a BallotRules,
    pub numbers: &'a BundleNumbers,
}

/// 命令处理结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    pub bundle: Bundle,
    pub events: Vec<EventEnvelope>,
}

// ==========================================
// BundleWorkflow - 命令处理器
// ==========================================
pub struct BundleWorkflow<'a> {
    config: &'a TallyConfig,
}

impl<'a> BundleWorkflow<'a> {
    pub fn new(config: &'a TallyConfig) -> Self {
        Self { config }
    }

    /// 处理一条命令
    ///
    /// # 返回
    /// - `Ok(CommandOutcome)`: 新状态 + 需追加的事件
    /// - `Err(EngineError)`: 违反的前置条件（无任何状态变化）
    pub fn handle(
        &self,
        current: Option<&Bundle>,
        command: BundleCommand,
        ctx: &ActorContext,
        env: &BundleEnvironment<'_>,
    ) -> EngineResult<CommandOutcome> {
        let operation = command.name();

        if !ctx.can_read_circle(&env.result.counting_circle_id) {
            warn!(
                user_id = %ctx.user_id,
                counting_circle_id = %env.result.counting_circle_id,
                operation,
                "bundle command rejected: counting circle not readable"
            );
            return Err(EngineError::PermissionDenied(format!(
                "counting circle {} is not accessible for user {}",
                env.result.counting_circle_id, ctx.user_id
            )));
        }

        if !env.result.state.accepts_bundles() {
            return Err(EngineError::StateConflict {
                operation,
                state: env.result.state.to_string(),
            });
        }

        let (bundle_id, version, payload) = match (current, command) {
            (None, BundleCommand::Create { bundle_id, number, list_id }) => {
                let payload = self.create(ctx, env, number, list_id)?;
                (bundle_id, 1, payload)
            }
            (Some(bundle), BundleCommand::Create { .. }) => {
                return Err(EngineError::Validation(format!(
                    "bundle {} already exists",
                    bundle.id
                )));
            }
            (None, _) => return Err(EngineError::not_found("Bundle", "<none>")),
            (Some(bundle), command) => {
                if bundle.result_id != env.result.id {
                    return Err(EngineError::Validation(format!(
                        "bundle {} does not belong to result {}",
                        bundle.id, env.result.id
                    )));
                }
                let payload = self.transition(bundle, command, ctx, env)?;
                (bundle.id, bundle.version + 1, payload)
            }
        };

        let envelope = EventEnvelope::new(bundle_id, env.result.id, version, &ctx.user_id, payload);
        let bundle = evolve(current.cloned(), &envelope).ok_or_else(|| {
            EngineError::Validation(format!("event {} cannot be applied", envelope.payload.as_str()))
        })?;

        info!(
            bundle_id = %bundle.id,
            number = bundle.number,
            version = bundle.version,
            state = %bundle.state,
            operation,
            user_id = %ctx.user_id,
            "bundle command accepted"
        );

        Ok(CommandOutcome {
            bundle,
            events: vec![envelope],
        })
    }

    fn create(
        &self,
        ctx: &ActorContext,
        env: &BundleEnvironment<'_>,
        number: Option<u32>,
        list_id: Option<ListId>,
    ) -> EngineResult<BundleEvent> {
        if !ctx.can_enter_bundles() {
            return Err(EngineError::PermissionDenied(format!(
                "user {} may not create bundles",
                ctx.user_id
            )));
        }
        if let Some(list_id) = list_id {
            if !env.rules.list_ids.contains(&list_id) {
                return Err(EngineError::not_found("List", list_id));
            }
        }

        let number = env
            .numbers
            .allocate(number, self.config.automatic_bundle_numbering)?;

        Ok(BundleEvent::Created {
            number,
            list_id,
            created_by: ctx.user_id.clone(),
        })
    }

    fn transition(
        &self,
        bundle: &Bundle,
        command: BundleCommand,
        ctx: &ActorContext,
        env: &BundleEnvironment<'_>,
    ) -> EngineResult<BundleEvent> {
        let operation = command.name();

        match command {
            BundleCommand::Create { .. } => Err(EngineError::state_conflict(operation, bundle.state)),

            BundleCommand::AddOrUpdateBallot { ballot } => {
                ensure_state(bundle, operation, bundle.state.accepts_ballot_changes())?;
                ensure_owner(bundle, ctx)?;
                BallotValidator::new(env.rules).validate(&ballot, bundle.list_id)?;

                let number = match ballot.number {
                    Some(n) if bundle.ballots.contains_key(&n) => n,
                    Some(n) => return Err(EngineError::not_found("Ballot", n)),
                    None => bundle.next_ballot_number(),
                };

                Ok(BundleEvent::BallotRecorded {
                    ballot: Ballot {
                        number,
                        selections: ballot.selections,
                        empty_vote_count: ballot.empty_vote_count,
                    },
                })
            }

            BundleCommand::DeleteBallot => {
                ensure_state(bundle, operation, bundle.state.accepts_ballot_changes())?;
                ensure_owner(bundle, ctx)?;
                let number = bundle
                    .ballots
                    .keys()
                    .next_back()
                    .copied()
                    .ok_or_else(|| EngineError::Validation("bundle has no ballots".to_string()))?;
                Ok(BundleEvent::BallotDeleted { number })
            }

            BundleCommand::SubmissionFinished => {
                ensure_state(bundle, operation, bundle.state == BundleState::InProcess)?;
                ensure_owner(bundle, ctx)?;
                Ok(BundleEvent::SubmissionFinished {
                    sample: self.sample(bundle)?,
                })
            }

            BundleCommand::CorrectionFinished => {
                ensure_state(bundle, operation, bundle.state == BundleState::InCorrection)?;
                ensure_owner(bundle, ctx)?;
                Ok(BundleEvent::CorrectionFinished {
                    sample: self.sample(bundle)?,
                })
            }

            BundleCommand::RejectReview => {
                ensure_state(bundle, operation, bundle.state == BundleState::ReadyForReview)?;
                ensure_reviewer(bundle, ctx)?;
                Ok(BundleEvent::ReviewRejected {
                    reviewer: ctx.user_id.clone(),
                })
            }

            BundleCommand::SucceedReview => {
                ensure_state(bundle, operation, bundle.state == BundleState::ReadyForReview)?;
                ensure_reviewer(bundle, ctx)?;
                Ok(BundleEvent::ReviewSucceeded {
                    reviewer: ctx.user_id.clone(),
                })
            }

            BundleCommand::Delete => {
                ensure_state(bundle, operation, !bundle.state.is_terminal())?;
                ensure_owner(bundle, ctx)?;
                Ok(BundleEvent::Deleted {
                    deleted_by: ctx.user_id.clone(),
                })
            }
        }
    }

    fn sample(&self, bundle: &Bundle) -> EngineResult<BTreeSet<u32>> {
        if bundle.ballots.is_empty() {
            return Err(EngineError::Validation(
                "a bundle without ballots cannot be submitted".to_string(),
            ));
        }
        let numbers: BTreeSet<u32> = bundle.ballots.keys().copied().collect();
        Ok(draw_review_sample(
            &bundle.id,
            bundle.version + 1,
            &numbers,
            self.config.bundle_review_sample_size,
        ))
    }
}

fn ensure_state(bundle: &Bundle, operation: &'static str, allowed: bool) -> EngineResult<()> {
    if allowed {
        Ok(())
    } else {
        debug!(bundle_id = %bundle.id, state = %bundle.state, operation, "state conflict");
        Err(EngineError::state_conflict(operation, bundle.state))
    }
}

/// 创建者或管理员
fn ensure_owner(bundle: &Bundle, ctx: &ActorContext) -> EngineResult<()> {
    if bundle.is_created_by(&ctx.user_id) || ctx.is_admin() {
        Ok(())
    } else {
        Err(EngineError::PermissionDenied(format!(
            "only the creator or an election admin may modify bundle {}",
            bundle.number
        )))
    }
}

/// 审核员且不是创建者
fn ensure_reviewer(bundle: &Bundle, ctx: &ActorContext) -> EngineResult<()> {
    if bundle.is_created_by(&ctx.user_id) {
        warn!(bundle_id = %bundle.id, user_id = %ctx.user_id, "self review rejected");
        return Err(EngineError::PermissionDenied(
            "the creator of a bundle cannot review it".to_string(),
        ));
    }
    if !ctx.can_review() {
        return Err(EngineError::PermissionDenied(format!(
            "user {} may not review bundles",
            ctx.user_id
        )));
    }
    Ok(())
}

// ==========================================
// 事件折叠
// ==========================================

/// 将一个事件应用到票包状态上
///
/// 对不存在的票包应用非创建事件时返回 None
pub fn evolve(state: Option<Bundle>, envelope: &EventEnvelope) -> Option<Bundle> {
    let mut bundle = match (state, &envelope.payload) {
        (None, BundleEvent::Created { number, list_id, created_by }) => {
            return Some(Bundle {
                id: envelope.bundle_id,
                result_id: envelope.result_id,
                number: *number,
                list_id: *list_id,
                created_by: created_by.clone(),
                state: BundleState::InProcess,
                ballots: BTreeMap::new(),
                ballot_numbers_to_review: BTreeSet::new(),
                reviewed_by: None,
                version: envelope.version,
            });
        }
        (None, _) => return None,
        (Some(bundle), BundleEvent::Created { .. }) => return Some(bundle),
        (Some(bundle), _) => bundle,
    };

    match &envelope.payload {
        BundleEvent::Created { .. } => {}
        BundleEvent::BallotRecorded { ballot } => {
            bundle.ballots.insert(ballot.number, ballot.clone());
        }
        BundleEvent::BallotDeleted { number } => {
            bundle.ballots.remove(number);
            bundle.ballot_numbers_to_review.remove(number);
        }
        BundleEvent::SubmissionFinished { sample } | BundleEvent::CorrectionFinished { sample } => {
            bundle.state = BundleState::ReadyForReview;
            bundle.ballot_numbers_to_review = sample.clone();
        }
        BundleEvent::ReviewRejected { .. } => {
            bundle.state = BundleState::InCorrection;
        }
        BundleEvent::ReviewSucceeded { reviewer } => {
            bundle.state = BundleState::Reviewed;
            bundle.reviewed_by = Some(reviewer.clone());
        }
        BundleEvent::Deleted { .. } => {
            bundle.state = BundleState::Deleted;
        }
    }
    bundle.version = envelope.version;
    Some(bundle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::political_business::CandidateRef;
    use crate::domain::types::{CountingCircleResultState, Role};
    use uuid::Uuid;

    const CIRCLE: u128 = 50;
    const CANDIDATE: u128 = 1;

    fn result() -> CountingCircleResult {
        CountingCircleResult::new(
            Uuid::from_u128(10),
            Uuid::from_u128(20),
            Uuid::from_u128(CIRCLE),
        )
    }

    fn rules() -> BallotRules {
        let list = Uuid::from_u128(100);
        BallotRules {
            number_of_mandates: 2,
            allow_empty_votes: true,
            candidates: BTreeMap::from([(
                Uuid::from_u128(CANDIDATE),
                CandidateRef { list_id: Some(list), position: 1, max_occurrences: 1 },
            )]),
            list_ids: BTreeSet::from([list]),
        }
    }

    fn creator() -> ActorContext {
        ActorContext::new("creator", "t1", [Role::BundleCreator], [Uuid::from_u128(CIRCLE)])
    }

    fn controller() -> ActorContext {
        ActorContext::new("controller", "t1", [Role::BundleController], [Uuid::from_u128(CIRCLE)])
    }

    struct Fixture {
        config: TallyConfig,
        result: CountingCircleResult,
        rules: BallotRules,
        numbers: BundleNumbers,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                config: TallyConfig::default(),
                result: result(),
                rules: rules(),
                numbers: BundleNumbers::default(),
            }
        }

        fn run(
            &self,
            current: Option<&Bundle>,
            command: BundleCommand,
            ctx: &ActorContext,
        ) -> EngineResult<CommandOutcome> {
            let env = BundleEnvironment {
                result: &self.result,
                rules: &self.rules,
                numbers: &self.numbers,
            };
            BundleWorkflow::new(&self.config).handle(current, command, ctx, &env)
        }

        fn created(&self) -> Bundle {
            self.run(
                None,
                BundleCommand::Create { bundle_id: Uuid::from_u128(7), number: None, list_id: None },
                &creator(),
            )
            .unwrap()
            .bundle
        }

        fn with_ballot(&self) -> Bundle {
            let bundle = self.created();
            self.run(Some(&bundle), add_ballot(), &creator()).unwrap().bundle
        }

        fn submitted(&self) -> Bundle {
            let bundle = self.with_ballot();
            self.run(Some(&bundle), BundleCommand::SubmissionFinished, &creator())
                .unwrap()
                .bundle
        }
    }

    fn add_ballot() -> BundleCommand {
        BundleCommand::AddOrUpdateBallot {
            ballot: BallotInput {
                number: None,
                selections: vec![Uuid::from_u128(CANDIDATE)],
                empty_vote_count: 1,
            },
        }
    }

    #[test]
    fn test_create_allocates_smallest_free_number() {
        let mut fixture = Fixture::new();
        fixture.numbers.active = BTreeSet::from([1, 2, 4]);
        fixture.numbers.deleted = BTreeSet::from([3]);
        let bundle = fixture
            .run(
                None,
                BundleCommand::Create { bundle_id: Uuid::from_u128(7), number: None, list_id: None },
                &creator(),
            )
            .unwrap()
            .bundle;
        assert_eq!(bundle.number, 3);
        assert_eq!(bundle.state, BundleState::InProcess);
        assert_eq!(bundle.version, 1);
    }

    #[test]
    fn test_manual_numbering_blocks_deleted_numbers() {
        let numbers = BundleNumbers {
            active: BTreeSet::from([1]),
            deleted: BTreeSet::from([2]),
        };
        assert_eq!(
            numbers.allocate(Some(2), false),
            Err(EngineError::DuplicateBundleNumber { number: 2 })
        );
        assert_eq!(numbers.allocate(Some(2), true), Ok(2));
        assert_eq!(
            numbers.allocate(Some(1), true),
            Err(EngineError::DuplicateBundleNumber { number: 1 })
        );
        assert!(matches!(numbers.allocate(None, false), Err(EngineError::Validation(_))));
    }

    #[test]
    fn test_ballot_numbering_and_update() {
        let fixture = Fixture::new();
        let bundle = fixture.with_ballot();
        let bundle = fixture.run(Some(&bundle), add_ballot(), &creator()).unwrap().bundle;
        assert_eq!(bundle.ballots.keys().copied().collect::<Vec<_>>(), vec![1, 2]);

        let update = BundleCommand::AddOrUpdateBallot {
            ballot: BallotInput { number: Some(1), selections: vec![], empty_vote_count: 2 },
        };
        let updated = fixture.run(Some(&bundle), update, &creator()).unwrap().bundle;
        assert_eq!(updated.ballots[&1].empty_vote_count, 2);
        assert_eq!(updated.ballot_count(), 2);

        let missing = BundleCommand::AddOrUpdateBallot {
            ballot: BallotInput { number: Some(9), selections: vec![], empty_vote_count: 1 },
        };
        assert!(matches!(
            fixture.run(Some(&bundle), missing, &creator()),
            Err(EngineError::NotFound { .. })
        ));
    }

    #[test]
    fn test_delete_last_ballot() {
        let fixture = Fixture::new();
        let bundle = fixture.with_ballot();
        let outcome = fixture.run(Some(&bundle), BundleCommand::DeleteBallot, &creator()).unwrap();
        assert!(outcome.bundle.ballots.is_empty());
        assert!(fixture
            .run(Some(&outcome.bundle), BundleCommand::DeleteBallot, &creator())
            .is_err());
    }

    #[test]
    fn test_empty_bundle_cannot_be_submitted() {
        let fixture = Fixture::new();
        let bundle = fixture.created();
        let err = fixture
            .run(Some(&bundle), BundleCommand::SubmissionFinished, &creator())
            .unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_submission_draws_sample() {
        let fixture = Fixture::new();
        let bundle = fixture.submitted();
        assert_eq!(bundle.state, BundleState::ReadyForReview);
        assert_eq!(bundle.ballot_numbers_to_review, BTreeSet::from([1]));
    }

    #[test]
    fn test_self_review_is_rejected() {
        let fixture = Fixture::new();
        let bundle = fixture.submitted();
        let mut self_reviewer = creator();
        self_reviewer.roles.insert(Role::BundleController);
        self_reviewer.roles.insert(Role::ElectionAdmin);

        for command in [BundleCommand::SucceedReview, BundleCommand::RejectReview] {
            let err = fixture.run(Some(&bundle), command, &self_reviewer).unwrap_err();
            assert!(matches!(err, EngineError::PermissionDenied(_)));
        }
    }

    #[test]
    fn test_review_loop() {
        let fixture = Fixture::new();
        let bundle = fixture.submitted();

        let rejected = fixture
            .run(Some(&bundle), BundleCommand::RejectReview, &controller())
            .unwrap()
            .bundle;
        assert_eq!(rejected.state, BundleState::InCorrection);

        let corrected = fixture
            .run(Some(&rejected), BundleCommand::CorrectionFinished, &creator())
            .unwrap()
            .bundle;
        assert_eq!(corrected.state, BundleState::ReadyForReview);

        let reviewed = fixture
            .run(Some(&corrected), BundleCommand::SucceedReview, &controller())
            .unwrap()
            .bundle;
        assert_eq!(reviewed.state, BundleState::Reviewed);
        assert_eq!(reviewed.reviewed_by.as_deref(), Some("controller"));
        assert_eq!(reviewed.version, 6);
    }

    #[test]
    fn test_illegal_transitions_keep_state() {
        let fixture = Fixture::new();
        let in_process = fixture.with_ballot();
        let err = fixture
            .run(Some(&in_process), BundleCommand::SucceedReview, &controller())
            .unwrap_err();
        assert!(err.to_string().contains("state=IN_PROCESS"));
        assert_eq!(in_process.state, BundleState::InProcess);

        let ready = fixture.submitted();
        assert!(fixture.run(Some(&ready), add_ballot(), &creator()).is_err());
        assert!(fixture
            .run(Some(&ready), BundleCommand::CorrectionFinished, &creator())
            .is_err());

        let reviewed = fixture
            .run(Some(&ready), BundleCommand::SucceedReview, &controller())
            .unwrap()
            .bundle;
        for command in [
            BundleCommand::Delete,
            BundleCommand::DeleteBallot,
            BundleCommand::RejectReview,
            add_ballot(),
        ] {
            let err = fixture.run(Some(&reviewed), command, &creator()).unwrap_err();
            assert!(matches!(err, EngineError::StateConflict { .. }));
        }
    }

    #[test]
    fn test_delete_bundle() {
        let fixture = Fixture::new();
        let bundle = fixture.submitted();
        let deleted = fixture.run(Some(&bundle), BundleCommand::Delete, &creator()).unwrap().bundle;
        assert_eq!(deleted.state, BundleState::Deleted);
        assert!(fixture.run(Some(&deleted), BundleCommand::Delete, &creator()).is_err());
    }

    #[test]
    fn test_foreign_operator_cannot_edit() {
        let fixture = Fixture::new();
        let bundle = fixture.created();
        let other = ActorContext::new("other", "t1", [Role::BundleCreator], [Uuid::from_u128(CIRCLE)]);
        assert!(matches!(
            fixture.run(Some(&bundle), add_ballot(), &other),
            Err(EngineError::PermissionDenied(_))
        ));

        let admin = ActorContext::new("admin", "t1", [Role::ElectionAdmin], [Uuid::from_u128(CIRCLE)]);
        assert!(fixture.run(Some(&bundle), add_ballot(), &admin).is_ok());
    }

    #[test]
    fn test_wrong_tenant_is_rejected() {
        let fixture = Fixture::new();
        let outsider = ActorContext::new("x", "t2", [Role::ElectionAdmin], [Uuid::from_u128(999)]);
        let err = fixture
            .run(
                None,
                BundleCommand::Create { bundle_id: Uuid::from_u128(7), number: None, list_id: None },
                &outsider,
            )
            .unwrap_err();
        assert!(matches!(err, EngineError::PermissionDenied(_)));
    }

    #[test]
    fn test_result_state_blocks_bundles() {
        let mut fixture = Fixture::new();
        fixture.result.state = CountingCircleResultState::SubmissionDone;
        let err = fixture
            .run(
                None,
                BundleCommand::Create { bundle_id: Uuid::from_u128(7), number: None, list_id: None },
                &creator(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("SUBMISSION_DONE"));
    }

    #[test]
    fn test_evolve_ignores_events_for_unknown_bundle() {
        let envelope = EventEnvelope::new(
            Uuid::from_u128(1),
            Uuid::from_u128(2),
            2,
            "u",
            BundleEvent::BallotDeleted { number: 1 },
        );
        assert!(evolve(None, &envelope).is_none());
    }
}
