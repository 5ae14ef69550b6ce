// ==========================================
// 选举计票系统 - 事件投影
// ==========================================
// 职责: 由票包事件流重建票包与计票区小计（读模型）
// 红线: 幂等 + 容忍乱序
//   - 按 (票包, 版本) 去重
//   - 按版本顺序折叠，遇到缺口暂停，等待缺失事件到达
//   - 小计每次从头推导，不做增量修补
// ==========================================

use crate::domain::bundle::{BallotSubtotal, Bundle};
use crate::domain::result::CountingCircleResult;
use crate::domain::types::{BundleId, BundleState, ResultId};
use crate::engine::bundle_workflow::evolve;
use crate::engine::events::EventEnvelope;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, trace};

/// 某计票区结果的票包投影
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultBundleProjection {
    pub reviewed_subtotal: BallotSubtotal,
    pub reviewed_bundle_count: u32,
    pub open_bundle_count: u32,
    pub deleted_bundle_count: u32,
}

#[derive(Debug, Default)]
pub struct EventProjector {
    streams: HashMap<BundleId, BTreeMap<u64, EventEnvelope>>,
}

impl EventProjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// 接收一个事件
    ///
    /// # 返回
    /// - `true`: 新事件
    /// - `false`: 重复投递（已忽略）
    pub fn apply(&mut self, envelope: EventEnvelope) -> bool {
        let stream = self.streams.entry(envelope.bundle_id).or_default();
        if stream.contains_key(&envelope.version) {
            trace!(
                bundle_id = %envelope.bundle_id,
                version = envelope.version,
                "duplicate event ignored"
            );
            return false;
        }
        stream.insert(envelope.version, envelope);
        true
    }

    /// 批量接收，返回新事件数
    pub fn apply_all(&mut self, envelopes: impl IntoIterator<Item = EventEnvelope>) -> usize {
        envelopes
            .into_iter()
            .map(|e| self.apply(e))
            .filter(|is_new| *is_new)
            .count()
    }

    pub fn event_count(&self) -> usize {
        self.streams.values().map(|s| s.len()).sum()
    }

    /// 重建单个票包（折叠到第一个版本缺口为止）
    pub fn bundle(&self, bundle_id: &BundleId) -> Option<Bundle> {
        let stream = self.streams.get(bundle_id)?;
        fold_stream(stream)
    }

    /// 某计票区结果下的全部票包（按编号排序，含已删除）
    pub fn bundles_for_result(&self, result_id: &ResultId) -> Vec<Bundle> {
        let mut bundles: Vec<Bundle> = self
            .streams
            .values()
            .filter_map(fold_stream)
            .filter(|b| &b.result_id == result_id)
            .collect();
        bundles.sort_by(|a, b| a.number.cmp(&b.number).then(a.id.cmp(&b.id)));
        bundles
    }

    /// 推导计票区结果的票包小计
    ///
    /// 只有 Reviewed 票包计入候选人/名单小计
    pub fn project_result(&self, result_id: &ResultId) -> ResultBundleProjection {
        let mut projection = ResultBundleProjection::default();

        for bundle in self.bundles_for_result(result_id) {
            match bundle.state {
                BundleState::Reviewed => {
                    projection.reviewed_subtotal.merge(&bundle.subtotal());
                    projection.reviewed_bundle_count += 1;
                }
                BundleState::Deleted => projection.deleted_bundle_count += 1,
                _ => projection.open_bundle_count += 1,
            }
        }

        debug!(
            result_id = %result_id,
            reviewed = projection.reviewed_bundle_count,
            open = projection.open_bundle_count,
            "result bundles projected"
        );
        projection
    }

    /// 将投影写入计票区结果（覆盖票包部分）
    pub fn project_into(&self, result: &mut CountingCircleResult) {
        let projection = self.project_result(&result.id);
        result.reviewed_bundles = projection.reviewed_subtotal;
        result.open_bundle_count = projection.open_bundle_count;
    }
}

fn fold_stream(stream: &BTreeMap<u64, EventEnvelope>) -> Option<Bundle> {
    let mut state: Option<Bundle> = None;
    let mut expected = 1;
    for (version, envelope) in stream {
        if *version != expected {
            trace!(
                bundle_id = %envelope.bundle_id,
                expected,
                found = version,
                "version gap, waiting for missing events"
            );
            break;
        }
        state = evolve(state, envelope);
        expected += 1;
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::bundle::Ballot;
    use crate::engine::events::BundleEvent;
    use uuid::Uuid;

    const RESULT: u128 = 10;

    fn stream(bundle: u128, candidate: u128, reviewed: bool) -> Vec<EventEnvelope> {
        let bundle_id = Uuid::from_u128(bundle);
        let result_id = Uuid::from_u128(RESULT);
        let mut events = vec![
            EventEnvelope::new(
                bundle_id,
                result_id,
                1,
                "c",
                BundleEvent::Created { number: bundle as u32, list_id: None, created_by: "c".into() },
            ),
            EventEnvelope::new(
                bundle_id,
                result_id,
                2,
                "c",
                BundleEvent::BallotRecorded {
                    ballot: Ballot {
                        number: 1,
                        selections: vec![Uuid::from_u128(candidate)],
                        empty_vote_count: 0,
                    },
                },
            ),
            EventEnvelope::new(
                bundle_id,
                result_id,
                3,
                "c",
                BundleEvent::SubmissionFinished { sample: [1].into() },
            ),
        ];
        if reviewed {
            events.push(EventEnvelope::new(
                bundle_id,
                result_id,
                4,
                "r",
                BundleEvent::ReviewSucceeded { reviewer: "r".into() },
            ));
        }
        events
    }

    #[test]
    fn test_only_reviewed_bundles_count() {
        let mut projector = EventProjector::new();
        projector.apply_all(stream(1, 100, true));
        projector.apply_all(stream(2, 100, false));

        let projection = projector.project_result(&Uuid::from_u128(RESULT));
        assert_eq!(projection.reviewed_bundle_count, 1);
        assert_eq!(projection.open_bundle_count, 1);
        assert_eq!(projection.reviewed_subtotal.candidate_votes[&Uuid::from_u128(100)], 1);
    }

    #[test]
    fn test_replay_twice_and_shuffled_is_stable() {
        let mut events = stream(1, 100, true);
        events.extend(stream(2, 200, true));

        let mut forward = EventProjector::new();
        forward.apply_all(events.clone());

        let mut replayed = EventProjector::new();
        replayed.apply_all(events.iter().rev().cloned());
        assert_eq!(replayed.apply_all(events.clone()), 0);

        let result_id = Uuid::from_u128(RESULT);
        assert_eq!(forward.project_result(&result_id), replayed.project_result(&result_id));
        assert_eq!(replayed.event_count(), events.len());
    }

    #[test]
    fn test_gap_pauses_folding() {
        let events = stream(1, 100, true);
        let mut projector = EventProjector::new();
        projector.apply(events[0].clone());
        projector.apply(events[3].clone());
        let bundle = projector.bundle(&Uuid::from_u128(1)).unwrap();
        assert_eq!(bundle.state, BundleState::InProcess);
        assert_eq!(bundle.version, 1);

        projector.apply(events[1].clone());
        projector.apply(events[2].clone());
        assert_eq!(projector.bundle(&Uuid::from_u128(1)).unwrap().state, BundleState::Reviewed);
    }

    #[test]
    fn test_deleted_bundle_retracts_contribution() {
        let mut events = stream(1, 100, true);
        events.push(EventEnvelope::new(
            Uuid::from_u128(1),
            Uuid::from_u128(RESULT),
            5,
            "admin",
            BundleEvent::Deleted { deleted_by: "admin".into() },
        ));
        let mut projector = EventProjector::new();
        projector.apply_all(events);

        let mut result = CountingCircleResult::new(
            Uuid::from_u128(RESULT),
            Uuid::from_u128(20),
            Uuid::from_u128(30),
        );
        projector.project_into(&mut result);
        assert!(result.reviewed_bundles.candidate_votes.is_empty());
        assert_eq!(result.open_bundle_count, 0);
    }
}
