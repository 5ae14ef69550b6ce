// ==========================================
// 选举计票系统 - 结果汇总
// ==========================================
// 职责: 计票区结果 → 总结果（全部或部分计票区）
// 红线: 纯函数，不持有运行状态；可随时从头重算
// 保证: 幂等（相同输入相同输出）+ 可交换（输入顺序无关）
// 排序:
//   全部计票区完成前: 得票数降序，再按位置
//   全部计票区完成后: 名次升序，再按 id
// ==========================================

use crate::domain::bundle::BallotSubtotal;
use crate::domain::political_business::{PoliticalBusiness, PoliticalBusinessKind};
use crate::domain::result::{
    merge_voting_cards, CandidateEndResult, CountingCircleResult, EndResult, ListEndResult,
    VoterCounts,
};
use crate::domain::types::{CandidateEndResultState, CountingCircleId, ListId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// 汇总范围
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "scope", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AggregationScope {
    Full,
    /// 仅包含调用方可见的计票区
    Partial { circles: BTreeSet<CountingCircleId> },
}

impl AggregationScope {
    fn includes(&self, circle_id: &CountingCircleId) -> bool {
        match self {
            AggregationScope::Full => true,
            AggregationScope::Partial { circles } => circles.contains(circle_id),
        }
    }
}

// ==========================================
// ResultAggregator - 结果汇总器（无状态）
// ==========================================
pub struct ResultAggregator;

impl ResultAggregator {
    /// 汇总计票区结果
    ///
    /// 不属于本选举或不在范围内的计票区结果被忽略
    pub fn aggregate(
        business: &PoliticalBusiness,
        results: &[CountingCircleResult],
        scope: &AggregationScope,
    ) -> EndResult {
        let included: Vec<&CountingCircleResult> = results
            .iter()
            .filter(|r| r.political_business_id == business.id)
            .filter(|r| business.counting_circle_ids.contains(&r.counting_circle_id))
            .filter(|r| scope.includes(&r.counting_circle_id))
            .collect();

        let distinct_circles: BTreeSet<CountingCircleId> =
            included.iter().map(|r| r.counting_circle_id).collect();
        if distinct_circles.len() != included.len() {
            warn!(
                political_business_id = %business.id,
                "multiple results for the same counting circle supplied"
            );
        }

        let total_count_of_circles = match scope {
            AggregationScope::Full => business.total_circles(),
            AggregationScope::Partial { circles } => {
                circles.intersection(&business.counting_circle_ids).count() as u32
            }
        };
        let count_of_done_circles = included.iter().filter(|r| r.is_done()).count() as u32;

        let mut voting_cards = BTreeMap::new();
        let mut voter_counts = VoterCounts::default();
        let mut subtotal = BallotSubtotal::default();
        for result in &included {
            merge_voting_cards(&mut voting_cards, &result.voting_cards);
            voter_counts.merge(&result.voter_counts);
            subtotal.merge(&result.ballot_subtotal());
        }

        let partial = matches!(scope, AggregationScope::Partial { .. });
        let all_done = !partial && count_of_done_circles == total_count_of_circles;

        let (mut lists, mut candidates) = match &business.kind {
            PoliticalBusinessKind::Proportional(pe) => {
                let candidate_list: BTreeMap<_, ListId> =
                    pe.candidates.iter().map(|c| (c.id, c.list_id)).collect();
                let mut candidate_votes_per_list: BTreeMap<ListId, u64> = BTreeMap::new();
                for (candidate_id, votes) in &subtotal.candidate_votes {
                    if let Some(list_id) = candidate_list.get(candidate_id) {
                        *candidate_votes_per_list.entry(*list_id).or_insert(0) += votes;
                    }
                }

                let lists: Vec<ListEndResult> = pe
                    .lists
                    .iter()
                    .map(|l| ListEndResult {
                        list_id: l.id,
                        position: l.position,
                        unmodified_list_ballots: lookup(&subtotal.unmodified_list_ballots, &l.id),
                        candidate_votes: lookup(&candidate_votes_per_list, &l.id),
                        blank_rows: lookup(&subtotal.list_blank_rows, &l.id),
                        seats: None,
                    })
                    .collect();

                let candidates: Vec<CandidateEndResult> = pe
                    .candidates
                    .iter()
                    .map(|c| CandidateEndResult {
                        candidate_id: c.id,
                        list_id: Some(c.list_id),
                        position: c.position,
                        vote_count: lookup(&subtotal.candidate_votes, &c.id),
                        rank: None,
                        state: None,
                    })
                    .collect();
                (lists, candidates)
            }
            PoliticalBusinessKind::Majority(me) => {
                let candidates: Vec<CandidateEndResult> = me
                    .candidates
                    .iter()
                    .map(|c| CandidateEndResult {
                        candidate_id: c.id,
                        list_id: None,
                        position: c.position,
                        vote_count: lookup(&subtotal.candidate_votes, &c.id),
                        rank: None,
                        state: None,
                    })
                    .collect();
                (Vec::new(), candidates)
            }
        };

        if all_done {
            assign_ranks(&mut candidates);
            candidates.sort_by(|a, b| a.rank.cmp(&b.rank).then(a.candidate_id.cmp(&b.candidate_id)));

            let list_ranks = competition_ranks(lists.iter().map(|l| (l.list_id, l.list_votes())));
            lists.sort_by(|a, b| {
                list_ranks
                    .get(&a.list_id)
                    .cmp(&list_ranks.get(&b.list_id))
                    .then(a.list_id.cmp(&b.list_id))
            });
        } else {
            candidates.sort_by(|a, b| {
                b.vote_count
                    .cmp(&a.vote_count)
                    .then(list_position(a, &lists).cmp(&list_position(b, &lists)))
                    .then(a.position.cmp(&b.position))
                    .then(a.candidate_id.cmp(&b.candidate_id))
            });
            lists.sort_by(|a, b| {
                b.list_votes()
                    .cmp(&a.list_votes())
                    .then(a.position.cmp(&b.position))
                    .then(a.list_id.cmp(&b.list_id))
            });
        }

        debug!(
            political_business_id = %business.id,
            included = included.len(),
            done = count_of_done_circles,
            total = total_count_of_circles,
            partial,
            "end result aggregated"
        );

        EndResult {
            political_business_id: business.id,
            count_of_done_circles,
            total_count_of_circles,
            partial,
            finalized: false,
            voting_cards,
            voter_counts,
            ballot_count: subtotal.ballot_count,
            empty_votes_without_list: subtotal.empty_votes_without_list,
            lists,
            candidates,
        }
    }
}

fn lookup<K: Ord>(map: &BTreeMap<K, u64>, key: &K) -> u64 {
    map.get(key).copied().unwrap_or(0)
}

/// 竞赛排名（1,2,2,4）
fn competition_ranks<K: Ord + Copy>(entries: impl Iterator<Item = (K, u64)>) -> BTreeMap<K, u32> {
    let mut sorted: Vec<(K, u64)> = entries.collect();
    sorted.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let mut ranks = BTreeMap::new();
    let mut previous: Option<(u64, u32)> = None;
    for (index, (key, votes)) in sorted.iter().enumerate() {
        let rank = match previous {
            Some((prev_votes, prev_rank)) if prev_votes == *votes => prev_rank,
            _ => index as u32 + 1,
        };
        previous = Some((*votes, rank));
        ranks.insert(*key, rank);
    }
    ranks
}

fn assign_ranks(candidates: &mut [CandidateEndResult]) {
    let ranks = competition_ranks(candidates.iter().map(|c| (c.candidate_id, c.vote_count)));
    for candidate in candidates.iter_mut() {
        candidate.rank = ranks.get(&candidate.candidate_id).copied();
        candidate.state = Some(CandidateEndResultState::Pending);
    }
}

/// 所属名单的位置（无名单时为 0）
fn list_position(candidate: &CandidateEndResult, lists: &[ListEndResult]) -> u32 {
    candidate
        .list_id
        .and_then(|id| lists.iter().find(|l| l.list_id == id))
        .map(|l| l.position)
        .unwrap_or(0)
}
