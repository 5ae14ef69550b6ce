// ==========================================
// 双重比例 - 下层分配
// ==========================================
// 单元议席直接取自交替缩放的收敛矩阵（同时满足行列边际）
// 并列: 两行 × 两列的交换 (+1/-1/-1/+1) 保持全部边际，
//       且交换前后的标准舍入同样成立时，才需要抽签
// 判定: v_a1·v_b2·(2x_b1-1)·(2x_a2-1) == v_b1·v_a2·(2x_a1+1)·(2x_b2+1)
// ==========================================

use crate::domain::apportionment::{LotDecision, LotDecisionScope, TiedEntity};
use crate::domain::types::{ListId, PoliticalBusinessId};
use crate::engine::lot_decision::{settle, Resolutions};
use std::collections::BTreeSet;
use tracing::info;

/// 决定 id: dp-sub/{选举 id}/{该选举内的并列序号}
pub(super) fn decision_id(election_id: &PoliticalBusinessId, ordinal: u32) -> String {
    format!("dp-sub/{}/{}", election_id, ordinal)
}

/// 下层分配的矩阵视图（行 = 联合名单，列 = 选举）
pub(super) struct CellMatrix<'a> {
    pub election_ids: &'a [PoliticalBusinessId],
    /// 无名单的单元为 None
    pub list_ids: &'a [Vec<Option<ListId>>],
    pub votes: &'a [Vec<u64>],
}

pub(super) struct CellApportionment {
    pub seats: Vec<Vec<u32>>,
    pub lot_decisions: Vec<LotDecision>,
    /// 抽签未决、单元议席待定的选举（列下标）
    pub pending_columns: BTreeSet<usize>,
}

/// 在收敛矩阵上检测并列交换并应用裁决
///
/// 交换按 (列对, 行对) 的字典序检查；遇到未裁决的并列即停止
pub(super) fn apportion_cells(
    matrix: &CellMatrix<'_>,
    mut seats: Vec<Vec<u32>>,
    resolutions: &Resolutions,
) -> CellApportionment {
    let rows = seats.len();
    let cols = matrix.election_ids.len();
    let mut lot_decisions = Vec::new();
    let mut ordinals = vec![0u32; cols];

    for first in 0..cols {
        for second in first + 1..cols {
            for upper in 0..rows {
                for lower in upper + 1..rows {
                    let Some((gain, lose)) =
                        tied_swap(matrix.votes, &seats, (upper, lower), (first, second))
                    else {
                        continue;
                    };
                    let (Some(gain_list), Some(lose_list)) =
                        (matrix.list_ids[gain][first], matrix.list_ids[lose][first])
                    else {
                        continue;
                    };

                    let election_id = matrix.election_ids[first];
                    ordinals[first] += 1;
                    let decision = LotDecision::new(
                        decision_id(&election_id, ordinals[first]),
                        LotDecisionScope::DoubleProportionalSub { election_id },
                        ordinals[first],
                        vec![
                            TiedEntity {
                                entity_id: gain_list.to_string(),
                                vote_count: matrix.votes[gain][first],
                            },
                            TiedEntity {
                                entity_id: lose_list.to_string(),
                                vote_count: matrix.votes[lose][first],
                            },
                        ],
                    );
                    let (decision, chosen) = settle(decision, resolutions);
                    lot_decisions.push(decision);

                    match chosen {
                        Some(chosen) if chosen == gain_list.to_string() => {
                            seats[gain][first] += 1;
                            seats[lose][first] -= 1;
                            seats[gain][second] -= 1;
                            seats[lose][second] += 1;
                        }
                        Some(_) => {}
                        None => {
                            info!(
                                %election_id,
                                other_election = %matrix.election_ids[second],
                                "list tie requires lot decision"
                            );
                            return CellApportionment {
                                seats,
                                lot_decisions,
                                pending_columns: BTreeSet::from([first, second]),
                            };
                        }
                    }
                }
            }
        }
    }

    CellApportionment {
        seats,
        lot_decisions,
        pending_columns: BTreeSet::new(),
    }
}

/// 两行两列上的并列交换
///
/// # 返回
/// - Some((gain, lose)): 在第一列中 gain 行可从 lose 行取得一席（第二列反向）
fn tied_swap(
    votes: &[Vec<u64>],
    seats: &[Vec<u32>],
    (upper, lower): (usize, usize),
    (first, second): (usize, usize),
) -> Option<(usize, usize)> {
    [(upper, lower), (lower, upper)].into_iter().find(|&(a, b)| {
        if votes[a][first] == 0 || votes[b][second] == 0 {
            return false;
        }
        if seats[b][first] == 0 || seats[a][second] == 0 {
            return false;
        }
        let left = product(&[
            u128::from(votes[a][first]),
            u128::from(votes[b][second]),
            2 * u128::from(seats[b][first]) - 1,
            2 * u128::from(seats[a][second]) - 1,
        ]);
        let right = product(&[
            u128::from(votes[b][first]),
            u128::from(votes[a][second]),
            2 * u128::from(seats[a][first]) + 1,
            2 * u128::from(seats[b][second]) + 1,
        ]);
        matches!((left, right), (Some(l), Some(r)) if l == r)
    })
}

fn product(factors: &[u128]) -> Option<u128> {
    factors.iter().try_fold(1u128, |acc, f| acc.checked_mul(*f))
}
