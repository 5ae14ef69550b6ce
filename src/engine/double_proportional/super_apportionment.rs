// ==========================================
// 双重比例 - 上层分配
// ==========================================
// 1. 行议席: 联合名单选民数上的 Sainte-Laguë（整数精确比较）
// 2. 交替缩放: 列步 / 行步交替，直到行列边际同时满足
// ==========================================

use crate::domain::apportionment::{LotDecision, LotDecisionScope, TiedEntity};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::lot_decision::{settle, Resolutions};
use rust_decimal::Decimal;
use std::cmp::Ordering;
use tracing::{debug, info};

use super::divisor::{allocate, divisor_for};

/// 决定 id: dp-super/{议席序号}
pub(super) fn decision_id(seat_number: u32) -> String {
    format!("dp-super/{}", seat_number)
}

pub(super) struct RowApportionment {
    pub seats: Vec<u32>,
    pub lot_decisions: Vec<LotDecision>,
    pub complete: bool,
}

/// 行议席分配
///
/// 只有并列数超过剩余议席时才需要抽签
pub(super) fn apportion_rows(
    keys: &[String],
    voter_numbers: &[u64],
    total_seats: u32,
    resolutions: &Resolutions,
) -> RowApportionment {
    let mut seats = vec![0u32; keys.len()];
    let mut lot_decisions = Vec::new();

    for seat_number in 1..=total_seats {
        let tied = leading_rows(voter_numbers, &seats);
        if tied.is_empty() {
            break;
        }
        let remaining = (total_seats - seat_number + 1) as usize;

        let winner = if tied.len() <= remaining {
            tied[0]
        } else {
            let decision = LotDecision::new(
                decision_id(seat_number),
                LotDecisionScope::DoubleProportionalSuper,
                seat_number,
                tied.iter()
                    .map(|i| TiedEntity {
                        entity_id: keys[*i].clone(),
                        vote_count: voter_numbers[*i],
                    })
                    .collect(),
            );
            let (decision, chosen) = settle(decision, resolutions);
            let chosen_index = chosen.and_then(|c| tied.iter().copied().find(|i| keys[*i] == c));
            lot_decisions.push(decision);
            match chosen_index {
                Some(index) => index,
                None => {
                    info!(seat_number, "union list tie requires lot decision");
                    return RowApportionment {
                        seats,
                        lot_decisions,
                        complete: false,
                    };
                }
            }
        };
        seats[winner] += 1;
    }

    RowApportionment {
        seats,
        lot_decisions,
        complete: true,
    }
}

fn leading_rows(voter_numbers: &[u64], seats: &[u32]) -> Vec<usize> {
    let mut best: Vec<usize> = Vec::new();
    for (i, votes) in voter_numbers.iter().enumerate() {
        if *votes == 0 {
            continue;
        }
        match best.first() {
            None => best.push(i),
            Some(&b) => {
                let left = u128::from(*votes) * (2 * u128::from(seats[b]) + 1);
                let right = u128::from(voter_numbers[b]) * (2 * u128::from(seats[i]) + 1);
                match left.cmp(&right) {
                    Ordering::Greater => best = vec![i],
                    Ordering::Equal => best.push(i),
                    Ordering::Less => {}
                }
            }
        }
    }
    best
}

// ==========================================
// 交替缩放
// ==========================================

pub(super) struct ScalingOutcome {
    pub seats: Vec<Vec<u32>>,
    pub row_divisors: Vec<Decimal>,
    pub col_divisors: Vec<Decimal>,
    pub iterations: u32,
}

/// 求行/列除数，使矩阵同时满足行边际与列边际
///
/// # 参数
/// - `votes`: 行 × 列 得票（无名单的单元为 0）
pub(super) fn alternate_scaling(
    votes: &[Vec<Decimal>],
    row_margins: &[u32],
    col_margins: &[u32],
    max_iterations: u32,
    scale: u32,
) -> EngineResult<ScalingOutcome> {
    let rows = row_margins.len();
    let cols = col_margins.len();
    let mut seats = vec![vec![0u32; cols]; rows];
    let mut row_divisors = vec![Decimal::ONE; rows];
    let mut col_divisors = vec![Decimal::ONE; cols];

    for iteration in 1..=max_iterations {
        // 列步: 固定行除数，逐列分配
        for j in 0..cols {
            let weights: Vec<Decimal> = (0..rows).map(|i| votes[i][j] / row_divisors[i]).collect();
            let preference: Vec<i64> = (0..rows)
                .map(|i| {
                    let others: u32 = (0..cols).filter(|k| *k != j).map(|k| seats[i][k]).sum();
                    i64::from(row_margins[i]) - i64::from(others)
                })
                .collect();
            let column = allocate(&weights, col_margins[j], &preference);
            col_divisors[j] = divisor_for(&weights, &column, scale);
            for (i, s) in column.into_iter().enumerate() {
                seats[i][j] = s;
            }
        }

        if row_sums(&seats) == row_margins {
            debug!(iteration, "alternate scaling converged after column step");
            return Ok(ScalingOutcome { seats, row_divisors, col_divisors, iterations: iteration });
        }

        // 行步: 固定列除数，逐行分配
        for i in 0..rows {
            let weights: Vec<Decimal> = (0..cols).map(|j| votes[i][j] / col_divisors[j]).collect();
            let preference: Vec<i64> = (0..cols)
                .map(|j| {
                    let others: u32 = (0..rows).filter(|k| *k != i).map(|k| seats[k][j]).sum();
                    i64::from(col_margins[j]) - i64::from(others)
                })
                .collect();
            let row = allocate(&weights, row_margins[i], &preference);
            row_divisors[i] = divisor_for(&weights, &row, scale);
            seats[i] = row;
        }

        if col_sums(&seats, cols) == col_margins {
            debug!(iteration, "alternate scaling converged after row step");
            return Ok(ScalingOutcome { seats, row_divisors, col_divisors, iterations: iteration });
        }
    }

    Err(EngineError::NoConvergence {
        iterations: max_iterations,
    })
}

fn row_sums(seats: &[Vec<u32>]) -> Vec<u32> {
    seats.iter().map(|row| row.iter().sum()).collect()
}

fn col_sums(seats: &[Vec<u32>], cols: usize) -> Vec<u32> {
    (0..cols).map(|j| seats.iter().map(|row| row[j]).sum()).collect()
}
