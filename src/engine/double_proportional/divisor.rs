// ==========================================
// 双重比例 - 除数法基础运算
// ==========================================
// 标准舍入（Sainte-Laguë）: 第 s+1 席的优先级为 w / (s + 0.5)
// 比较改写为 w_a × (2·s_b + 1) 与 w_b × (2·s_a + 1)
// ==========================================

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::cmp::Ordering;

fn half() -> Decimal {
    Decimal::new(5, 1)
}

pub(super) fn compare_priority(a_weight: Decimal, a_seats: u32, b_weight: Decimal, b_seats: u32) -> Ordering {
    let left = a_weight * Decimal::from(2 * u64::from(b_seats) + 1);
    let right = b_weight * Decimal::from(2 * u64::from(a_seats) + 1);
    left.cmp(&right)
}

/// 选民数 = 名单得票 / 选举议席，四舍五入到整数
pub(super) fn voter_number(votes: u64, seats: u32) -> u64 {
    if seats == 0 {
        return 0;
    }
    (Decimal::from(votes) / Decimal::from(seats))
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u64()
        .unwrap_or(0)
}

/// 最大并列集合（优先级相同的条目下标）
///
/// 权重为 0 的条目不参与
pub(super) fn leading(weights: &[Decimal], seats: &[u32]) -> Vec<usize> {
    let mut best: Vec<usize> = Vec::new();
    for (i, weight) in weights.iter().enumerate() {
        if weight.is_zero() {
            continue;
        }
        match best.first() {
            None => best.push(i),
            Some(&b) => match compare_priority(*weight, seats[i], weights[b], seats[b]) {
                Ordering::Greater => best = vec![i],
                Ordering::Equal => best.push(i),
                Ordering::Less => {}
            },
        }
    }
    best
}

/// 逐席分配
///
/// 并列时按 preference 降序、下标升序选取
pub(super) fn allocate(weights: &[Decimal], total: u32, preference: &[i64]) -> Vec<u32> {
    let mut seats = vec![0u32; weights.len()];
    for _ in 0..total {
        let tied = leading(weights, &seats);
        let Some(winner) = tied
            .iter()
            .copied()
            .max_by(|a, b| preference[*a].cmp(&preference[*b]).then(b.cmp(a)))
        else {
            break;
        };
        seats[winner] += 1;
    }
    seats
}

/// 使 round(w / D) 复现给定分配的除数
///
/// 取有效区间 (max w/(s+0.5), min w/(s-0.5)] 的中点，保留 scale 位小数
pub(super) fn divisor_for(weights: &[Decimal], seats: &[u32], scale: u32) -> Decimal {
    let lower = weights
        .iter()
        .zip(seats)
        .filter(|(w, _)| !w.is_zero())
        .map(|(w, s)| *w / (Decimal::from(*s) + half()))
        .max()
        .unwrap_or(Decimal::ZERO);

    let upper = weights
        .iter()
        .zip(seats)
        .filter(|(_, s)| **s > 0)
        .map(|(w, s)| *w / (Decimal::from(*s) - half()))
        .min();

    let midpoint = match upper {
        Some(upper) => (lower + upper) / Decimal::TWO,
        None if lower.is_zero() => Decimal::ONE,
        None => lower * Decimal::TWO,
    };

    let rounded = midpoint.round_dp(scale);
    let inside = rounded > lower && upper.map_or(true, |u| rounded <= u);
    if inside && !rounded.is_zero() {
        rounded
    } else {
        midpoint
    }
}
