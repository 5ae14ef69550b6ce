// ==========================================
// 选举计票系统 - 复核抽样
// ==========================================
// 职责: 从票包中抽取需强制复核的选票编号
// 红线: 结果只依赖 (票包 id, 抽样轮次, 编号集合)，与录入顺序无关
// ==========================================

use crate::domain::types::BundleId;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::BTreeSet;

/// 由票包 id 与抽样轮次派生随机种子
fn sample_seed(bundle_id: &BundleId, round: u64) -> u64 {
    let raw = bundle_id.as_u128();
    let folded = (raw >> 64) as u64 ^ raw as u64;
    folded ^ round.wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// 抽取复核样本
///
/// # 返回
/// 大小为 min(sample_size, 选票数) 的编号集合
pub fn draw_review_sample(
    bundle_id: &BundleId,
    round: u64,
    ballot_numbers: &BTreeSet<u32>,
    sample_size: u32,
) -> BTreeSet<u32> {
    let numbers: Vec<u32> = ballot_numbers.iter().copied().collect();
    let amount = (sample_size as usize).min(numbers.len());

    let mut rng = StdRng::seed_from_u64(sample_seed(bundle_id, round));
    let sample: BTreeSet<u32> = numbers.choose_multiple(&mut rng, amount).copied().collect();

    tracing::debug!(
        bundle_id = %bundle_id,
        round = round,
        ballots = numbers.len(),
        sampled = sample.len(),
        "review sample drawn"
    );
    sample
}
