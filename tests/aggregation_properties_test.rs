// ==========================================
// 结果汇总性质测试
// ==========================================
// 测试目标: 汇总与输入顺序无关、可重复、按计票区可加
// 数据: 固定种子随机生成的计票区结果
// ==========================================


use election_tally::domain::types::{ApportionmentMethod, CountingCircleResultState, VotingChannel};
use election_tally::domain::{CountingCircleResult, PoliticalBusiness, VotingCardCount};
use election_tally::engine::{AggregationScope, ResultAggregator};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use test_helpers::*;

const CIRCLES: u128 = 12;
const CANDIDATES: [u128; 5] = [1001, 1002, 1003, 2001, 2002];

fn business() -> PoliticalBusiness {
    let mut business = proportional_business(
        1,
        5,
        ApportionmentMethod::HagenbachBischoff,
        &[(101, "A", &[1001, 1002, 1003]), (102, "B", &[2001, 2002])],
    );
    business.counting_circle_ids = (0..CIRCLES).map(|n| id(500 + n)).collect();
    business
}

fn random_results(rng: &mut StdRng, business: &PoliticalBusiness) -> Vec<CountingCircleResult> {
    business
        .counting_circle_ids
        .iter()
        .enumerate()
        .map(|(index, circle)| {
            let mut result = CountingCircleResult::new(id(9000 + index as u128), business.id, *circle);
            result.state = if rng.gen_bool(0.7) {
                CountingCircleResultState::SubmissionDone
            } else {
                CountingCircleResultState::SubmissionOngoing
            };

            for candidate in CANDIDATES {
                result.conventional.candidate_votes.insert(id(candidate), rng.gen_range(0..500));
                result.reviewed_bundles.candidate_votes.insert(id(candidate), rng.gen_range(0..50));
            }
            result.conventional.ballot_count = rng.gen_range(100..1000);
            result.reviewed_bundles.ballot_count = rng.gen_range(0..100);
            result.reviewed_bundles.list_blank_rows.insert(id(101), rng.gen_range(0..20));
            result.conventional.empty_votes_without_list = rng.gen_range(0..10);
            result.voting_cards.insert(
                VotingChannel::BallotBox,
                VotingCardCount { valid: rng.gen_range(0..800), invalid: rng.gen_range(0..5) },
            );
            result
        })
        .collect()
}

#[test]
fn test_aggregation_is_order_independent() {
    let business = business();
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..20 {
        let results = random_results(&mut rng, &business);
        let expected = ResultAggregator::aggregate(&business, &results, &AggregationScope::Full);

        let mut shuffled = results.clone();
        shuffled.shuffle(&mut rng);
        let actual = ResultAggregator::aggregate(&business, &shuffled, &AggregationScope::Full);
        assert_eq!(actual, expected);

        // 重复汇总结果不变
        assert_eq!(
            ResultAggregator::aggregate(&business, &shuffled, &AggregationScope::Full),
            actual
        );
    }
}

#[test]
fn test_aggregation_is_additive_over_circles() {
    let business = business();
    let mut rng = StdRng::seed_from_u64(11);
    let results = random_results(&mut rng, &business);
    let end = ResultAggregator::aggregate(&business, &results, &AggregationScope::Full);

    let ballots: u64 = results.iter().map(|r| r.ballot_subtotal().ballot_count).sum();
    assert_eq!(end.ballot_count, ballots);

    for candidate in CANDIDATES {
        let votes: u64 = results
            .iter()
            .map(|r| r.ballot_subtotal().candidate_votes.get(&id(candidate)).copied().unwrap_or(0))
            .sum();
        assert_eq!(end.candidate(&id(candidate)).unwrap().vote_count, votes);
    }

    let list_a = end.list(&id(101)).unwrap();
    let blank_rows: u64 = results
        .iter()
        .map(|r| r.reviewed_bundles.list_blank_rows.get(&id(101)).copied().unwrap_or(0))
        .sum();
    assert_eq!(list_a.blank_rows, blank_rows);
    assert_eq!(list_a.list_votes(), list_a.candidate_votes + blank_rows);

    let valid_cards: u64 = results
        .iter()
        .map(|r| r.voting_cards[&VotingChannel::BallotBox].valid)
        .sum();
    assert_eq!(end.total_voting_cards().valid, valid_cards);

    let done = results.iter().filter(|r| r.is_done()).count() as u32;
    assert_eq!(end.count_of_done_circles, done);
    assert_eq!(end.total_count_of_circles, CIRCLES as u32);
}

#[test]
fn test_partial_scopes_sum_to_full_totals() {
    let business = business();
    let mut rng = StdRng::seed_from_u64(23);
    let results = random_results(&mut rng, &business);

    let circles: Vec<_> = business.counting_circle_ids.iter().copied().collect();
    let (left, right) = circles.split_at(circles.len() / 2);
    let scope = |part: &[uuid::Uuid]| AggregationScope::Partial {
        circles: part.iter().copied().collect::<BTreeSet<_>>(),
    };

    let full = ResultAggregator::aggregate(&business, &results, &AggregationScope::Full);
    let first = ResultAggregator::aggregate(&business, &results, &scope(left));
    let second = ResultAggregator::aggregate(&business, &results, &scope(right));

    assert!(first.partial && second.partial);
    assert_eq!(first.ballot_count + second.ballot_count, full.ballot_count);
    assert_eq!(
        first.total_count_of_circles + second.total_count_of_circles,
        full.total_count_of_circles
    );
    for candidate in CANDIDATES {
        let split = first.candidate(&id(candidate)).unwrap().vote_count
            + second.candidate(&id(candidate)).unwrap().vote_count;
        assert_eq!(split, full.candidate(&id(candidate)).unwrap().vote_count);
        assert!(first.candidate(&id(candidate)).unwrap().rank.is_none());
    }
}

#[test]
fn test_foreign_results_are_ignored() {
    let business = business();
    let mut rng = StdRng::seed_from_u64(31);
    let results = random_results(&mut rng, &business);
    let expected = ResultAggregator::aggregate(&business, &results, &AggregationScope::Full);

    let mut noisy = results.clone();
    // 其他选举的结果
    let mut other_business = CountingCircleResult::new(id(9990), id(2), id(500));
    other_business.conventional.candidate_votes.insert(id(1001), 10_000);
    noisy.push(other_business);
    // 不参与本选举的计票区
    let mut other_circle = CountingCircleResult::new(id(9991), business.id, id(999));
    other_circle.conventional.ballot_count = 10_000;
    noisy.push(other_circle);

    assert_eq!(
        ResultAggregator::aggregate(&business, &noisy, &AggregationScope::Full),
        expected
    );
}

#[test]
fn test_ranks_appear_once_all_circles_are_done() {
    let business = business();
    let mut rng = StdRng::seed_from_u64(43);
    let mut results = random_results(&mut rng, &business);
    for result in results.iter_mut() {
        result.state = CountingCircleResultState::SubmissionDone;
    }
    // 两位候选人并列第一
    for result in results.iter_mut() {
        result.conventional.candidate_votes.insert(id(1001), 1_000);
        result.conventional.candidate_votes.insert(id(2001), 1_000);
        result.reviewed_bundles.candidate_votes.insert(id(1001), 0);
        result.reviewed_bundles.candidate_votes.insert(id(2001), 0);
    }

    let end = ResultAggregator::aggregate(&business, &results, &AggregationScope::Full);
    assert!(end.all_circles_done());
    assert_eq!(end.candidate(&id(1001)).unwrap().rank, Some(1));
    assert_eq!(end.candidate(&id(2001)).unwrap().rank, Some(1));
    assert!(end
        .candidates
        .iter()
        .filter(|c| c.candidate_id != id(1001) && c.candidate_id != id(2001))
        .all(|c| c.rank.unwrap() >= 3));
    assert!(end.candidates.windows(2).all(|w| w[0].rank <= w[1].rank));
}
