use super::*;
use crate::domain::apportionment::{LotDecisionResolution, LotDecisionScope};
use crate::engine::error::EngineError;
use crate::engine::lot_decision::Resolutions;
use chrono::Utc;
use rust_decimal::{Decimal, RoundingStrategy};
use std::collections::BTreeSet;
use uuid::Uuid;

// ==========================================
// 测试辅助函数
// ==========================================

fn id(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

fn election(n: u128, mandates: u32, lists: &[(u128, &str, u64)]) -> DpElectionInput {
    DpElectionInput {
        election_id: id(n),
        number_of_mandates: mandates,
        lists: lists
            .iter()
            .map(|(list, key, votes)| DpListInput {
                list_id: id(*list),
                union_key: key.to_string(),
                vote_count: *votes,
            })
            .collect(),
    }
}

fn engine() -> DoubleProportional {
    DoubleProportional::new(1000, 10)
}

fn resolve(resolutions: &mut Resolutions, decision_id: &str, tied: &[String], chosen: &str) {
    resolutions.insert(
        decision_id.to_string(),
        LotDecisionResolution {
            decision_id: decision_id.to_string(),
            tied_entity_ids: tied.iter().cloned().collect(),
            chosen_entity_id: chosen.to_string(),
            resolved_by: "admin".to_string(),
            resolved_at: Utc::now(),
        },
    );
}

/// 三个选举 × 三个联合名单
fn three_by_three() -> DpInput {
    DpInput {
        elections: vec![
            election(100, 5, &[(1, "A", 5123), (2, "B", 3311), (3, "C", 1207)]),
            election(200, 4, &[(4, "A", 2875), (5, "B", 3902), (6, "C", 1411)]),
            election(300, 3, &[(7, "A", 1630), (8, "B", 1199), (9, "C", 2047)]),
        ],
    }
}

// ==========================================
// 上层分配
// ==========================================

#[test]
fn test_row_seats_from_voter_numbers() {
    let result = engine().apportion(&three_by_three(), &Resolutions::new()).unwrap();

    // 选民数: A 1025+719+543, B 662+976+400, C 241+353+682
    let a = result.row("A").unwrap();
    assert_eq!(a.voter_number, 2287);
    assert_eq!(a.vote_count, 5123 + 2875 + 1630);
    assert_eq!(result.row("B").unwrap().voter_number, 2038);
    assert_eq!(result.row("C").unwrap().voter_number, 1276);

    assert_eq!(a.seats, 5);
    assert_eq!(result.row("B").unwrap().seats, 4);
    assert_eq!(result.row("C").unwrap().seats, 3);
}

#[test]
fn test_seats_are_conserved_across_rows_and_columns() {
    let input = three_by_three();
    let result = engine().apportion(&input, &Resolutions::new()).unwrap();

    assert!(result.is_complete());
    assert!(result.iterations >= 1);
    assert_eq!(result.row_seat_sum(), 12);
    assert_eq!(result.column_seat_sum(), 12);

    for election in &input.elections {
        let seats: u32 = result.election_list_seats(&election.election_id).values().sum();
        assert_eq!(seats, election.number_of_mandates);
    }
    for row in &result.rows {
        let seats: u32 = result
            .cells
            .iter()
            .filter(|c| c.union_key == row.union_key)
            .filter_map(|c| c.seats)
            .sum();
        assert_eq!(seats, row.seats, "row {}", row.union_key);
    }
}

#[test]
fn test_divisors_reproduce_cell_seats() {
    let result = engine().apportion(&three_by_three(), &Resolutions::new()).unwrap();

    for cell in &result.cells {
        let row_divisor = result.row(&cell.union_key).and_then(|r| r.divisor).unwrap();
        let column_divisor = result
            .columns
            .iter()
            .find(|c| c.election_id == cell.election_id)
            .and_then(|c| c.divisor)
            .unwrap();
        let quotient = (Decimal::from(cell.vote_count) / row_divisor / column_divisor)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        assert_eq!(quotient, Decimal::from(cell.seats.unwrap()));
    }
}

#[test]
fn test_apportionment_is_deterministic() {
    let input = three_by_three();
    let first = engine().apportion(&input, &Resolutions::new()).unwrap();
    let second = engine().apportion(&input, &Resolutions::new()).unwrap();
    assert_eq!(first, second);
}

// ==========================================
// 并列与抽签
// ==========================================

#[test]
fn test_super_tie_requires_lot_decision() {
    let input = DpInput {
        elections: vec![election(100, 1, &[(1, "A", 500), (2, "B", 500)])],
    };

    let first = engine().apportion(&input, &Resolutions::new()).unwrap();
    assert_eq!(first.lot_decisions.len(), 1);
    let decision = &first.lot_decisions[0];
    assert_eq!(decision.id, "dp-super/1");
    assert_eq!(decision.scope, LotDecisionScope::DoubleProportionalSuper);
    assert!(decision.is_pending());
    assert_eq!(first.row_seat_sum(), 0);
    assert!(first.cells.iter().all(|c| c.seats.is_none()));
    assert!(!first.is_complete());

    let mut resolutions = Resolutions::new();
    resolve(&mut resolutions, "dp-super/1", &["A".to_string(), "B".to_string()], "B");
    let second = engine().apportion(&input, &resolutions).unwrap();

    assert!(second.is_complete());
    assert_eq!(second.row("B").unwrap().seats, 1);
    assert_eq!(second.row("A").unwrap().seats, 0);
    let seats = second.list_seats();
    assert_eq!(seats[&id(2)], 1);
    assert_eq!(seats[&id(1)], 0);
}

fn assert_margins_hold(input: &DpInput, result: &DoubleProportionalResult) {
    for row in &result.rows {
        assert_eq!(result.union_seats(&row.union_key), row.seats, "row {}", row.union_key);
    }
    for election in &input.elections {
        let seats: u32 = result.election_list_seats(&election.election_id).values().sum();
        assert_eq!(seats, election.number_of_mandates, "election {}", election.election_id);
    }
}

#[test]
fn test_sub_tie_is_a_swap_across_elections() {
    let input = DpInput {
        elections: vec![
            election(100, 1, &[(1, "A", 100), (2, "B", 100)]),
            election(200, 1, &[(3, "A", 100), (4, "B", 100)]),
        ],
    };

    let first = engine().apportion(&input, &Resolutions::new()).unwrap();
    assert_eq!(first.row("A").unwrap().seats, 1);
    assert_eq!(first.row("B").unwrap().seats, 1);

    let pending: Vec<_> = first.lot_decisions.iter().filter(|d| d.is_pending()).collect();
    assert_eq!(pending.len(), 1);
    let decision_id = format!("dp-sub/{}/1", id(100));
    assert_eq!(pending[0].id, decision_id);
    assert_eq!(
        pending[0].scope,
        LotDecisionScope::DoubleProportionalSub { election_id: id(100) }
    );
    assert_eq!(
        pending[0].tied_ids(),
        BTreeSet::from([id(1).to_string(), id(2).to_string()])
    );
    assert!(first.cells.iter().all(|c| c.seats.is_none()));
    assert!(!first.is_complete());

    // 任一裁决都保持行列边际
    for (chosen, other) in [(1, 2), (2, 1)] {
        let mut resolutions = Resolutions::new();
        resolve(
            &mut resolutions,
            &decision_id,
            &[id(1).to_string(), id(2).to_string()],
            &id(chosen).to_string(),
        );
        let second = engine().apportion(&input, &resolutions).unwrap();

        assert!(second.is_complete());
        assert_margins_hold(&input, &second);
        let seats = second.list_seats();
        assert_eq!(seats[&id(chosen)], 1);
        assert_eq!(seats[&id(other)], 0);
        // 选举 200 中议席归另一联合名单
        let in_second = if chosen == 1 { id(4) } else { id(3) };
        assert_eq!(seats[&in_second], 1);
    }
}

#[test]
fn test_converged_matrix_is_kept_when_no_swap_is_tied() {
    // 行议席 A=3, B=1；唯一满足边际的矩阵: A 1+2, B 1+0
    let input = DpInput {
        elections: vec![
            election(100, 2, &[(1, "A", 100), (2, "B", 100)]),
            election(200, 2, &[(3, "A", 300), (4, "B", 100)]),
        ],
    };

    let result = engine().apportion(&input, &Resolutions::new()).unwrap();
    assert_eq!(result.row("A").unwrap().seats, 3);
    assert_eq!(result.row("B").unwrap().seats, 1);
    assert!(result.lot_decisions.is_empty());
    assert!(result.is_complete());
    assert_margins_hold(&input, &result);

    let seats = result.list_seats();
    assert_eq!((seats[&id(1)], seats[&id(2)], seats[&id(3)], seats[&id(4)]), (1, 1, 2, 0));
}

#[test]
fn test_resolution_without_tie_is_ignored() {
    let input = DpInput {
        elections: vec![
            election(100, 2, &[(1, "A", 100), (2, "B", 100)]),
            election(200, 2, &[(3, "A", 300), (4, "B", 100)]),
        ],
    };
    let mut resolutions = Resolutions::new();
    resolve(
        &mut resolutions,
        &format!("dp-sub/{}/2", id(200)),
        &[id(3).to_string(), id(4).to_string()],
        &id(4).to_string(),
    );

    let result = engine().apportion(&input, &resolutions).unwrap();
    assert!(result.is_complete());
    assert_margins_hold(&input, &result);
    assert_eq!(result.list_seats()[&id(4)], 0);
}

// ==========================================
// 错误
// ==========================================

#[test]
fn test_infeasible_matrix_reports_no_convergence() {
    // 选举 200 的议席只能给 B，但 B 没有行议席
    let input = DpInput {
        elections: vec![
            election(100, 2, &[(1, "A", 1000)]),
            election(200, 1, &[(2, "B", 10)]),
        ],
    };

    let err = DoubleProportional::new(25, 10)
        .apportion(&input, &Resolutions::new())
        .unwrap_err();
    assert!(matches!(err, EngineError::NoConvergence { iterations: 25 }));
}

#[test]
fn test_invalid_inputs_are_rejected() {
    let empty = DpInput { elections: vec![] };
    assert!(matches!(
        engine().apportion(&empty, &Resolutions::new()),
        Err(EngineError::Validation(_))
    ));

    let no_mandates = DpInput {
        elections: vec![election(100, 0, &[(1, "A", 10)])],
    };
    assert!(matches!(
        engine().apportion(&no_mandates, &Resolutions::new()),
        Err(EngineError::Validation(_))
    ));

    let duplicate_key = DpInput {
        elections: vec![election(100, 2, &[(1, "A", 10), (2, "A", 20)])],
    };
    assert!(matches!(
        engine().apportion(&duplicate_key, &Resolutions::new()),
        Err(EngineError::Validation(_))
    ));

    let duplicate_list = DpInput {
        elections: vec![
            election(100, 1, &[(1, "A", 10)]),
            election(200, 1, &[(1, "A", 10)]),
        ],
    };
    assert!(matches!(
        engine().apportion(&duplicate_list, &Resolutions::new()),
        Err(EngineError::Validation(_))
    ));

    let no_votes = DpInput {
        elections: vec![election(100, 1, &[(1, "A", 0)])],
    };
    assert!(matches!(
        engine().apportion(&no_votes, &Resolutions::new()),
        Err(EngineError::Precondition(_))
    ));
}
