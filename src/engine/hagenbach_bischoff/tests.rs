use super::*;
use crate::domain::apportionment::{LotDecisionResolution, NodeKey};
use crate::domain::political_business::ListUnion;
use crate::engine::lot_decision::Resolutions;
use chrono::Utc;
use rust_decimal::Decimal;
use uuid::Uuid;

// ==========================================
// 测试辅助函数
// ==========================================

fn id(n: u128) -> Uuid {
    Uuid::from_u128(n)
}

fn list(n: u128, votes: u64) -> HbListInput {
    HbListInput {
        list_id: id(n),
        position: n as u32,
        vote_count: votes,
    }
}

fn input(mandates: u32, lists: Vec<HbListInput>) -> HbInput {
    HbInput {
        number_of_mandates: mandates,
        lists,
        list_unions: vec![],
    }
}

fn resolve(resolutions: &mut Resolutions, decision_id: &str, tied: &[u128], chosen: u128) {
    resolutions.insert(
        decision_id.to_string(),
        LotDecisionResolution {
            decision_id: decision_id.to_string(),
            tied_entity_ids: tied.iter().map(|t| id(*t).to_string()).collect(),
            chosen_entity_id: id(chosen).to_string(),
            resolved_by: "admin".to_string(),
            resolved_at: Utc::now(),
        },
    );
}

// ==========================================
// 基本分配
// ==========================================

#[test]
fn test_seats_are_conserved() {
    let input = input(7, vec![list(1, 4300), list(2, 2100), list(3, 1300), list(4, 400)]);
    let result = HagenbachBischoff::apportion(&input, &Resolutions::new()).unwrap();

    assert!(result.is_complete());
    assert_eq!(result.assigned_seats(), 7);
    assert_eq!(result.rounds.len(), 7);
    let seats = result.list_seats();
    assert_eq!(seats[&id(1)], 4);
    assert_eq!(seats[&id(2)], 2);
    assert_eq!(seats[&id(3)], 1);
    assert_eq!(seats[&id(4)], 0);
}

#[test]
fn test_rounds_are_ordered_audit_trail() {
    let input = input(2, vec![list(1, 900), list(2, 500)]);
    let result = HagenbachBischoff::apportion(&input, &Resolutions::new()).unwrap();

    assert_eq!(result.rounds[0].seat_number, 1);
    assert_eq!(result.rounds[0].winner, NodeKey::List(id(1)));
    assert_eq!(result.rounds[0].ratio, Decimal::from(900));
    assert_eq!(result.rounds[1].winner, NodeKey::List(id(2)));
    assert_eq!(result.rounds[1].cumulative_seats, 1);
    assert!(result.rounds.iter().all(|r| !r.decided_by_lot));
}

// ==========================================
// 并列与抽签
// ==========================================

#[test]
fn test_tie_for_final_seat_produces_single_lot_decision() {
    let input = input(1, vec![list(1, 500), list(2, 500)]);
    let result = HagenbachBischoff::apportion(&input, &Resolutions::new()).unwrap();

    assert_eq!(result.lot_decisions.len(), 1);
    let decision = &result.lot_decisions[0];
    assert!(decision.is_pending());
    assert!(decision.involves(&id(1).to_string()));
    assert!(decision.involves(&id(2).to_string()));
    assert_eq!(result.assigned_seats(), 0);
    assert!(!result.is_complete());
}

#[test]
fn test_end_to_end_tie_resolution() {
    // A=1000, B=500, 3 议席
    let input = input(3, vec![list(1, 1000), list(2, 500)]);

    let first = HagenbachBischoff::apportion(&input, &Resolutions::new()).unwrap();
    assert_eq!(first.rounds.len(), 1);
    assert_eq!(first.list_seats()[&id(1)], 1);
    let decision = &first.lot_decisions[0];
    assert_eq!(decision.id, "hb/ROOT/2");
    assert_eq!(decision.seat_number, 2);

    let mut resolutions = Resolutions::new();
    resolve(&mut resolutions, "hb/ROOT/2", &[1, 2], 1);
    let second = HagenbachBischoff::apportion(&input, &resolutions).unwrap();

    assert!(second.is_complete());
    let seats = second.list_seats();
    assert_eq!(seats[&id(1)], 2);
    assert_eq!(seats[&id(2)], 1);
    assert!(second.rounds[1].decided_by_lot);
    assert_eq!(second.rounds[2].winner, NodeKey::List(id(2)));

    // 同一输入重算结果不变
    let third = HagenbachBischoff::apportion(&input, &resolutions).unwrap();
    assert_eq!(second, third);
}

#[test]
fn test_stale_resolution_keeps_decision_pending() {
    let input = input(1, vec![list(1, 500), list(2, 500), list(3, 500)]);
    let mut resolutions = Resolutions::new();
    resolve(&mut resolutions, "hb/ROOT/1", &[1, 2], 1);

    let result = HagenbachBischoff::apportion(&input, &resolutions).unwrap();
    assert!(result.has_pending_lot_decisions());
    assert_eq!(result.lot_decisions[0].tied.len(), 3);
}

// ==========================================
// 名单联合
// ==========================================

#[test]
fn test_list_union_seats_cascade_to_lists() {
    let union_id = id(900);
    let mut input = input(4, vec![list(1, 300), list(2, 250), list(3, 500)]);
    input.list_unions = vec![ListUnion {
        id: union_id,
        description: "U".into(),
        parent_id: None,
        list_ids: vec![id(1), id(2)],
    }];

    let result = HagenbachBischoff::apportion(&input, &Resolutions::new()).unwrap();
    assert!(result.is_complete());

    // 联合 550 vs 名单3 500
    let seats = result.list_seats();
    assert_eq!(seats[&id(1)] + seats[&id(2)], 2);
    assert_eq!(seats[&id(3)], 2);
    assert_eq!(seats[&id(1)], 1);

    let table = result.list_union_table();
    assert_eq!(table.len(), 1);
    assert_eq!(table[0].union, NodeKey::ListUnion(union_id));
    assert_eq!(table[0].vote_count, 550);
    assert_eq!(table[0].seats, 2);
    assert!(result.sub_list_union_table().is_empty());

    // 联合内的轮次以联合为范围
    assert!(result
        .rounds
        .iter()
        .any(|r| r.scope == NodeKey::ListUnion(union_id)));
}

#[test]
fn test_sub_list_union_tree() {
    let mut input = input(5, vec![list(1, 350), list(2, 200), list(3, 100), list(4, 400)]);
    input.list_unions = vec![
        ListUnion { id: id(900), description: "U".into(), parent_id: None, list_ids: vec![id(1), id(2), id(3)] },
        ListUnion { id: id(901), description: "S".into(), parent_id: Some(id(900)), list_ids: vec![id(2), id(3)] },
    ];

    let result = HagenbachBischoff::apportion(&input, &Resolutions::new()).unwrap();
    assert_eq!(result.assigned_seats(), 5);
    let sub = result.sub_list_union_table();
    assert_eq!(sub.len(), 1);
    assert_eq!(sub[0].vote_count, 300);

    let root = result.tree.root();
    assert_eq!(root.vote_count, 1050);
    let seats = result.list_seats();
    assert_eq!((seats[&id(1)], seats[&id(2)], seats[&id(3)], seats[&id(4)]), (2, 1, 0, 2));
    assert_eq!(root.seats, 5);
}

#[test]
fn test_invalid_union_definitions() {
    let mut bad = input(2, vec![list(1, 10), list(2, 10)]);
    bad.list_unions = vec![
        ListUnion { id: id(900), description: "U".into(), parent_id: None, list_ids: vec![id(1)] },
        ListUnion { id: id(901), description: "S".into(), parent_id: Some(id(900)), list_ids: vec![id(2)] },
    ];
    assert!(HagenbachBischoff::apportion(&bad, &Resolutions::new()).is_err());

    let empty = input(2, vec![]);
    assert!(HagenbachBischoff::apportion(&empty, &Resolutions::new()).is_err());

    let no_votes = input(2, vec![list(1, 0)]);
    assert!(matches!(
        HagenbachBischoff::apportion(&no_votes, &Resolutions::new()),
        Err(crate::engine::error::EngineError::Precondition(_))
    ));
}
