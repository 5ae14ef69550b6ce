// ==========================================
// Repository 层集成测试
// ==========================================
// 测试目标: 事件日志、计票区结果、抽签裁决在数据库文件中持久化
//           新连接重放事件日志可恢复计票区小计
// ==========================================


use chrono::Utc;
use election_tally::api::{BundleApi, ResultLocks};
use election_tally::config::TallyConfig;
use election_tally::db::{read_schema_version, CURRENT_SCHEMA_VERSION};
use election_tally::domain::types::ApportionmentMethod;
use election_tally::domain::{BallotInput, LotDecisionResolution};
use election_tally::logging;
use election_tally::repository::{
    BundleEventRepository, CountingCircleResultRepository, LotDecisionRepository,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use test_helpers::*;

fn populated_env() -> (TestEnv, uuid::Uuid) {
    let env = TestEnv::new().expect("test env");
    env.result_api
        .register_business(proportional_business(
            1,
            2,
            ApportionmentMethod::HagenbachBischoff,
            &[(101, "A", &[1001, 1002]), (102, "B", &[2001])],
        ))
        .unwrap();
    let result = env
        .result_api
        .create_result(&admin(), &id(1), &id(CIRCLE_NORTH))
        .unwrap();

    for selections in [vec![1001, 2001], vec![1002], vec![2001]] {
        let bundle = env
            .bundle_api
            .create_bundle(&creator(), &result.id, None, None)
            .unwrap();
        env.bundle_api
            .add_or_update_ballot(
                &creator(),
                &bundle.id,
                BallotInput {
                    number: None,
                    selections: selections.into_iter().map(id).collect(),
                    empty_vote_count: 0,
                },
            )
            .unwrap();
        env.bundle_api.submission_finished(&creator(), &bundle.id).unwrap();
        env.bundle_api.succeed_review(&controller(), &bundle.id).unwrap();
    }
    (env, result.id)
}

#[test]
fn test_schema_is_versioned() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let conn = open_test_connection(&db_path).unwrap();
    assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
}

#[test]
fn test_event_log_survives_reopen() {
    logging::init_test();
    let (env, result_id) = populated_env();

    let reopened = BundleEventRepository::new(&env.db_path).unwrap();
    let events = reopened.load_by_result(&result_id).unwrap();
    // 每个票包: 创建、录入、提交、审核
    assert_eq!(events.len(), 12);

    let bundles: BTreeSet<_> = events.iter().map(|e| e.bundle_id).collect();
    assert_eq!(bundles.len(), 3);
    for bundle_id in bundles {
        let versions: Vec<u64> = events
            .iter()
            .filter(|e| e.bundle_id == bundle_id)
            .map(|e| e.version)
            .collect();
        assert_eq!(versions, vec![1, 2, 3, 4]);
    }
    assert_eq!(reopened.load_all().unwrap().len(), 12);
}

#[test]
fn test_replay_restores_result_subtotal() {
    let (env, result_id) = populated_env();
    let stored = CountingCircleResultRepository::new(&env.db_path)
        .unwrap()
        .find_by_id(&result_id)
        .unwrap()
        .unwrap();
    assert_eq!(stored.reviewed_bundles.ballot_count, 3);
    assert_eq!(stored.reviewed_bundles.candidate_votes[&id(2001)], 2);

    // 新连接上的 API 实例重放事件日志
    let restarted = BundleApi::new(
        TallyConfig::default(),
        env.catalog.clone(),
        ResultLocks::new(),
        Arc::new(BundleEventRepository::new(&env.db_path).unwrap()),
        Arc::new(CountingCircleResultRepository::new(&env.db_path).unwrap()),
        None,
    );
    assert_eq!(restarted.reproject_result(&result_id).unwrap(), stored);
}

#[test]
fn test_lot_decision_resolutions_are_scoped() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let resolution = |decision_id: &str, chosen: &str| LotDecisionResolution {
        decision_id: decision_id.to_string(),
        tied_entity_ids: BTreeSet::from([id(101).to_string(), id(102).to_string()]),
        chosen_entity_id: chosen.to_string(),
        resolved_by: "admin".to_string(),
        resolved_at: Utc::now(),
    };

    {
        let repo = LotDecisionRepository::new(&db_path).unwrap();
        repo.save(&id(1), &resolution("hb/ROOT/2", &id(101).to_string())).unwrap();
        repo.save(&id(900), &resolution("dp-super/4", "A")).unwrap();
    }

    let repo = LotDecisionRepository::new(&db_path).unwrap();
    let election = repo.list(&id(1)).unwrap();
    assert_eq!(election.len(), 1);
    assert_eq!(election[0].chosen_entity_id, id(101).to_string());
    assert_eq!(election[0].tied_entity_ids.len(), 2);

    assert_eq!(repo.list(&id(900)).unwrap()[0].decision_id, "dp-super/4");
    assert_eq!(repo.delete(&id(1), &["dp-super/4".to_string()]).unwrap(), 0);
    assert_eq!(repo.delete(&id(900), &["dp-super/4".to_string()]).unwrap(), 1);
    assert!(repo.list(&id(900)).unwrap().is_empty());
}
