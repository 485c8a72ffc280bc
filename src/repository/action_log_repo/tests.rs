use super::ActionLogRepository;
use crate::domain::action_log::{ActionLog, ActionType};
use chrono::{Duration, Utc};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

fn setup_test_db() -> Arc<Mutex<Connection>> {
    let conn = Connection::open_in_memory().unwrap();
    crate::db::configure_sqlite_connection(&conn).unwrap();
    crate::db::ensure_schema(&conn).unwrap();
    Arc::new(Mutex::new(conn))
}

#[test]
fn test_insert_and_find_by_id() {
    let repo = ActionLogRepository::new(setup_test_db());

    let log = ActionLog::new(
        ActionType::Enroll,
        "U1",
        "P1",
        Some(serde_json::json!({ "seats_remaining": 4 })),
        None,
    );
    let action_id = repo.insert(&log).unwrap();
    assert_eq!(action_id, log.action_id);

    let found = repo.find_by_id(&action_id).unwrap().expect("日志应存在");
    assert_eq!(found.action_type, "Enroll");
    assert_eq!(found.target_type, "POOL");
    assert_eq!(found.payload_json.unwrap()["seats_remaining"], 4);

    assert!(repo.find_by_id("missing").unwrap().is_none());
}

#[test]
fn test_find_by_target_keeps_insert_order() {
    let repo = ActionLogRepository::new(setup_test_db());

    repo.insert(&ActionLog::new(ActionType::CreateProcedure, "U1", "PR1", None, None))
        .unwrap();
    repo.insert(&ActionLog::new(ActionType::TransitionProcedure, "S1", "PR1", None, None))
        .unwrap();
    repo.insert(&ActionLog::new(ActionType::CreateProcedure, "U2", "PR2", None, None))
        .unwrap();

    let logs = repo.find_by_target("PROCEDURE", "PR1").unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].action_type, "CreateProcedure");
    assert_eq!(logs[1].action_type, "TransitionProcedure");
}

#[test]
fn test_time_range_and_recent() {
    let repo = ActionLogRepository::new(setup_test_db());

    let now = Utc::now().naive_utc();
    let mut old = ActionLog::new(ActionType::CreatePool, "admin", "P1", None, None);
    old.action_ts = now - Duration::days(3);
    repo.insert(&old).unwrap();
    repo.insert(&ActionLog::new(ActionType::Enroll, "U1", "P1", None, None))
        .unwrap();

    let recent_day = repo
        .find_by_time_range(now - Duration::days(1), now + Duration::days(1))
        .unwrap();
    assert_eq!(recent_day.len(), 1);
    assert_eq!(recent_day[0].action_type, "Enroll");

    let recent = repo.list_recent(1).unwrap();
    assert_eq!(recent.len(), 1);
    assert_eq!(recent[0].action_type, "Enroll");
}
