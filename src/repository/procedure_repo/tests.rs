use super::*;
use crate::db::{configure_sqlite_connection, ensure_schema};
use crate::domain::procedure::{NewDocument, Procedure, ProcedureFilter};
use crate::domain::types::{Priority, ProcedureKind, ProcedureState};
use crate::repository::error::RepositoryError;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde_json::json;
use std::sync::{Arc, Mutex};

fn setup_repo() -> ProcedureRepository {
    let conn = Connection::open_in_memory().unwrap();
    configure_sqlite_connection(&conn).unwrap();
    ensure_schema(&conn).unwrap();
    ProcedureRepository::from_connection(Arc::new(Mutex::new(conn)))
}

fn base_ts() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2026, 5, 4).unwrap().and_hms_opt(9, 0, 0).unwrap()
}

fn make_procedure(id: &str, requester: &str, submitted_at: NaiveDateTime) -> Procedure {
    let payload = json!({ "item_type": "seeds", "quantity": 3, "origin_region": "north" });
    Procedure {
        procedure_id: id.to_string(),
        requester_id: requester.to_string(),
        kind: ProcedureKind::SuppliesRequest,
        state: ProcedureState::Submitted,
        submitted_at,
        reviewed_at: None,
        completed_at: None,
        reviewer_id: None,
        priority: Priority::Medium,
        notes: String::new(),
        origin_region: Some("north".to_string()),
        payload: payload.as_object().unwrap().clone(),
        attachments: Vec::new(),
        staff_notes: Vec::new(),
        revision: 0,
    }
}

#[test]
fn test_insert_and_find_roundtrip() {
    let repo = setup_repo();
    repo.insert(&make_procedure("PR1", "U1", base_ts())).unwrap();

    let found = repo.find_by_id("PR1").unwrap().expect("事项应存在");
    assert_eq!(found.state, ProcedureState::Submitted);
    assert_eq!(found.submitted_at, base_ts());
    assert_eq!(found.payload["quantity"], 3);
    assert!(found.attachments.is_empty());

    assert!(repo.find_by_id("missing").unwrap().is_none());
}

#[test]
fn test_update_with_stale_revision_fails() {
    let repo = setup_repo();
    repo.insert(&make_procedure("PR1", "U1", base_ts())).unwrap();

    let mut first = repo.find_by_id("PR1").unwrap().unwrap();
    let mut second = first.clone();

    first.apply_transition(ProcedureState::InReview, "S1", base_ts() + Duration::hours(1));
    assert_eq!(repo.update_with_revision(&first).unwrap(), 1);

    second.apply_transition(ProcedureState::Rejected, "S2", base_ts() + Duration::hours(2));
    match repo.update_with_revision(&second) {
        Err(RepositoryError::OptimisticLockFailure { expected, actual, .. }) => {
            assert_eq!(expected, 0);
            assert_eq!(actual, 1);
        }
        other => panic!("应为乐观锁冲突, 实际: {:?}", other),
    }

    let stored = repo.find_by_id("PR1").unwrap().unwrap();
    assert_eq!(stored.state, ProcedureState::InReview);
    assert_eq!(stored.reviewer_id.as_deref(), Some("S1"));
}

#[test]
fn test_update_missing_is_not_found() {
    let repo = setup_repo();
    let ghost = make_procedure("ghost", "U1", base_ts());
    assert!(matches!(
        repo.update_with_revision(&ghost),
        Err(RepositoryError::NotFound { .. })
    ));
}

#[test]
fn test_attachments_append_with_sequence() {
    let repo = setup_repo();
    repo.insert(&make_procedure("PR1", "U1", base_ts())).unwrap();

    let doc = |name: &str| NewDocument {
        name: name.to_string(),
        blob_id: format!("blob-{}", name),
        blob_url: None,
    };

    assert_eq!(
        repo.append_attachment("PR1", &doc("a.pdf"), "U1", base_ts(), true).unwrap(),
        AttachOutcome::Appended { seq: 1 }
    );
    assert_eq!(
        repo.append_attachment("PR1", &doc("b.pdf"), "U1", base_ts(), true).unwrap(),
        AttachOutcome::Appended { seq: 2 }
    );
    assert_eq!(
        repo.append_attachment("nope", &doc("c.pdf"), "U1", base_ts(), true).unwrap(),
        AttachOutcome::ProcedureNotFound
    );

    // 附件追加不影响主记录 revision
    let stored = repo.find_by_id("PR1").unwrap().unwrap();
    assert_eq!(stored.revision, 0);
    assert_eq!(stored.attachments.len(), 2);
    assert_eq!(stored.attachments[1].name, "b.pdf");
}

#[test]
fn test_terminal_attach_rejected_only_when_requested() {
    let repo = setup_repo();
    let mut procedure = make_procedure("PR1", "U1", base_ts());
    procedure.state = ProcedureState::Rejected;
    repo.insert(&procedure).unwrap();

    let doc = NewDocument {
        name: "late.pdf".to_string(),
        blob_id: "blob-late".to_string(),
        blob_url: None,
    };

    assert_eq!(
        repo.append_attachment("PR1", &doc, "U1", base_ts(), true).unwrap(),
        AttachOutcome::Terminal { state: ProcedureState::Rejected }
    );
    assert_eq!(
        repo.append_attachment("PR1", &doc, "S1", base_ts(), false).unwrap(),
        AttachOutcome::Appended { seq: 1 }
    );
}

#[test]
fn test_notes_and_delete_cascade() {
    let repo = setup_repo();
    repo.insert(&make_procedure("PR1", "U1", base_ts())).unwrap();

    assert_eq!(repo.append_note("PR1", "S1", "材料齐全", base_ts()).unwrap(), Some(1));
    assert_eq!(repo.append_note("nope", "S1", "x", base_ts()).unwrap(), None);

    let stored = repo.find_by_id("PR1").unwrap().unwrap();
    assert_eq!(stored.staff_notes.len(), 1);
    assert_eq!(stored.staff_notes[0].body, "材料齐全");

    assert!(repo.delete("PR1").unwrap());
    assert!(!repo.delete("PR1").unwrap());
    assert!(repo.list_attachments("PR1").unwrap().is_empty());
}

#[test]
fn test_query_filters_and_pages() {
    let repo = setup_repo();
    for i in 0..5 {
        let requester = if i % 2 == 0 { "U1" } else { "U2" };
        repo.insert(&make_procedure(
            &format!("PR{}", i),
            requester,
            base_ts() + Duration::hours(i),
        ))
        .unwrap();
    }

    let filter = ProcedureFilter {
        requester_id: Some("U1".to_string()),
        ..ProcedureFilter::default()
    };
    let (items, total) = repo.query(&filter, 1, 2).unwrap();
    assert_eq!(total, 3);
    assert_eq!(items.len(), 2);
    // 最新提交在前
    assert_eq!(items[0].procedure_id, "PR4");

    let (page2, _) = repo.query(&filter, 2, 2).unwrap();
    assert_eq!(page2.len(), 1);
    assert_eq!(page2[0].procedure_id, "PR0");

    let window = ProcedureFilter {
        submitted_from: Some(base_ts() + Duration::hours(1)),
        submitted_to: Some(base_ts() + Duration::hours(3)),
        ..ProcedureFilter::default()
    };
    let (_, total) = repo.query(&window, 1, 10).unwrap();
    assert_eq!(total, 2);
}
