use super::ActionLogRepository;
use crate::domain::action_log::{AuditAction, AuditEntry};
use rusqlite::Connection;
use serde_json::json;
use std::sync::{Arc, Mutex};

fn setup_test_db() -> Arc<Mutex<Connection>> {
    let conn = Connection::open_in_memory().unwrap();
    crate::db::configure_sqlite_connection(&conn).unwrap();
    crate::db::init_schema(&conn).unwrap();
    Arc::new(Mutex::new(conn))
}

fn make_entry(target: &str, action: AuditAction, fields: &[&str]) -> AuditEntry {
    let fields: Vec<String> = fields.iter().map(|s| s.to_string()).collect();
    AuditEntry::new("planner", "demand", target, action, &fields)
}

#[test]
fn test_insert_and_find_by_id() {
    let repo = ActionLogRepository::new(setup_test_db());

    let entry = make_entry("D1", AuditAction::Changed, &["qty", "due"])
        .with_payload(&json!({"qty": 12}));
    let id = repo.insert(&entry).unwrap();
    assert_eq!(id, entry.action_id);

    let found = repo.find_by_id(&id).unwrap().unwrap();
    assert_eq!(found.action, AuditAction::Changed);
    assert_eq!(found.change_summary, "修改了 qty 和 due。");
    assert_eq!(found.payload_json, Some(json!({"qty": 12})));

    assert!(repo.find_by_id("missing").unwrap().is_none());
}

#[test]
fn test_find_by_target_newest_first() {
    let repo = ActionLogRepository::new(setup_test_db());
    let first = make_entry("D1", AuditAction::Added, &[]);
    let second = make_entry("D1", AuditAction::Changed, &["qty"]);
    let other = make_entry("D2", AuditAction::Added, &[]);
    repo.batch_insert(&[first.clone(), second.clone(), other]).unwrap();

    let history = repo.find_by_target("demand", "D1").unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].action_id, second.action_id);
    assert_eq!(history[1].action_id, first.action_id);

    assert_eq!(repo.count_by_entity("demand").unwrap(), 3);
    assert_eq!(repo.find_recent(1).unwrap().len(), 1);
}
