//! Integration tests for the journal and historical queries.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use filehub_core::config::JournalConfig;
use filehub_core::error::ErrorCode;
use filehub_core::types::FileId;
use filehub_database::{LifetimeStore, MemoryLifetimeStore};
use filehub_entity::{FileAction, FileActionType, PortablePath};
use filehub_history::{EventStatus, Journal};

fn path(s: &str) -> PortablePath {
    PortablePath::parse(s).unwrap()
}

#[tokio::test]
async fn test_logged_create_becomes_live_lifetime() {
    let journal = Journal::start(&JournalConfig::default(), Arc::new(MemoryLifetimeStore::new()))
        .await
        .unwrap();
    let id = FileId::new();
    let event = journal.new_event();
    event.append(FileAction::created(
        &event.stamp(),
        id,
        path("USERS:f"),
        Some(FileId::root_for("USERS")),
        0,
        None,
    ));
    journal.log_event(event).await.unwrap();

    let lifetime = helpers::wait_for_lifetime(&journal, id).await.unwrap();
    assert_eq!(lifetime.actions.len(), 1);
    assert!(lifetime.is_live());
}

#[tokio::test]
async fn test_deleted_lifetime_accepts_nothing_more() {
    let app = helpers::TestApp::new().await;
    let f = app.tree.touch(app.root_id(), "f", None, None).await.unwrap();
    let portable = f.portable();
    app.tree.delete(f.id(), None).await.unwrap();

    let event = app.journal.new_event();
    event.append(FileAction::resized(
        &event.stamp(),
        f.id(),
        portable,
        Some(app.root_id()),
        3,
        None,
    ));
    let err = app.journal.log_and_wait(event.clone()).await.unwrap_err();
    assert!(err.is(ErrorCode::EventFailed));
    assert!(matches!(event.status(), EventStatus::Failed(_)));

    let lifetime = app.journal.get(f.id()).unwrap();
    let types: Vec<FileActionType> = lifetime.actions.iter().map(|a| a.action_type).collect();
    assert_eq!(types, vec![FileActionType::Create, FileActionType::Delete]);
}

#[tokio::test]
async fn test_past_folder_children() {
    let app = helpers::TestApp::new().await;
    let tree = &app.tree;
    let docs = tree.mkdir(app.root_id(), "docs", None).await.unwrap().node().clone();
    let a = tree.touch(docs.id(), "a.txt", None, None).await.unwrap();
    let b = tree.touch(docs.id(), "b.txt", None, None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(2)).await;
    let before_changes = Utc::now();
    tokio::time::sleep(Duration::from_millis(2)).await;

    tree.delete(a.id(), None).await.unwrap();
    tree.move_node(b.id(), app.root_id(), "b.txt", false, None)
        .await
        .unwrap();
    tree.touch(docs.id(), "c.txt", None, None).await.unwrap();

    let then: Vec<String> = app
        .journal
        .get_past_folder_children(docs.id(), before_changes)
        .iter()
        .map(|p| p.path.to_string())
        .collect();
    assert_eq!(then, vec!["USERS:docs/a.txt", "USERS:docs/b.txt"]);

    let now: Vec<String> = app
        .journal
        .get_past_folder_children(docs.id(), Utc::now())
        .iter()
        .map(|p| p.path.to_string())
        .collect();
    assert_eq!(now, vec!["USERS:docs/c.txt"]);

    let past_a = app.journal.get_past_file(a.id(), before_changes).unwrap().unwrap();
    assert_eq!(past_a.path.to_string(), "USERS:docs/a.txt");
    assert!(app.journal.get_past_file(a.id(), Utc::now()).unwrap().is_none());
}

#[tokio::test]
async fn test_actions_since_are_ordered_and_strict() {
    let app = helpers::TestApp::new().await;
    let tree = &app.tree;
    tree.touch(app.root_id(), "early", None, None).await.unwrap();
    let cutoff = app.journal.get_latest_action().await.unwrap().unwrap().timestamp;

    let dir = tree.mkdir(app.root_id(), "late", None).await.unwrap().node().clone();
    tree.touch(dir.id(), "later", None, None).await.unwrap();

    let since = app.journal.get_actions_since(cutoff);
    let paths: Vec<String> = since
        .iter()
        .filter_map(|a| a.destination_path.as_ref().map(ToString::to_string))
        .collect();
    assert_eq!(paths, vec!["USERS:late/", "USERS:late/later"]);
    assert!(since.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    assert!(since.iter().all(|a| a.timestamp > cutoff));
}

#[tokio::test]
async fn test_history_persists_across_restart() {
    let app = helpers::TestApp::new().await;
    let docs = app
        .tree
        .mkdir(app.root_id(), "docs", None)
        .await
        .unwrap()
        .node()
        .clone();
    let f = app.tree.touch(docs.id(), "f", None, None).await.unwrap();
    app.tree
        .move_node(f.id(), docs.id(), "g", false, None)
        .await
        .unwrap();

    let app = app.reopen(true).await;
    let lifetime = app.journal.get(f.id()).unwrap();
    assert_eq!(lifetime.actions.len(), 2);
    assert_eq!(lifetime.latest_path(), Some(&path("USERS:docs/g")));

    let store = filehub_database::SqliteLifetimeStore::new(app.db_pool.pool().clone());
    let by_path = store
        .get_actions_by_path("local", &path("USERS:docs/"))
        .await
        .unwrap();
    assert_eq!(by_path.len(), 3);
    assert_eq!(by_path[0].action_type, FileActionType::Move);

    let via_journal = app.journal.get_actions_by_path(&path("USERS:docs/g")).await.unwrap();
    assert_eq!(via_journal.len(), 1);
}

#[tokio::test]
async fn test_closed_journal_rejects_events() {
    let app = helpers::TestApp::new().await;
    app.journal.close().await.unwrap();
    let err = app
        .tree
        .touch(app.root_id(), "late", None, None)
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::JournalClosed));
}
