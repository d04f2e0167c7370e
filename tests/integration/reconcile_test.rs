//! Integration tests for lining the tree up with the disk at startup.

mod helpers;

use filehub_core::types::FileId;
use filehub_entity::{FileAction, FileActionType, PortablePath};
use filehub_history::Journal;

fn path(s: &str) -> PortablePath {
    PortablePath::parse(s).unwrap()
}

/// Journal a Create for `id` at `at` and wait for it to land.
async fn seed(journal: &Journal, id: FileId, at: &str, parent_id: Option<FileId>, size: i64) {
    let event = journal.new_event();
    event.append(FileAction::created(
        &event.stamp(),
        id,
        path(at),
        parent_id,
        size,
        None,
    ));
    journal.log_and_wait(event).await.unwrap();
}

#[tokio::test]
async fn test_missing_lifetime_gets_delete() {
    let app = helpers::TestApp::new().await;
    let gone = FileId::new();
    seed(&app.journal, gone, "USERS:a/gone.txt", None, 4).await;
    assert!(app.journal.get(gone).unwrap().is_live());

    let event = app.journal.new_event();
    let summary = app.tree.load_from_root(&event, true).await.unwrap();
    assert_eq!(summary.missing, 1);

    let actions = event.actions();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].action_type, FileActionType::Delete);
    assert_eq!(actions[0].lifetime_id, gone);
    assert_eq!(actions[0].origin_path, Some(path("USERS:a/gone.txt")));

    app.journal.log_and_wait(event).await.unwrap();
    assert!(!app.journal.get(gone).unwrap().is_live());
    assert!(app.tree.get(gone).is_none());
}

#[tokio::test]
async fn test_restart_keeps_identities() {
    let app = helpers::TestApp::new().await;
    let docs = app
        .tree
        .mkdir(app.root_id(), "docs", None)
        .await
        .unwrap()
        .node()
        .clone();
    let f = app
        .tree
        .touch(docs.id(), "f.txt", Some("hello".into()), None)
        .await
        .unwrap();
    let lifetimes_before = app.journal.get_all_lifetimes().len();

    let app = app.reopen(false).await;
    let summary = app.tree.reconcile_summary();
    assert_eq!(summary.adopted, 2);
    assert_eq!(summary.discovered + summary.skipped + summary.missing, 0);

    let reopened = app.tree.get_by_portable(&path("USERS:docs/f.txt")).unwrap();
    assert_eq!(reopened.id(), f.id());
    assert_eq!(reopened.parent_id(), Some(docs.id()));
    assert_eq!(reopened.size(), 5);
    assert_eq!(app.journal.get_all_lifetimes().len(), lifetimes_before);
    helpers::assert_consistent(&app.tree);
}

#[tokio::test]
async fn test_offline_files_are_discovered() {
    let app = helpers::TestApp::new().await;
    let root = app.files_root();
    tokio::fs::create_dir_all(root.join("offline/nested")).await.unwrap();
    tokio::fs::write(root.join("offline/nested/new.bin"), b"1234567")
        .await
        .unwrap();

    let app = app.reopen(true).await;
    assert_eq!(app.tree.reconcile_summary().discovered, 3);

    let file = app
        .tree
        .get_by_portable(&path("USERS:offline/nested/new.bin"))
        .unwrap();
    let lifetime = app.journal.get(file.id()).unwrap();
    assert_eq!(lifetime.actions[0].action_type, FileActionType::Create);
    assert_eq!(lifetime.latest_size(), 7);

    let offline = app.tree.get_by_portable(&path("USERS:offline/")).unwrap();
    assert_eq!(offline.size(), 7);
    assert_eq!(app.journal.get(offline.id()).unwrap().latest_size(), 7);
}

#[tokio::test]
async fn test_mirror_adopts_known_paths_under_its_own_alias() {
    let dir = tempfile::tempdir().unwrap();
    let files = dir.path().join("files");
    tokio::fs::create_dir_all(files.join("a")).await.unwrap();
    tokio::fs::write(files.join("a/f.txt"), b"hello").await.unwrap();
    tokio::fs::write(files.join("extra.txt"), b"unknown").await.unwrap();

    let a = FileId::new();
    let f = FileId::new();
    {
        let (db_pool, journal) = helpers::start_journal(&dir).await;
        seed(&journal, a, "REMOTE:a/", None, 5).await;
        seed(&journal, f, "REMOTE:a/f.txt", Some(a), 5).await;
        journal.close().await.unwrap();
        db_pool.close().await;
    }

    let app = helpers::TestApp::open_with(dir, helpers::tree_config_for(false, "MIRROR")).await;
    let summary = app.tree.reconcile_summary();
    assert_eq!(summary.adopted, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.discovered, 0);

    let node = app.tree.get(f).unwrap();
    assert_eq!(node.portable(), path("MIRROR:a/f.txt"));
    assert_eq!(node.parent_id(), Some(a));
    assert!(app.tree.root().child("extra.txt").is_none());

    let lifetime = app.journal.get(f).unwrap();
    assert_eq!(lifetime.actions.len(), 1);
}
