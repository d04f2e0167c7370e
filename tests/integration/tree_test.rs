//! Integration tests for file tree operations.

mod helpers;

use bytes::Bytes;

use filehub_core::error::ErrorCode;
use filehub_entity::{FileActionType, PortablePath};

#[tokio::test]
async fn test_create_and_delete_nested_file() {
    let app = helpers::TestApp::new().await;
    let tree = &app.tree;

    let a = tree.mkdir(app.root_id(), "a", None).await.unwrap().node().clone();
    let f = tree.touch(a.id(), "f.txt", None, None).await.unwrap();
    assert_eq!(f.portable().to_string(), "USERS:a/f.txt");

    let err = tree.delete(a.id(), None).await.unwrap_err();
    assert!(err.is(ErrorCode::NotEmpty));

    tree.delete(f.id(), None).await.unwrap();
    tree.delete(a.id(), None).await.unwrap();
    assert!(!app.files_root().join("a").exists());
    helpers::assert_consistent(tree);
}

#[tokio::test]
async fn test_move_between_directories() {
    let app = helpers::TestApp::new().await;
    let tree = &app.tree;
    let root = app.root_id();

    let dir1 = tree.mkdir(root, "Dir1", None).await.unwrap().node().clone();
    let dir2 = tree.mkdir(root, "Dir2", None).await.unwrap().node().clone();
    let file = tree.mkdir(dir1.id(), "file", None).await.unwrap().node().clone();

    let moves = tree
        .move_node(file.id(), dir2.id(), "file", false, None)
        .await
        .unwrap();
    assert_eq!(moves.len(), 1);
    assert!(dir1.child("file").is_none());
    assert_eq!(dir2.child("file").map(|n| n.id()), Some(file.id()));

    let other = tree.mkdir(dir1.id(), "file", None).await.unwrap().node().clone();
    assert_ne!(other.id(), file.id());
    let err = tree
        .move_node(other.id(), dir2.id(), "file", false, None)
        .await
        .unwrap_err();
    assert!(err.is(ErrorCode::AlreadyExists));

    tree.move_node(other.id(), dir2.id(), "file", true, None)
        .await
        .unwrap();
    assert_eq!(dir2.child("file").map(|n| n.id()), Some(other.id()));
    assert!(!tree.contains(file.id()));
    assert!(!app.journal.get(file.id()).unwrap().is_live());
    helpers::assert_consistent(tree);
}

#[tokio::test]
async fn test_move_records_one_action_per_descendant() {
    let app = helpers::TestApp::new().await;
    let tree = &app.tree;
    let root = app.root_id();

    let src = tree.mkdir(root, "src", None).await.unwrap().node().clone();
    let sub = tree.mkdir(src.id(), "sub", None).await.unwrap().node().clone();
    tree.touch(src.id(), "one.txt", None, None).await.unwrap();
    tree.touch(sub.id(), "two.txt", None, None).await.unwrap();
    let dst = tree.mkdir(root, "dst", None).await.unwrap().node().clone();

    let event = app.journal.new_event();
    let moves = tree
        .move_node(src.id(), dst.id(), "moved", false, Some(&event))
        .await
        .unwrap();
    assert_eq!(moves.len(), 4);

    let actions = event.actions();
    assert_eq!(actions.len(), 4);
    for (action, info) in actions.iter().zip(&moves) {
        assert_eq!(action.action_type, FileActionType::Move);
        assert_eq!(action.event_id, event.id());
        assert_eq!(action.lifetime_id, info.to.id());
        assert_eq!(action.origin_path.as_ref(), Some(&info.from.portable));
        let dest = action.destination_path.as_ref().unwrap();
        assert!(dest.starts_with(&PortablePath::parse("USERS:dst/moved/").unwrap()));
        assert_eq!(*dest, info.to.portable());
    }

    app.journal.log_and_wait(event).await.unwrap();
    for info in &moves {
        let lifetime = app.journal.get(info.to.id()).unwrap();
        assert_eq!(lifetime.latest_path(), Some(&info.to.portable()));
    }
    helpers::assert_consistent(tree);
}

#[tokio::test]
async fn test_path_round_trip_for_every_node() {
    let app = helpers::TestApp::new().await;
    let tree = &app.tree;
    let a = tree.mkdir(app.root_id(), "a", None).await.unwrap().node().clone();
    let b = tree.mkdir(a.id(), "b b", None).await.unwrap().node().clone();
    tree.touch(b.id(), "ünïcode.txt", None, None).await.unwrap();

    for node in tree.root().subtree() {
        let abs = node.abs_path();
        let portable = tree.abs_to_portable(&abs, node.is_dir()).unwrap();
        assert_eq!(portable, node.portable());
        assert_eq!(tree.portable_to_abs(&portable).unwrap(), abs);
        assert_eq!(
            tree.get_by_portable(&portable).map(|n| n.id()),
            Some(node.id())
        );
    }
}

#[tokio::test]
async fn test_resize_down_then_up_adds_nothing() {
    let app = helpers::TestApp::new().await;
    let tree = &app.tree;
    let a = tree.mkdir(app.root_id(), "a", None).await.unwrap().node().clone();
    let f = tree
        .touch(a.id(), "f.bin", Some(Bytes::from_static(b"12345")), None)
        .await
        .unwrap();
    tokio::fs::write(f.abs_path(), b"1234567890").await.unwrap();

    let event = app.journal.new_event();
    tree.resize_down(app.root_id(), Some(&event), |_| {})
        .await
        .unwrap();
    let after_down = event.len();
    assert_eq!(after_down, 2);
    tree.resize_up(f.id(), Some(&event), |_| {})
        .await
        .unwrap();
    assert_eq!(event.len(), after_down);
    assert_eq!(tree.root().size(), 10);
}

#[tokio::test]
async fn test_concurrent_touches_keep_tree_consistent() {
    let app = helpers::TestApp::new().await;
    let dir = app
        .tree
        .mkdir(app.root_id(), "many", None)
        .await
        .unwrap()
        .node()
        .clone();

    let mut tasks = Vec::new();
    for i in 0..16 {
        let tree = app.tree.clone();
        let parent = dir.id();
        tasks.push(tokio::spawn(async move {
            tree.touch(parent, &format!("file-{i}.txt"), None, None).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(dir.child_count(), 16);
    assert_eq!(app.journal.get_active_lifetimes().len(), 17);
    helpers::assert_consistent(&app.tree);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mixed_concurrent_operations_agree_with_journal() {
    let app = helpers::TestApp::new().await;
    let tree = &app.tree;
    let root = app.root_id();
    let inbox = tree.mkdir(root, "inbox", None).await.unwrap().node().clone();
    let outbox = tree.mkdir(root, "outbox", None).await.unwrap().node().clone();
    let mut movable = Vec::new();
    let mut doomed = Vec::new();
    for i in 0..8 {
        movable.push(tree.touch(inbox.id(), &format!("m-{i}"), None, None).await.unwrap());
        doomed.push(tree.touch(inbox.id(), &format!("d-{i}"), None, None).await.unwrap());
    }
    for i in 0..4 {
        tokio::fs::write(app.files_root().join("inbox").join(format!("new-{i}")), b"x")
            .await
            .unwrap();
    }

    let mut tasks = Vec::new();
    for (i, node) in movable.iter().enumerate() {
        let tree = tree.clone();
        let (id, dst) = (node.id(), outbox.id());
        tasks.push(tokio::spawn(async move {
            tree.move_node(id, dst, &format!("m-{i}"), false, None).await.map(drop)
        }));
    }
    for node in &doomed {
        let tree = tree.clone();
        let id = node.id();
        tasks.push(tokio::spawn(async move { tree.delete(id, None).await.map(drop) }));
    }
    for i in 0..8 {
        let tree = tree.clone();
        tasks.push(tokio::spawn(async move {
            tree.touch(root, &format!("t-{i}"), None, None).await.map(drop)
        }));
    }
    {
        let tree = tree.clone();
        let id = inbox.id();
        tasks.push(tokio::spawn(async move { tree.scan_directory(id, None).await.map(drop) }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    helpers::assert_consistent(tree);
    assert_eq!(outbox.child_count(), 8);
    assert_eq!(inbox.child_count(), 4);
    for node in &doomed {
        assert!(!app.journal.get(node.id()).unwrap().is_live());
    }

    let live = app.journal.get_active_lifetimes();
    assert_eq!(live.len(), tree.len() - 1);
    for lifetime in live {
        let node = tree.get(lifetime.id).expect("live lifetime has a node");
        assert_eq!(lifetime.latest_path(), Some(&node.portable()));
    }
}
