//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tempfile::TempDir;

use filehub_core::config::{DatabaseConfig, JournalConfig, TreeConfig};
use filehub_core::types::FileId;
use filehub_database::{DatabasePool, SqliteLifetimeStore};
use filehub_entity::Lifetime;
use filehub_history::Journal;
use filehub_storage::Sha256ContentHasher;
use filehub_tree::FileTree;

/// A tree over a temporary directory, journaled into a SQLite file in the
/// same directory so it can be reopened.
pub struct TestApp {
    /// Keeps the directory alive
    pub dir: TempDir,
    pub db_pool: DatabasePool,
    pub journal: Journal,
    pub tree: Arc<FileTree>,
}

impl TestApp {
    /// Create a new test application in discovery mode
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        Self::open(dir, true).await
    }

    /// Open the tree and journal over an existing directory
    pub async fn open(dir: TempDir, discovery: bool) -> Self {
        Self::open_with(dir, tree_config_for(discovery, "USERS")).await
    }

    pub async fn open_with(dir: TempDir, tree: TreeConfig) -> Self {
        let (db_pool, journal) = start_journal(&dir).await;
        let tree = open_tree(&dir, tree, journal.clone()).await;
        Self {
            dir,
            db_pool,
            journal,
            tree,
        }
    }

    /// Close everything and open it again over the same directory
    pub async fn reopen(self, discovery: bool) -> Self {
        let Self {
            dir,
            db_pool,
            journal,
            tree,
        } = self;
        journal.close().await.unwrap();
        drop(tree);
        db_pool.close().await;
        Self::open(dir, discovery).await
    }

    pub fn files_root(&self) -> PathBuf {
        self.tree.root_path().to_path_buf()
    }

    pub fn root_id(&self) -> FileId {
        self.tree.root().id()
    }
}

pub fn tree_config_for(discovery: bool, alias: &str) -> TreeConfig {
    TreeConfig {
        root_path: String::new(),
        root_alias: alias.to_string(),
        discovery,
        ..TreeConfig::default()
    }
}

/// Connect to `history.db` inside `dir` and start a journal on it
pub async fn start_journal(dir: &TempDir) -> (DatabasePool, Journal) {
    let config = DatabaseConfig {
        url: format!("sqlite://{}", dir.path().join("history.db").display()),
        ..DatabaseConfig::default()
    };
    let db_pool = DatabasePool::connect(&config).await.unwrap();
    filehub_database::migration::run_migrations(db_pool.pool())
        .await
        .unwrap();
    let store = Arc::new(SqliteLifetimeStore::new(db_pool.pool().clone()));
    let journal = Journal::start(&JournalConfig::default(), store).await.unwrap();
    (db_pool, journal)
}

/// Open a tree rooted at `files/` inside `dir`
pub async fn open_tree(dir: &TempDir, mut config: TreeConfig, journal: Journal) -> Arc<FileTree> {
    config.root_path = dir.path().join("files").to_string_lossy().into_owned();
    let tree = FileTree::builder(config, journal)
        .hasher(Arc::new(Sha256ContentHasher::new()))
        .open()
        .await
        .unwrap();
    Arc::new(tree)
}

/// Poll the journal until `id` has a lifetime
pub async fn wait_for_lifetime(journal: &Journal, id: FileId) -> Option<Lifetime> {
    for _ in 0..100 {
        if let Some(lifetime) = journal.get(id) {
            return Some(lifetime);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    None
}

/// Assert every node is its parent's child under its name and is
/// registered under its own id.
pub fn assert_consistent(tree: &FileTree) {
    for node in tree.root().subtree() {
        assert_eq!(tree.get(node.id()).map(|n| n.id()), Some(node.id()));
        if node.id() == tree.root().id() {
            continue;
        }
        let parent = node.parent().expect("non-root node has a parent");
        assert_eq!(node.parent_id(), Some(parent.id()));
        assert_eq!(
            parent.child(&node.filename()).map(|n| n.id()),
            Some(node.id())
        );
        assert_eq!(
            tree.portable_to_abs(&node.portable()).unwrap(),
            node.abs_path()
        );
    }
    assert_eq!(tree.root().subtree().len(), tree.len());
}
