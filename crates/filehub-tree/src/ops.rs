//! Structural mutations: delete, move, touch and mkdir.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, error, warn};

use filehub_core::error::{AppError, ErrorCode};
use filehub_core::result::AppResult;
use filehub_core::types::FileId;
use filehub_entity::FileAction;
use filehub_history::FileEvent;

use crate::node::{FileNode, FrozenNode, NodeSpec};
use crate::tree::{EventScope, FileTree, validate_filename};

/// One node relocated by [`FileTree::move_node`].
#[derive(Debug, Clone)]
pub struct MoveInfo {
    /// The node as it was before the move.
    pub from: FrozenNode,
    /// The live node at its new location.
    pub to: Arc<FileNode>,
}

/// Outcome of [`FileTree::mkdir`].
#[derive(Debug, Clone)]
pub enum MkDirResult {
    /// A new directory was created on disk.
    Created(Arc<FileNode>),
    /// The directory was already there, in the tree or only on disk.
    AlreadyExists(Arc<FileNode>),
}

impl MkDirResult {
    pub fn node(&self) -> &Arc<FileNode> {
        match self {
            Self::Created(node) | Self::AlreadyExists(node) => node,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

fn deleted_action(scope: &EventScope, node: &FileNode) -> FileAction {
    FileAction::deleted(
        &scope.stamp(),
        node.id(),
        node.portable(),
        node.parent_id(),
        node.size(),
        node.content_id(),
    )
}

impl FileTree {
    /// Remove a file or an empty directory from disk, then from the tree.
    pub async fn delete(&self, id: FileId, event: Option<&Arc<FileEvent>>) -> AppResult<()> {
        let guard = self.lock_structure().await;
        let node = self.require(id)?;
        if id.is_root_of(self.root_alias()) {
            return Err(AppError::coded(
                ErrorCode::RootFolder,
                "The root folder cannot be deleted",
            ));
        }
        if node.is_dir() && node.child_count() > 0 {
            return Err(AppError::coded(
                ErrorCode::NotEmpty,
                format!("{} is not empty", node.portable()),
            ));
        }

        let scope = self.scope(event);
        match self.disk.remove(&node.abs_path()).await {
            Ok(()) => {}
            Err(err) if err.is(ErrorCode::FileNotFound) => {
                warn!(file_id = %id, path = %node.portable(), "Deleting file already gone from disk");
            }
            Err(err) => return Err(err),
        }
        self.remove(id)?;
        scope.event().append(deleted_action(&scope, &node));
        debug!(file_id = %id, path = %node.portable(), "Deleted file");
        let pending = scope.submit(&self.journal).await?;
        drop(guard);
        pending.wait().await
    }

    /// Move `id` into `new_parent_id` under `new_name`.
    ///
    /// With `overwrite`, an existing destination is set aside before the
    /// rename and only removed once the rename succeeded; a failed rename
    /// puts it back and records nothing. Returns one entry per relocated
    /// node, parents first.
    pub async fn move_node(
        &self,
        id: FileId,
        new_parent_id: FileId,
        new_name: &str,
        overwrite: bool,
        event: Option<&Arc<FileEvent>>,
    ) -> AppResult<Vec<MoveInfo>> {
        let guard = self.lock_structure().await;
        let node = self.require(id)?;
        let new_parent = self.require(new_parent_id)?;
        if !new_parent.is_dir() {
            return Err(AppError::coded(
                ErrorCode::DirectoryRequired,
                format!("{} is not a directory", new_parent.portable()),
            ));
        }
        validate_filename(new_name)?;
        if id.is_root_of(self.root_alias()) {
            return Err(AppError::coded(
                ErrorCode::RootFolder,
                "The root folder cannot be moved",
            ));
        }
        let old_parent = node.parent().ok_or_else(|| {
            AppError::coded(
                ErrorCode::ParentNotFound,
                format!("{} has no parent", node.portable()),
            )
        })?;
        let old_name = node.filename();
        if old_parent.id() == new_parent.id() && old_name == new_name {
            return Err(AppError::coded(
                ErrorCode::EmptyMove,
                format!("{} is already at its destination", node.portable()),
            ));
        }
        if node.is_ancestor_of(&new_parent) {
            return Err(AppError::coded(
                ErrorCode::InvalidMove,
                format!(
                    "Cannot move {} into {}",
                    node.portable(),
                    new_parent.portable()
                ),
            ));
        }

        let old_abs = node.abs_path();
        let new_abs = new_parent.abs_path().join(new_name);
        let existing = new_parent.child(new_name);
        let on_disk = self.disk.exists(&new_abs).await?;
        if existing.is_some() || on_disk {
            if !overwrite {
                return Err(AppError::coded(
                    ErrorCode::AlreadyExists,
                    format!(
                        "{} already exists",
                        new_parent.portable().child(new_name, node.is_dir())
                    ),
                ));
            }
            let replaced = new_parent.portable().child(new_name, true);
            if node.portable().starts_with(&replaced) {
                return Err(AppError::coded(
                    ErrorCode::InvalidMove,
                    format!(
                        "Cannot overwrite {replaced} with its own descendant {}",
                        node.portable()
                    ),
                ));
            }
        }

        // Anything already at the destination waits under a temporary name
        // until the source is in place.
        let set_aside = if on_disk {
            let aside = new_parent
                .abs_path()
                .join(format!(".filehub-replaced-{}", FileId::new()));
            self.disk.rename(&new_abs, &aside).await?;
            Some(aside)
        } else {
            None
        };
        if let Err(err) = self.disk.rename(&old_abs, &new_abs).await {
            if let Some(aside) = &set_aside {
                if let Err(undo) = self.disk.rename(aside, &new_abs).await {
                    error!(
                        path = %new_abs.display(),
                        aside = %aside.display(),
                        error = %undo,
                        "Failed to put back overwritten destination"
                    );
                }
            }
            return Err(err);
        }

        let scope = self.scope(event);
        if let Some(existing) = existing {
            for removed in self.remove(existing.id())? {
                scope.event().append(deleted_action(&scope, &removed));
            }
        }
        if let Some(aside) = &set_aside {
            if let Err(err) = self.disk.remove_all(aside).await {
                warn!(path = %aside.display(), error = %err, "Failed to remove overwritten entry");
            }
        }

        let subtree = node.subtree();
        let before: Vec<FrozenNode> = subtree.iter().map(|n| n.freeze()).collect();

        old_parent.remove_child(&old_name);
        node.set_location(
            new_name.to_string(),
            new_abs.clone(),
            new_parent.portable().child(new_name, node.is_dir()),
        );
        node.set_parent(&new_parent);
        if let Err(err) = new_parent.add_child(Arc::clone(&node)) {
            restore(&node, &old_parent, &subtree, &before);
            if let Err(undo) = self.disk.rename(&new_abs, &old_abs).await {
                error!(file_id = %id, error = %undo, "Failed to undo rename");
            }
            return Err(scope.abandon(&self.journal, err).await);
        }
        for descendant in subtree.iter().skip(1) {
            if let Some(parent) = descendant.parent() {
                let name = descendant.filename();
                descendant.set_paths(
                    parent.abs_path().join(&name),
                    parent.portable().child(&name, descendant.is_dir()),
                );
            }
        }
        node.touch_modified();

        let stamp = scope.stamp();
        let mut moves = Vec::with_capacity(subtree.len());
        for (moved, from) in subtree.into_iter().zip(before) {
            scope.event().append(FileAction::moved(
                &stamp,
                moved.id(),
                from.portable.clone(),
                moved.portable(),
                moved.parent_id(),
                moved.size(),
                moved.content_id(),
            ));
            moves.push(MoveInfo { from, to: moved });
        }
        debug!(
            file_id = %id,
            to = %node.portable(),
            nodes = moves.len(),
            "Moved file"
        );
        let pending = scope.submit(&self.journal).await?;
        drop(guard);
        pending.wait().await?;
        Ok(moves)
    }

    /// Create an empty file, or one holding `data`, named `name` in `parent_id`.
    pub async fn touch(
        &self,
        parent_id: FileId,
        name: &str,
        data: Option<Bytes>,
        event: Option<&Arc<FileEvent>>,
    ) -> AppResult<Arc<FileNode>> {
        let guard = self.lock_structure().await;
        let parent = self.creatable_parent(parent_id, name)?;
        if parent.child(name).is_some() {
            return Err(AppError::coded(
                ErrorCode::AlreadyExists,
                format!("{} already exists", parent.portable().child(name, false)),
            ));
        }

        let scope = self.scope(event);
        let abs = parent.abs_path().join(name);
        let size = self.disk.create_file(&abs, data.as_ref()).await?;
        let content_id = self.content_id_for(&abs, size).await?;

        let mut spec = NodeSpec::at(parent.id(), parent.portable().child(name, false));
        spec.filename = Some(name.to_string());
        spec.abs_path = Some(abs);
        spec.size = size;
        spec.content_id = content_id;
        let node = self.add(spec)?.ok_or_else(|| ignored(name))?;

        scope.event().append(FileAction::created(
            &scope.stamp(),
            node.id(),
            node.portable(),
            node.parent_id(),
            size,
            node.content_id(),
        ));
        debug!(file_id = %node.id(), path = %node.portable(), size, "Created file");
        let pending = scope.submit(&self.journal).await?;
        drop(guard);
        pending.wait().await?;
        Ok(node)
    }

    /// Create a directory named `name` in `parent_id`.
    ///
    /// A directory already on disk but unknown to the tree is imported with
    /// its contents and reported as [`MkDirResult::AlreadyExists`].
    pub async fn mkdir(
        &self,
        parent_id: FileId,
        name: &str,
        event: Option<&Arc<FileEvent>>,
    ) -> AppResult<MkDirResult> {
        let guard = self.lock_structure().await;
        let parent = self.creatable_parent(parent_id, name)?;
        if let Some(existing) = parent.child(name) {
            if existing.is_dir() {
                return Ok(MkDirResult::AlreadyExists(existing));
            }
            return Err(AppError::coded(
                ErrorCode::AlreadyExists,
                format!("{} already exists as a file", existing.portable()),
            ));
        }

        let scope = self.scope(event);
        let abs = parent.abs_path().join(name);
        let created = self.disk.create_dir(&abs).await?;

        let mut spec = NodeSpec::at(parent.id(), parent.portable().child(name, true));
        spec.filename = Some(name.to_string());
        spec.abs_path = Some(abs);
        if created {
            spec.size = 0;
        }
        let node = self.add(spec)?.ok_or_else(|| ignored(name))?;
        scope.event().append(FileAction::created(
            &scope.stamp(),
            node.id(),
            node.portable(),
            node.parent_id(),
            node.size(),
            None,
        ));

        let result = if created {
            debug!(file_id = %node.id(), path = %node.portable(), "Created directory");
            MkDirResult::Created(node)
        } else {
            debug!(file_id = %node.id(), path = %node.portable(), "Importing existing directory");
            let imported = match self.scan_locked(&node, scope.event()).await {
                Ok(_) => {
                    self.resize_down_nodes(&node, scope.event(), &mut |_| {})
                        .await
                }
                Err(err) => Err(err),
            };
            if let Err(err) = imported {
                return Err(scope.abandon(&self.journal, err).await);
            }
            MkDirResult::AlreadyExists(node)
        };
        let pending = scope.submit(&self.journal).await?;
        drop(guard);
        pending.wait().await?;
        Ok(result)
    }

    fn creatable_parent(&self, parent_id: FileId, name: &str) -> AppResult<Arc<FileNode>> {
        let parent = self.require(parent_id)?;
        if !parent.is_dir() {
            return Err(AppError::coded(
                ErrorCode::DirectoryRequired,
                format!("{} is not a directory", parent.portable()),
            ));
        }
        validate_filename(name)?;
        if self.is_ignored(name) {
            return Err(ignored(name));
        }
        Ok(parent)
    }
}

fn ignored(name: &str) -> AppError {
    AppError::validation(format!("'{name}' is an ignored filename"))
}

fn restore(
    node: &Arc<FileNode>,
    old_parent: &Arc<FileNode>,
    subtree: &[Arc<FileNode>],
    before: &[FrozenNode],
) {
    for (n, frozen) in subtree.iter().zip(before) {
        n.set_location(
            frozen.filename.clone(),
            frozen.abs_path.clone(),
            frozen.portable.clone(),
        );
    }
    node.set_parent(old_parent);
    if let Err(err) = old_parent.add_child(Arc::clone(node)) {
        error!(file_id = %node.id(), error = %err, "Failed to restore node after aborted move");
    }
}
