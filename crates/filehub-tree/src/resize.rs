//! Size propagation.
//!
//! Directory sizes are the sum of their children. A pass recomputes sizes
//! in order and records a SizeChange for every node whose size differs from
//! the one last recorded, either earlier in the same event or in its
//! lifetime. Trees whose journal ignores local changes never resize.

use std::sync::Arc;

use tracing::trace;

use filehub_core::result::AppResult;
use filehub_core::types::FileId;
use filehub_entity::FileAction;
use filehub_history::FileEvent;

use crate::node::FileNode;
use crate::tree::FileTree;

type ResizeCallback<'a> = dyn FnMut(&Arc<FileNode>) + Send + 'a;

impl FileTree {
    /// Recompute sizes under `id`, children before parents.
    /// `on_resize` sees every node once its new size is set.
    pub async fn resize_down<F>(
        &self,
        id: FileId,
        event: Option<&Arc<FileEvent>>,
        mut on_resize: F,
    ) -> AppResult<()>
    where
        F: FnMut(&Arc<FileNode>) + Send,
    {
        if self.journal.ignore_local() {
            return Ok(());
        }
        let guard = self.lock_structure().await;
        let anchor = self.require(id)?;
        let scope = self.scope(event);
        if let Err(err) = self
            .resize_down_nodes(&anchor, scope.event(), &mut on_resize)
            .await
        {
            return Err(scope.abandon(&self.journal, err).await);
        }
        let pending = scope.submit(&self.journal).await?;
        drop(guard);
        pending.wait().await
    }

    /// Recompute the size of `id` and each of its ancestors, leaving
    /// siblings and children untouched.
    pub async fn resize_up<F>(
        &self,
        id: FileId,
        event: Option<&Arc<FileEvent>>,
        mut on_resize: F,
    ) -> AppResult<()>
    where
        F: FnMut(&Arc<FileNode>) + Send,
    {
        if self.journal.ignore_local() {
            return Ok(());
        }
        let guard = self.lock_structure().await;
        let anchor = self.require(id)?;
        let scope = self.scope(event);
        for node in anchor.ancestors() {
            if let Err(err) = self.resize_node(&node, scope.event(), &mut on_resize).await {
                return Err(scope.abandon(&self.journal, err).await);
            }
        }
        let pending = scope.submit(&self.journal).await?;
        drop(guard);
        pending.wait().await
    }

    pub(crate) async fn resize_down_nodes(
        &self,
        anchor: &Arc<FileNode>,
        event: &Arc<FileEvent>,
        on_resize: &mut ResizeCallback<'_>,
    ) -> AppResult<()> {
        if self.journal.ignore_local() {
            return Ok(());
        }
        for node in anchor.leaves_first() {
            self.resize_node(&node, event, on_resize).await?;
        }
        Ok(())
    }

    async fn resize_node(
        &self,
        node: &Arc<FileNode>,
        event: &Arc<FileEvent>,
        on_resize: &mut ResizeCallback<'_>,
    ) -> AppResult<()> {
        let size = if node.is_dir() {
            node.children().iter().map(|c| c.size().max(0)).sum()
        } else {
            self.disk.stat(&node.abs_path()).await?.size
        };
        node.set_size(size);
        on_resize(node);

        if node.id() == self.root().id() {
            return Ok(());
        }
        let recorded = event.latest_size_for(node.id()).or_else(|| {
            self.journal
                .get(node.id())
                .filter(|l| l.is_live())
                .map(|l| l.latest_size())
        });
        match recorded {
            Some(recorded) if recorded == size => {}
            Some(_) => event.append(FileAction::resized(
                &event.stamp(),
                node.id(),
                node.portable(),
                node.parent_id(),
                size,
                node.content_id(),
            )),
            None => trace!(file_id = %node.id(), "No recorded size, skipping size change"),
        }
        Ok(())
    }
}
