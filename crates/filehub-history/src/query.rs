//! Point-in-time reconstruction over the lifetime map.

use chrono::{DateTime, Utc};

use filehub_core::types::FileId;
use filehub_entity::{FileAction, Lifetime, PastFile};

/// Children of `folder_id` just before `time`.
///
/// Each lifetime contributes its latest action strictly before `time`, and
/// only if that action left the file inside the folder. Files that had
/// already moved away, been deleted, or not yet arrived are excluded.
pub(crate) fn past_children<'a>(
    lifetimes: impl Iterator<Item = &'a Lifetime>,
    folder_id: FileId,
    time: DateTime<Utc>,
) -> Vec<PastFile> {
    let mut children: Vec<PastFile> = lifetimes
        .filter(|l| l.id != folder_id)
        .filter_map(|l| l.action_before(time))
        .filter(|a| a.parent_id == Some(folder_id))
        .filter_map(PastFile::from_action)
        .collect();
    children.sort_by(|a, b| a.path.filename().cmp(b.path.filename()));
    children
}

/// Every action strictly after `time`, oldest first. Parents sort before
/// their children when timestamps tie.
pub(crate) fn actions_since<'a>(
    lifetimes: impl Iterator<Item = &'a Lifetime>,
    time: DateTime<Utc>,
) -> Vec<FileAction> {
    let mut actions: Vec<FileAction> = lifetimes
        .flat_map(|l| l.actions.iter().filter(|a| a.timestamp > time).cloned())
        .collect();
    actions.sort_by(|a, b| {
        a.timestamp.cmp(&b.timestamp).then_with(|| {
            let depth = |x: &FileAction| x.relevant_path().map_or(0, |p| p.depth());
            depth(a).cmp(&depth(b))
        })
    });
    actions
}
