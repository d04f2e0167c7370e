//! Typed identifiers for files, events and jobs.
//!
//! New identifiers are UUID v7 and sort by creation time. The root folder
//! of a tree is the exception: its id is derived from the root alias.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// A fresh, time-ordered identifier.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.hyphenated().fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

uuid_id!(
    /// Identity of a file, kept across renames and moves. A file's lifetime
    /// is keyed by the same value.
    FileId
);

uuid_id!(
    /// Identity of one batch of journaled actions.
    FileEventId
);

uuid_id!(
    /// Identity of a dispatched background job.
    JobId
);

const ROOT_NAMESPACE: Uuid = Uuid::NAMESPACE_OID;

impl FileId {
    /// Identity of the root folder of the tree mounted under `alias`.
    pub fn root_for(alias: &str) -> Self {
        Self(Uuid::new_v5(
            &ROOT_NAMESPACE,
            format!("filehub:root:{alias}").as_bytes(),
        ))
    }

    /// Whether this is the root folder id for `alias`.
    pub fn is_root_of(&self, alias: &str) -> bool {
        *self == Self::root_for(alias)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_ids_are_v7() {
        let id = JobId::new();
        assert_eq!(id.0.get_version_num(), 7);
        assert_ne!(id, JobId::new());
    }

    #[test]
    fn test_parse_accepts_surrounding_whitespace() {
        let id = FileId::new();
        let parsed: FileId = format!(" {id}\n").parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<FileId>().is_err());
    }

    #[test]
    fn test_root_id_is_stable_per_alias() {
        let root = FileId::root_for("USERS");
        assert_eq!(root, FileId::root_for("USERS"));
        assert!(root.is_root_of("USERS"));
        assert!(!root.is_root_of("BACKUP"));
    }

    #[test]
    fn test_serde_is_transparent() {
        let id = FileEventId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }
}
