//! # filehub-entity
//!
//! History models for the FileHub journal. Every type here is a plain,
//! serializable value: portable paths, the actions recorded against a
//! file, the lifetime that collects them, and point-in-time views.

pub mod history;
pub mod path;

pub use history::{EventStamp, FileAction, FileActionType, Lifetime, PastFile, action_timestamp};
pub use path::PortablePath;
