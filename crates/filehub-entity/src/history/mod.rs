//! File history entities: actions, lifetimes, and point-in-time views.

pub mod action;
pub mod lifetime;
pub mod past;

pub use action::{EventStamp, FileAction, FileActionType, action_timestamp};
pub use lifetime::Lifetime;
pub use past::PastFile;
