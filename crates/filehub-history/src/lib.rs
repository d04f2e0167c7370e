//! # filehub-history
//!
//! File events group the actions of one logical operation; the journal
//! merges submitted events into lifetimes through a single worker task and
//! answers historical queries.

pub mod event;
pub mod journal;
mod query;
mod worker;

pub use event::{EventStatus, FileEvent};
pub use journal::Journal;
