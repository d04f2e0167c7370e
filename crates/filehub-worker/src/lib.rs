//! Background job processing for the FileHub tree.
//!
//! This crate provides:
//! - A dispatcher that runs registered job handlers with bounded concurrency
//! - The directory scan job
//! - A scheduler for periodic rescans

pub mod dispatcher;
pub mod executor;
pub mod jobs;
pub mod scheduler;

pub use dispatcher::{JobDispatcher, JobHandle};
pub use executor::{JobContext, JobExecutionError, JobHandler};
pub use scheduler::RescanScheduler;
