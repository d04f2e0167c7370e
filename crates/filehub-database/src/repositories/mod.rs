//! Concrete repository implementations backed by SQLite.

pub mod lifetime;

pub use lifetime::SqliteLifetimeStore;
