//! # filehub-database
//!
//! Persistence for file history: the [`LifetimeStore`] contract, the SQLite
//! repository behind it, an in-memory implementation, and connection and
//! migration management.

pub mod connection;
pub mod memory;
pub mod migration;
pub mod repositories;
pub mod store;

pub use connection::DatabasePool;
pub use memory::MemoryLifetimeStore;
pub use repositories::SqliteLifetimeStore;
pub use store::LifetimeStore;
