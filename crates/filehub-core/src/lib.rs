//! # filehub-core
//!
//! Core crate for the FileHub file journal. Contains configuration schemas,
//! typed identifiers, the collaborator traits the file tree consumes, and
//! the unified error system.
//!
//! This crate has **no** internal dependencies on other FileHub crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::{AppError, ErrorCode, ErrorKind};
pub use result::AppResult;
