//! Convenience result type alias for FileHub.

use crate::error::AppError;

/// A specialized `Result` type for tree, journal, and store operations.
pub type AppResult<T> = Result<T, AppError>;
