//! Unified application error types for FileHub.
//!
//! All crates map their internal errors into [`AppError`] for consistent
//! propagation through the ? operator. Callers pick a response from
//! [`AppError::kind`] and, where they need the precise condition, from
//! [`AppError::code`]; neither requires inspecting the message.

use std::fmt;
use thiserror::Error;

/// Top-level error kind categorization used across the entire application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// The requested file, lifetime, or record was not found.
    NotFound,
    /// Input validation failed.
    Validation,
    /// A structural conflict occurred (duplicate identity, destination exists, etc.).
    Conflict,
    /// An internal invariant was violated.
    Internal,
    /// A database error occurred.
    Database,
    /// A filesystem I/O error occurred.
    Storage,
    /// A configuration error occurred.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// The service is temporarily unavailable.
    ServiceUnavailable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::Conflict => write!(f, "CONFLICT"),
            Self::Internal => write!(f, "INTERNAL"),
            Self::Database => write!(f, "DATABASE"),
            Self::Storage => write!(f, "STORAGE"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::ServiceUnavailable => write!(f, "SERVICE_UNAVAILABLE"),
        }
    }
}

/// Stable, fine-grained error conditions raised by the tree and journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorCode {
    /// A node with the same identity is already registered.
    DuplicateIdentity,
    /// A file already exists at the destination.
    AlreadyExists,
    /// The operation needs a directory.
    DirectoryRequired,
    /// The operation needs a non-empty filename.
    FilenameRequired,
    /// Moving a file onto its current location.
    EmptyMove,
    /// Moving a directory into its own subtree.
    InvalidMove,
    /// Deleting a directory that still has children.
    NotEmpty,
    /// The operation is not permitted on the tree root.
    RootFolder,
    /// Unknown file identity or path.
    FileNotFound,
    /// The parent of a node could not be resolved.
    ParentNotFound,
    /// Unknown lifetime identity.
    LifetimeNotFound,
    /// An absolute path that does not fall under the tree root.
    PathOutsideRoot,
    /// A portable path whose root alias belongs to another tree.
    RootAliasMismatch,
    /// A string that is not `ALIAS:relative/path`.
    InvalidPortablePath,
    /// A create action for a lifetime that already exists.
    LifetimeExists,
    /// An action appended to a lifetime that has been deleted.
    LifetimeClosed,
    /// A lifetime whose action list is malformed.
    InvalidLifetime,
    /// A lifetime recorded by a different server.
    ServerMismatch,
    /// The journal no longer accepts events.
    JournalClosed,
    /// The journal worker rejected or failed to persist an event.
    EventFailed,
}

impl ErrorCode {
    /// The category this condition belongs to.
    pub fn kind(self) -> ErrorKind {
        match self {
            Self::DuplicateIdentity | Self::AlreadyExists | Self::NotEmpty => ErrorKind::Conflict,
            Self::DirectoryRequired
            | Self::FilenameRequired
            | Self::EmptyMove
            | Self::InvalidMove
            | Self::RootFolder
            | Self::PathOutsideRoot
            | Self::RootAliasMismatch
            | Self::InvalidPortablePath => ErrorKind::Validation,
            Self::FileNotFound | Self::ParentNotFound | Self::LifetimeNotFound => {
                ErrorKind::NotFound
            }
            Self::LifetimeExists
            | Self::LifetimeClosed
            | Self::InvalidLifetime
            | Self::ServerMismatch
            | Self::EventFailed => ErrorKind::Internal,
            Self::JournalClosed => ErrorKind::ServiceUnavailable,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// The unified application error used throughout FileHub.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// The precise condition, when one applies.
    pub code: Option<ErrorCode>,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
            source: None,
        }
    }

    /// Create an error for a specific condition; the kind follows from the code.
    pub fn coded(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            kind: code.kind(),
            code: Some(code),
            message: message.into(),
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            code: None,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// The precise condition, if any.
    pub fn code(&self) -> Option<ErrorCode> {
        self.code
    }

    /// Whether this error carries the given condition.
    pub fn is(&self, code: ErrorCode) -> bool {
        self.code == Some(code)
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create a service-unavailable error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceUnavailable, message)
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            code: self.code,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Storage, format!("I/O error: {err}"), err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}
