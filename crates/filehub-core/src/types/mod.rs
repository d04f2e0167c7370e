//! Core type definitions used across the FileHub workspace.

pub mod id;

pub use id::*;
