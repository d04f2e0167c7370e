//! Built-in job handler implementations.

pub mod scan;

pub use scan::{SCAN_DIRECTORY, ScanDirectoryHandler};
