//! Machine-independent file locations.

pub mod portable;

pub use portable::PortablePath;
