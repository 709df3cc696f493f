//! Bookstore application library
//!
//! Provides the book catalogue module and the bootstrap used by the binaries.

pub mod app;
pub mod modules;

/// Re-export commonly used types
pub use modules::*;
