//! Utility modules shared by the pipeline.
//!
//! - Error types
//! - Source location tracking
//! - Pretty printing and code formatting

pub mod errors;
pub mod location;
pub mod pretty;

// Re-exports
pub use errors::*;
pub use location::{SourceLocation, SourceMap, Span};
pub use pretty::{CodeFormatter, PrettyPrint};
