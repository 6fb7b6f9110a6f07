//! CLI command implementations.

pub mod analyze;

// Re-export main types
pub use analyze::{execute_analyze, validate_args, AnalyzeArgs};
