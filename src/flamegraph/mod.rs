//! Flamegraph generation from aggregated call trees.

pub mod generator;

// Re-export main types
pub use generator::{collapse_call_tree, generate_flamegraph, FlamegraphConfig};
