//! Raw trace events and their classification.
//!
//! This module handles:
//! - The raw event record replayed from a recorded trace file
//! - The numeric event-id and payload-index tables of the server's manifest
//! - Classifying event ids into (kind, sub-type, text source) tuples
//! - Reading recorded trace files from disk
//!
//! The aggregation core never touches event ids directly: it depends only
//! on the output of [`classify`].

pub mod classifier;
pub mod ids;
pub mod raw;

// Re-export main types
pub use classifier::{classify, Classification, StatementSource};
pub use raw::{read_trace_file, RawEvent};
