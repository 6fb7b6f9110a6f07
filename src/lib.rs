//! AL Trace Studio
//!
//! Call-tree reconstruction and timing aggregation for flat trace-event
//! streams recorded from an instrumented AL server.
//!
//! The stream only carries method-enter, method-exit, and
//! statement-executed records with timestamps; this library infers the
//! call-stack structure, merges repeated calls into aggregated nodes
//! with hit counts and duration statistics, repairs malformed streams
//! with synthetic marker nodes, and renders the result as JSON, text,
//! or an SVG flamegraph.

pub mod aggregator;
pub mod commands;
pub mod events;
pub mod flamegraph;
pub mod output;
pub mod utils;
