//! Configuration and constants for the CLI.

/// Current output schema version
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Default pruning threshold in milliseconds. Zero disables pruning:
/// every node survives `finish_aggregation` regardless of duration.
pub const DEFAULT_THRESHOLD_MSEC: f64 = 0.0;

/// Statements longer than this are truncated for display. The emitting
/// server caps statement text at roughly this length anyway.
pub const MAX_STATEMENT_DISPLAY_LENGTH: usize = 250;

/// Sentinel session id selecting the multi-session demultiplexer
/// instead of a single-session aggregator.
pub const MULTIPLE_SESSIONS_ID: i32 = -1;
