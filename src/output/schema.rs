//! Profile output schema.
//!
//! The JSON document written by the analyze command: one metadata header
//! plus the flattened call tree in pre-order, one record per node.

use crate::aggregator::{EventAggregator, NodeView};
use crate::utils::config::{MAX_STATEMENT_DISPLAY_LENGTH, SCHEMA_VERSION};
use serde::{Deserialize, Serialize};

/// Complete profile document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    /// Schema version, see [`SCHEMA_VERSION`]
    pub version: String,

    /// Trace file the profile was built from
    pub source: String,

    /// Pruning threshold the tree was reduced with, in milliseconds
    pub threshold_msec: f64,

    /// Number of sessions in the capture
    pub session_count: usize,

    /// Latest activity across the whole capture, in milliseconds
    pub max_relative_timestamp_msec: f64,

    /// Flattened call tree, pre-order
    pub nodes: Vec<ProfileNode>,

    /// RFC 3339 timestamp of profile generation
    pub generated_at: String,
}

/// One aggregated call-tree node, flattened.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileNode {
    pub session_id: i32,

    /// Tree depth; session container nodes sit at depth 1 in
    /// multi-session profiles, 0 otherwise
    pub depth: u32,

    /// Statement text, truncated for display
    pub statement: String,

    /// Owning object type; empty for non-AL nodes
    pub object_type: String,

    /// Owning object id; 0 for non-AL nodes
    pub object_id: i32,

    /// Source line number; 0 for non-statement nodes
    pub line_no: i32,

    pub hit_count: u32,

    /// Cumulative duration across all occurrences, in milliseconds
    pub duration_msec: f64,

    pub min_duration_msec: f64,

    pub max_duration_msec: f64,

    /// Milliseconds between this subtree's last activity and the end of
    /// the capture
    pub last_active_msec: f64,
}

/// Build a [`Profile`] from a finished aggregation.
///
/// **Public** - bridge between the aggregation core and the JSON writer
///
/// Must be called after `finish_aggregation`, otherwise the relative
/// timestamp aggregates are still zero.
pub fn to_profile(
    aggregator: &mut dyn EventAggregator,
    source: &str,
    threshold_msec: f64,
    session_count: usize,
) -> Profile {
    let max_relative_timestamp_msec = aggregator.max_relative_timestamp();

    let nodes = aggregator
        .flatten_call_tree()
        .map(|view| profile_node(view, max_relative_timestamp_msec))
        .collect();

    Profile {
        version: SCHEMA_VERSION.to_string(),
        source: source.to_string(),
        threshold_msec,
        session_count,
        max_relative_timestamp_msec,
        nodes,
        generated_at: chrono::Utc::now().to_rfc3339(),
    }
}

fn profile_node(view: NodeView<'_>, global_max_msec: f64) -> ProfileNode {
    let node = view.node();

    ProfileNode {
        session_id: node.session_id,
        depth: view.depth(),
        statement: truncate_statement(&node.statement),
        object_type: node.object_type.to_string(),
        object_id: node.object_id,
        line_no: node.line_no,
        hit_count: node.hit_count,
        duration_msec: node.duration_msec,
        min_duration_msec: node.min_duration_msec,
        max_duration_msec: node.max_duration_msec,
        last_active_msec: view.last_active_msec(global_max_msec),
    }
}

/// Truncate a statement to the display limit on a character boundary.
///
/// **Public** - shared with the text renderer
pub fn truncate_statement(statement: &str) -> String {
    if statement.chars().count() <= MAX_STATEMENT_DISPLAY_LENGTH {
        return statement.to_string();
    }

    statement
        .chars()
        .take(MAX_STATEMENT_DISPLAY_LENGTH)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::SessionAggregator;
    use crate::events::ids;
    use serde_json::json;

    fn al_event(event_id: u16, name: &str, ts: f64) -> crate::events::RawEvent {
        crate::events::RawEvent {
            event_id,
            timestamp_msec: ts,
            payload: vec![
                json!("default"),
                json!(1),
                json!("user"),
                json!("CodeUnit"),
                json!(50000),
                json!(name),
                json!(0),
                json!(""),
            ],
        }
    }

    #[test]
    fn test_to_profile_flattens_finished_tree() {
        let mut aggregator = SessionAggregator::new(1, 0.0);
        aggregator.on_event(&al_event(ids::AL_FUNCTION_START, "OnRun", 0.0));
        aggregator.on_event(&al_event(ids::AL_FUNCTION_STOP, "OnRun", 10.0));
        aggregator.finish_aggregation(true);

        let profile = to_profile(&mut aggregator, "trace.json", 0.0, 1);

        assert_eq!(profile.version, SCHEMA_VERSION);
        assert_eq!(profile.source, "trace.json");
        assert_eq!(profile.max_relative_timestamp_msec, 10.0);
        assert_eq!(profile.nodes.len(), 2);

        let on_run = &profile.nodes[1];
        assert_eq!(on_run.statement, "OnRun");
        assert_eq!(on_run.duration_msec, 10.0);
        assert_eq!(on_run.hit_count, 1);
        assert_eq!(on_run.last_active_msec, 0.0);
    }

    #[test]
    fn test_truncate_statement_respects_char_boundaries() {
        let long = "ä".repeat(300);
        let truncated = truncate_statement(&long);
        assert_eq!(truncated.chars().count(), 250);

        assert_eq!(truncate_statement("short"), "short");
    }
}
