//! Per-session call-tree reconstruction.
//!
//! The session aggregator is a sequential fold over one session's event
//! stream. It keeps a cursor into the aggregated call tree that mirrors
//! the call stack of the traced session: statements and method starts
//! push, method stops pop, and repeated identities merge into the node
//! created by their first occurrence. The stream is not guaranteed to be
//! well-formed; anomalies are repaired in place by synthesizing a
//! zero-duration marker node whose label documents what was missing, so
//! the tree always finishes fully closed.

use crate::aggregator::event::{EventKind, EventSubType, ProfilerEvent};
use crate::aggregator::interner::StatementInterner;
use crate::aggregator::node::{CallTree, NodeId, PreOrderIter};
use crate::events::classifier::{self, Classification, StatementSource};
use crate::events::ids;
use crate::events::raw::RawEvent;
use log::debug;
use std::sync::Arc;

/// Label prefix of the marker node synthesized for a stop event whose
/// start was never observed.
pub const START_EVENT_IS_MISSING: &str = "Start event is missing: ";

/// Label prefix of the marker node synthesized for a start event whose
/// stop was never observed.
pub const STOP_EVENT_IS_MISSING: &str = "Stop event is missing: ";

/// Builds the aggregated call tree for a single session.
///
/// **Public** - driven by the demultiplexer or directly by the host
#[derive(Debug)]
pub struct SessionAggregator {
    session_id: i32,
    threshold_msec: f64,
    tree: CallTree,
    cursor: NodeId,
    previous: Option<ProfilerEvent>,
    awaiting_first_event: bool,
    suspended: bool,
    interner: StatementInterner,
}

impl SessionAggregator {
    pub fn new(session_id: i32, threshold_msec: f64) -> Self {
        let mut aggregator = SessionAggregator {
            session_id,
            threshold_msec,
            tree: CallTree::new(""),
            cursor: NodeId::ROOT,
            previous: None,
            awaiting_first_event: true,
            suspended: false,
            interner: StatementInterner::new(),
        };
        aggregator.initialize();
        aggregator
    }

    /// Reset to an empty tree, starting a fresh aggregation window. The
    /// statement cache survives: its contents stay valid across windows.
    pub fn initialize(&mut self) {
        self.tree = CallTree::new(&format!("Session {}", self.session_id));
        self.cursor = self.tree.root();
        self.previous = None;
        self.awaiting_first_event = true;
    }

    pub fn session_id(&self) -> i32 {
        self.session_id
    }

    /// The aggregated tree built so far.
    pub fn tree(&self) -> &CallTree {
        &self.tree
    }

    /// Consume one raw trace record.
    ///
    /// Unclassifiable events, events for other sessions, and everything
    /// observed while suspended are dropped, not errors.
    pub fn on_event(&mut self, raw: &RawEvent) {
        if self.suspended {
            return;
        }

        let Some(classification) = classifier::classify(raw.event_id) else {
            return;
        };

        let Some(session_id) = classifier::session_id(raw) else {
            return;
        };
        if session_id != self.session_id {
            return;
        }

        // An AL event must carry its owning object id; a truncated or
        // zeroed payload is malformed input and is dropped like an
        // unclassifiable id.
        if classification.has_object_identity
            && raw.payload_int(ids::OBJECT_ID_PAYLOAD_INDEX).unwrap_or(0) == 0
        {
            debug!(
                "session {session_id}: dropping event {} without an object id",
                raw.event_id
            );
            return;
        }

        if self.awaiting_first_event {
            self.awaiting_first_event = false;
            if let Some(user) = raw.payload_str(ids::USER_NAME_PAYLOAD_INDEX) {
                if !user.is_empty() {
                    self.tree.append_root_label(&format!(" - {user}"));
                }
            }
        }

        let event = self.build_event(raw, classification, session_id);
        self.apply(event);
    }

    /// Feed one canonical event through the transition function.
    ///
    /// Returns true when the event became the new "previous event" - an
    /// event absorbed by an anomaly repair does not.
    pub fn apply(&mut self, event: ProfilerEvent) -> bool {
        let valid = self.advance(Some(&event));
        if valid {
            self.previous = Some(event);
        }
        valid
    }

    /// Flush the node left open at end-of-stream, compute the relative
    /// timestamp aggregates, and prune subtrees below the threshold.
    pub fn finish_aggregation(&mut self, build_tree: bool) {
        if !build_tree {
            return;
        }

        self.advance(None);
        let root = self.tree.root();
        self.tree.compute_min_max_relative(root);
        self.tree.reduce(self.threshold_msec);
    }

    /// Pre-order snapshot of the aggregated tree.
    pub fn flatten_call_tree(&mut self) -> PreOrderIter<'_> {
        self.tree.refresh_root_duration();
        self.tree.iter()
    }

    /// See [`CallTree::refresh_root_duration`]. Split out so a
    /// demultiplexer can refresh every session before chaining the
    /// per-session traversals.
    pub fn refresh_root_duration(&mut self) {
        self.tree.refresh_root_duration();
    }

    /// Latest activity anywhere in the tree. Valid after
    /// [`Self::finish_aggregation`].
    pub fn max_relative_timestamp(&self) -> f64 {
        self.tree.node(self.tree.root()).max_relative_timestamp_msec
    }

    /// Drop all future events until [`Self::resume`]. Events seen while
    /// suspended are discarded, not buffered, so the producer never
    /// stalls while a consumer reads a snapshot.
    pub fn suspend(&mut self) {
        self.suspended = true;
    }

    pub fn resume(&mut self) {
        self.suspended = false;
    }

    fn build_event(
        &mut self,
        raw: &RawEvent,
        classification: Classification,
        session_id: i32,
    ) -> ProfilerEvent {
        let (object_type, object_id) = if classification.has_object_identity {
            let object_type = raw
                .payload_str(ids::OBJECT_TYPE_PAYLOAD_INDEX)
                .unwrap_or("");
            let object_id = raw.payload_int(ids::OBJECT_ID_PAYLOAD_INDEX).unwrap_or(0) as i32;
            (self.interner.intern(object_type), object_id)
        } else {
            (self.interner.intern(""), 0)
        };

        // Only statements carry a line number.
        let line_no = if classification.kind == EventKind::Statement {
            raw.payload_int(ids::LINE_NO_PAYLOAD_INDEX).unwrap_or(0) as i32
        } else {
            0
        };

        let text = match classification.statement {
            StatementSource::Payload(index) => raw.payload_str(index).unwrap_or(""),
            StatementSource::Fixed(label) => label,
        };

        ProfilerEvent {
            session_id,
            kind: classification.kind,
            sub_type: classification.sub_type,
            object_type,
            object_id,
            line_no,
            statement: self.interner.intern(text),
            timestamp_msec: raw.timestamp_msec,
        }
    }

    /// The transition function of the state machine. `curr` is `None`
    /// exactly once, at end-of-stream, to flush the last open node.
    fn advance(&mut self, curr: Option<&ProfilerEvent>) -> bool {
        let prev = self.previous.clone();

        // A SQL call cannot legally nest. If the top of stack is an open
        // SQL start and the next event is anything but a SQL stop, the
        // stop was lost: force-close the node and leave a marker behind.
        let mut repaired_sql_start = false;
        if !self.tree.is_root(self.cursor)
            && self.tree.node(self.cursor).original_kind == EventKind::StartMethod
            && self.tree.node(self.cursor).sub_type == EventSubType::SqlEvent
        {
            if let Some(curr) = curr {
                let closes_it = curr.kind == EventKind::StopMethod
                    && curr.sub_type == EventSubType::SqlEvent;
                if !closes_it {
                    self.repair_missing_sql_stop(curr.timestamp_msec);

                    if curr.kind == EventKind::StopMethod {
                        // A stray non-SQL stop; the repair absorbed it.
                        return false;
                    }
                    repaired_sql_start = true;
                }
            }
        }

        if !repaired_sql_start {
            // Two stops in a row whose AL-ness disagrees with the open
            // node mean the start for the second stop was never seen.
            if let (Some(prev), Some(curr)) = (prev.as_ref(), curr) {
                if prev.kind == EventKind::StopMethod
                    && curr.kind == EventKind::StopMethod
                    && curr.is_al_event() != self.tree.node(self.cursor).is_al_event()
                {
                    self.repair_missing_start(curr);
                    return false;
                }
            }

            // A non-SQL stop closes its node lazily: only once the next
            // event shows the call really ended here.
            if let Some(prev) = prev.as_ref() {
                if prev.kind == EventKind::StopMethod
                    && prev.sub_type != EventSubType::SqlEvent
                    && !self.tree.is_root(self.cursor)
                {
                    let node = self.tree.node(self.cursor);
                    let should_close = match curr {
                        None => true,
                        Some(curr) => {
                            (!curr.is_al_event() && prev.is_al_event())
                                || curr.kind == EventKind::Statement
                                || curr.kind == EventKind::StopMethod
                                || (node.original_kind == EventKind::StartMethod
                                    && node.is_al_event())
                        }
                    };
                    if should_close {
                        self.cursor = self
                            .tree
                            .pop_and_accumulate(self.cursor, prev.timestamp_msec);
                    }
                }
            }
        }

        let Some(curr) = curr else {
            return false;
        };

        match curr.kind {
            EventKind::Statement => {
                // Two consecutive statements are siblings: close the
                // open one before pushing the next.
                if !self.tree.is_root(self.cursor)
                    && self.tree.node(self.cursor).evaluated_kind == EventKind::Statement
                {
                    self.cursor = self
                        .tree
                        .pop_and_accumulate(self.cursor, curr.timestamp_msec);
                }

                self.cursor = self.tree.push_child(self.cursor, curr);
                true
            }

            EventKind::StartMethod => {
                // An AL call directly inside another AL event collapses
                // into the enclosing statement node instead of adding a
                // doubled tree level; the promotion below still records
                // that the node is a call.
                let collapse = !self.tree.is_root(self.cursor)
                    && curr.is_al_event()
                    && prev.as_ref().map_or(true, ProfilerEvent::is_al_event);

                if !collapse {
                    self.cursor = self.tree.push_child(self.cursor, curr);
                }

                self.tree.node_mut(self.cursor).evaluated_kind = EventKind::StartMethod;
                true
            }

            EventKind::StopMethod => {
                if !self.tree.is_root(self.cursor) {
                    let node = self.tree.node(self.cursor);
                    // SQL and system calls always close here; an AL stop
                    // for a promoted node is deferred to the lazy close
                    // above.
                    if node.evaluated_kind == EventKind::Statement || !curr.is_al_event() {
                        self.cursor = self
                            .tree
                            .pop_and_accumulate(self.cursor, curr.timestamp_msec);
                    }
                }
                true
            }
        }
    }

    /// Force-close the open SQL node at `timestamp_msec` and record a
    /// zero-duration marker sibling documenting the lost stop.
    fn repair_missing_sql_stop(&mut self, timestamp_msec: f64) {
        let (label, session_id, sub_type, object_type, object_id, line_no) = {
            let node = self.tree.node(self.cursor);
            (
                format!("{}{}", STOP_EVENT_IS_MISSING, node.statement),
                node.session_id,
                node.sub_type,
                Arc::clone(&node.object_type),
                node.object_id,
                node.line_no,
            )
        };

        debug!("session {session_id}: {label}");

        let marker = ProfilerEvent {
            session_id,
            kind: EventKind::StartMethod,
            sub_type,
            object_type,
            object_id,
            line_no,
            statement: self.interner.intern(&label),
            timestamp_msec,
        };

        self.cursor = self.tree.pop_and_accumulate(self.cursor, timestamp_msec);
        let marker_id = self.tree.push_child(self.cursor, &marker);
        self.tree.pop_and_accumulate(marker_id, timestamp_msec);
    }

    /// Record a zero-duration marker for a stop event whose start was
    /// never observed. The stop itself is absorbed by the marker.
    fn repair_missing_start(&mut self, stop: &ProfilerEvent) {
        let label = format!("{}{}", START_EVENT_IS_MISSING, stop.statement);

        debug!("session {}: {label}", stop.session_id);

        let marker = ProfilerEvent {
            kind: EventKind::StartMethod,
            statement: self.interner.intern(&label),
            ..stop.clone()
        };

        let marker_id = self.tree.push_child(self.cursor, &marker);
        self.tree.pop_and_accumulate(marker_id, stop.timestamp_msec);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn al_statement(session: i64, line: i64, text: &str, ts: f64) -> RawEvent {
        RawEvent {
            event_id: ids::AL_FUNCTION_STATEMENT,
            timestamp_msec: ts,
            payload: vec![
                json!("default"),
                json!(session),
                json!("DOMAIN\\user"),
                json!("CodeUnit"),
                json!(50000),
                json!("OnRun"),
                json!(line),
                json!(text),
            ],
        }
    }

    fn al_function(session: i64, event_id: u16, name: &str, ts: f64) -> RawEvent {
        RawEvent {
            event_id,
            timestamp_msec: ts,
            payload: vec![
                json!("default"),
                json!(session),
                json!("DOMAIN\\user"),
                json!("CodeUnit"),
                json!(50000),
                json!(name),
                json!(0),
                json!(""),
            ],
        }
    }

    #[test]
    fn test_raw_stream_builds_tree() {
        let mut aggregator = SessionAggregator::new(7, 0.0);

        aggregator.on_event(&al_function(7, ids::AL_FUNCTION_START, "OnRun", 0.0));
        aggregator.on_event(&al_statement(7, 3, "i := 1", 1.0));
        aggregator.on_event(&al_statement(7, 4, "i := 2", 2.0));
        aggregator.on_event(&al_function(7, ids::AL_FUNCTION_STOP, "OnRun", 5.0));
        aggregator.finish_aggregation(true);

        let tree = aggregator.tree();
        let root_children = tree.children(tree.root());
        assert_eq!(root_children.len(), 1);

        let on_run = tree.node(root_children[0]);
        assert_eq!(&*on_run.statement, "OnRun");
        assert_eq!(on_run.duration_msec, 5.0);
        assert_eq!(tree.children(root_children[0]).len(), 2);
    }

    #[test]
    fn test_root_label_picks_up_user_name() {
        let mut aggregator = SessionAggregator::new(7, 0.0);
        aggregator.on_event(&al_function(7, ids::AL_FUNCTION_START, "OnRun", 0.0));

        let label = &aggregator.tree().node(aggregator.tree().root()).statement;
        assert_eq!(&**label, "Session 7 - DOMAIN\\user");
    }

    #[test]
    fn test_foreign_session_and_unknown_ids_ignored() {
        let mut aggregator = SessionAggregator::new(7, 0.0);

        aggregator.on_event(&al_function(8, ids::AL_FUNCTION_START, "OnRun", 0.0));
        aggregator.on_event(&al_function(7, ids::AL_FUNCTION_FAILED, "OnRun", 1.0));

        assert!(aggregator
            .tree()
            .children(aggregator.tree().root())
            .is_empty());
    }

    #[test]
    fn test_suspend_drops_events() {
        let mut aggregator = SessionAggregator::new(7, 0.0);

        aggregator.suspend();
        aggregator.on_event(&al_function(7, ids::AL_FUNCTION_START, "OnRun", 0.0));
        assert!(aggregator
            .tree()
            .children(aggregator.tree().root())
            .is_empty());

        aggregator.resume();
        aggregator.on_event(&al_function(7, ids::AL_FUNCTION_START, "OnRun", 1.0));
        assert_eq!(aggregator.tree().children(aggregator.tree().root()).len(), 1);
    }

    #[test]
    fn test_initialize_resets_window_but_keeps_cache() {
        let mut aggregator = SessionAggregator::new(7, 0.0);

        aggregator.on_event(&al_function(7, ids::AL_FUNCTION_START, "OnRun", 0.0));
        aggregator.on_event(&al_function(7, ids::AL_FUNCTION_STOP, "OnRun", 2.0));
        aggregator.initialize();

        assert!(aggregator
            .tree()
            .children(aggregator.tree().root())
            .is_empty());
        assert!(!aggregator.interner.is_empty());
    }

    #[test]
    fn test_truncated_al_payload_is_dropped() {
        let mut aggregator = SessionAggregator::new(7, 0.0);

        // Payload ends before the object-id field.
        let truncated = RawEvent {
            event_id: ids::AL_FUNCTION_START,
            timestamp_msec: 0.0,
            payload: vec![
                json!("default"),
                json!(7),
                json!("DOMAIN\\user"),
                json!("CodeUnit"),
            ],
        };
        aggregator.on_event(&truncated);
        aggregator.on_event(&al_function(7, ids::AL_FUNCTION_START, "OnRun", 1.0));
        aggregator.on_event(&al_function(7, ids::AL_FUNCTION_STOP, "OnRun", 2.0));
        aggregator.finish_aggregation(true);

        let tree = aggregator.tree();
        let children = tree.children(tree.root());
        assert_eq!(children.len(), 1);
        assert_eq!(&*tree.node(children[0]).statement, "OnRun");
    }

    #[test]
    fn test_zero_object_id_al_event_is_dropped() {
        let mut aggregator = SessionAggregator::new(7, 0.0);

        let mut zeroed = al_function(7, ids::AL_FUNCTION_START, "OnRun", 0.0);
        zeroed.payload[ids::OBJECT_ID_PAYLOAD_INDEX] = json!(0);
        aggregator.on_event(&zeroed);

        assert!(aggregator
            .tree()
            .children(aggregator.tree().root())
            .is_empty());
    }

    #[test]
    fn test_statement_line_numbers_split_nodes() {
        let mut aggregator = SessionAggregator::new(7, 0.0);

        aggregator.on_event(&al_function(7, ids::AL_FUNCTION_START, "OnRun", 0.0));
        aggregator.on_event(&al_statement(7, 3, "i += 1", 1.0));
        aggregator.on_event(&al_statement(7, 9, "i += 1", 2.0));
        aggregator.on_event(&al_function(7, ids::AL_FUNCTION_STOP, "OnRun", 3.0));
        aggregator.finish_aggregation(true);

        // Same text on different lines is a different identity.
        let tree = aggregator.tree();
        let on_run = tree.children(tree.root())[0];
        assert_eq!(tree.children(on_run).len(), 2);
    }
}
