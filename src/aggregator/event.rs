//! Canonical profiler event fed into the call-tree state machine.

use std::sync::Arc;

/// Kind of a profiler event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// A method (or SQL operation) was entered
    StartMethod,

    /// A method (or SQL operation) returned
    StopMethod,

    /// A single statement was executed
    Statement,
}

/// Origin of a profiler event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventSubType {
    /// Instrumented application-layer code; carries an owning-object id
    AlEvent,

    /// A SQL operation against the backing database
    SqlEvent,

    /// Server infrastructure (connections, session lifecycle)
    SystemEvent,

    /// No known origin
    #[default]
    None,
}

/// One classified, canonical trace record.
///
/// **Public** - the sole input of the session aggregator's transition
/// function
///
/// Ephemeral: one value per incoming raw event, cheap to clone (statement
/// and object type are interned `Arc<str>`s).
#[derive(Debug, Clone)]
pub struct ProfilerEvent {
    /// Session the event belongs to
    pub session_id: i32,

    /// Start, stop, or statement
    pub kind: EventKind,

    /// AL, SQL, or system
    pub sub_type: EventSubType,

    /// Owning object type; empty for non-AL events
    pub object_type: Arc<str>,

    /// Owning object id; 0 for non-AL events
    pub object_id: i32,

    /// Source line number; 0 unless `kind` is [`EventKind::Statement`]
    pub line_no: i32,

    /// Interned statement text
    pub statement: Arc<str>,

    /// Relative timestamp in milliseconds
    pub timestamp_msec: f64,
}

impl ProfilerEvent {
    /// True for events originating from application-layer code.
    ///
    /// The sub-type and the object id must agree; a classified event
    /// where they diverge is a construction defect, not an input state.
    pub fn is_al_event(&self) -> bool {
        let is_al = self.sub_type == EventSubType::AlEvent;
        debug_assert_eq!(is_al, self.object_id != 0);
        is_al
    }
}
