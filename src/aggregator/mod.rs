//! Call-tree reconstruction and timing aggregation.
//!
//! This module handles:
//! - The canonical profiler event and its classification-derived fields
//! - The arena-backed aggregated call tree and its push/pop primitives
//! - The per-session stack-reconstruction state machine
//! - The demultiplexer fanning a mixed stream out to per-session trees
//! - Statement-text interning
//!
//! The [`EventAggregator`] trait is the host-facing surface: both the
//! single-session and the multi-session aggregator implement it, so the
//! rest of the program never cares which one it is driving.

pub mod event;
pub mod interner;
pub mod multi;
pub mod node;
pub mod session;

// Re-export main types
pub use event::{EventKind, EventSubType, ProfilerEvent};
pub use interner::StatementInterner;
pub use multi::MultiSessionAggregator;
pub use node::{AggregatedEventNode, CallTree, NodeId, NodeView, PreOrderIter};
pub use session::{SessionAggregator, START_EVENT_IS_MISSING, STOP_EVENT_IS_MISSING};

use crate::events::raw::RawEvent;

/// Common surface of the single- and multi-session aggregators.
///
/// **Public** - what the analyze pipeline drives
pub trait EventAggregator {
    /// Reset to an empty tree, starting a fresh aggregation window.
    fn initialize(&mut self);

    /// Consume one raw trace record. Must be called in non-decreasing
    /// timestamp order per session; a no-op while suspended.
    fn on_event(&mut self, event: &RawEvent);

    /// Flush open nodes and finalize statistics. Pass `build_tree =
    /// false` to tear down without paying for the final computations.
    fn finish_aggregation(&mut self, build_tree: bool);

    /// Lazy pre-order snapshot of the aggregated tree(s).
    fn flatten_call_tree(&mut self) -> Box<dyn Iterator<Item = NodeView<'_>> + '_>;

    /// Latest activity across the whole capture; valid after
    /// [`Self::finish_aggregation`].
    fn max_relative_timestamp(&self) -> f64;

    /// Number of sessions contributing to the tree.
    fn session_count(&self) -> usize;

    /// Drop all future events until [`Self::resume`].
    fn suspend(&mut self);

    fn resume(&mut self);
}

impl EventAggregator for SessionAggregator {
    fn initialize(&mut self) {
        SessionAggregator::initialize(self);
    }

    fn on_event(&mut self, event: &RawEvent) {
        SessionAggregator::on_event(self, event);
    }

    fn finish_aggregation(&mut self, build_tree: bool) {
        SessionAggregator::finish_aggregation(self, build_tree);
    }

    fn flatten_call_tree(&mut self) -> Box<dyn Iterator<Item = NodeView<'_>> + '_> {
        Box::new(SessionAggregator::flatten_call_tree(self))
    }

    fn max_relative_timestamp(&self) -> f64 {
        SessionAggregator::max_relative_timestamp(self)
    }

    fn session_count(&self) -> usize {
        1
    }

    fn suspend(&mut self) {
        SessionAggregator::suspend(self);
    }

    fn resume(&mut self) {
        SessionAggregator::resume(self);
    }
}

impl EventAggregator for MultiSessionAggregator {
    fn initialize(&mut self) {
        MultiSessionAggregator::initialize(self);
    }

    fn on_event(&mut self, event: &RawEvent) {
        MultiSessionAggregator::on_event(self, event);
    }

    fn finish_aggregation(&mut self, build_tree: bool) {
        MultiSessionAggregator::finish_aggregation(self, build_tree);
    }

    fn flatten_call_tree(&mut self) -> Box<dyn Iterator<Item = NodeView<'_>> + '_> {
        Box::new(MultiSessionAggregator::flatten_call_tree(self))
    }

    fn max_relative_timestamp(&self) -> f64 {
        MultiSessionAggregator::max_relative_timestamp(self)
    }

    fn session_count(&self) -> usize {
        MultiSessionAggregator::session_count(self)
    }

    fn suspend(&mut self) {
        MultiSessionAggregator::suspend(self);
    }

    fn resume(&mut self) {
        MultiSessionAggregator::resume(self);
    }
}

/// Pick the aggregator matching a session selection: the sentinel
/// [`crate::utils::config::MULTIPLE_SESSIONS_ID`] selects the
/// demultiplexer, anything else a single-session aggregator.
pub fn aggregator_for_session(session_id: i32, threshold_msec: f64) -> Box<dyn EventAggregator> {
    if session_id == crate::utils::config::MULTIPLE_SESSIONS_ID {
        Box::new(MultiSessionAggregator::new(threshold_msec))
    } else {
        Box::new(SessionAggregator::new(session_id, threshold_msec))
    }
}
