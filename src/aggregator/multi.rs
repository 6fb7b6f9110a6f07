//! Fan-out of a mixed multi-session stream to per-session aggregators.

use crate::aggregator::node::NodeView;
use crate::aggregator::session::SessionAggregator;
use crate::events::classifier;
use crate::events::raw::RawEvent;
use log::debug;
use std::collections::BTreeMap;

/// Routes a shared event stream to lazily-created [`SessionAggregator`]s
/// keyed by session id.
///
/// **Public** - the aggregator used when no single session is selected
///
/// Sessions are kept in id order so snapshots are deterministic across
/// runs. Suspension is a single shared flag checked before any routing:
/// a dropped event never creates an aggregator just because it carried a
/// new session id.
#[derive(Debug, Default)]
pub struct MultiSessionAggregator {
    threshold_msec: f64,
    sessions: BTreeMap<i32, SessionAggregator>,
    suspended: bool,
}

impl MultiSessionAggregator {
    pub fn new(threshold_msec: f64) -> Self {
        MultiSessionAggregator {
            threshold_msec,
            sessions: BTreeMap::new(),
            suspended: false,
        }
    }

    /// Discard every per-session tree, starting a fresh window.
    pub fn initialize(&mut self) {
        self.sessions.clear();
    }

    /// Number of sessions observed so far.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn on_event(&mut self, raw: &RawEvent) {
        if self.suspended {
            return;
        }

        // Classify before touching the session map so noise events
        // cannot spawn empty aggregators.
        if classifier::classify(raw.event_id).is_none() {
            return;
        }

        let Some(session_id) = classifier::session_id(raw) else {
            return;
        };

        let aggregator = self.sessions.entry(session_id).or_insert_with(|| {
            debug!("Starting aggregation for session {session_id}");
            SessionAggregator::new(session_id, self.threshold_msec)
        });

        aggregator.on_event(raw);
    }

    pub fn finish_aggregation(&mut self, build_tree: bool) {
        for aggregator in self.sessions.values_mut() {
            aggregator.finish_aggregation(build_tree);
        }
    }

    /// Pre-order snapshot over every session, in session-id order.
    ///
    /// Each session tree is presented as one subtree of a virtual
    /// overall root, so every node's depth is shifted down by one.
    pub fn flatten_call_tree(&mut self) -> impl Iterator<Item = NodeView<'_>> {
        for aggregator in self.sessions.values_mut() {
            aggregator.refresh_root_duration();
        }

        self.sessions
            .values()
            .flat_map(|aggregator| aggregator.tree().iter_with_offset(1))
    }

    /// Latest activity over all sessions.
    pub fn max_relative_timestamp(&self) -> f64 {
        self.sessions
            .values()
            .map(SessionAggregator::max_relative_timestamp)
            .fold(0.0, f64::max)
    }

    pub fn suspend(&mut self) {
        self.suspended = true;
    }

    pub fn resume(&mut self) {
        self.suspended = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ids;
    use serde_json::json;

    fn al_event(session: i64, event_id: u16, name: &str, ts: f64) -> RawEvent {
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
    fn test_events_route_by_session() {
        let mut aggregator = MultiSessionAggregator::new(0.0);

        aggregator.on_event(&al_event(2, ids::AL_FUNCTION_START, "foo", 0.0));
        aggregator.on_event(&al_event(1, ids::AL_FUNCTION_START, "bar", 1.0));
        aggregator.on_event(&al_event(2, ids::AL_FUNCTION_STOP, "foo", 2.0));
        aggregator.on_event(&al_event(1, ids::AL_FUNCTION_STOP, "bar", 3.0));
        aggregator.finish_aggregation(true);

        assert_eq!(aggregator.session_count(), 2);

        // Session-id order, session roots first, depths shifted by one.
        let flattened: Vec<(String, u32)> = aggregator
            .flatten_call_tree()
            .map(|view| (view.node().statement.to_string(), view.depth()))
            .collect();
        assert_eq!(
            flattened,
            vec![
                ("Session 1 - DOMAIN\\user".to_string(), 1),
                ("bar".to_string(), 2),
                ("Session 2 - DOMAIN\\user".to_string(), 1),
                ("foo".to_string(), 2),
            ]
        );
    }

    #[test]
    fn test_suspended_events_create_no_sessions() {
        let mut aggregator = MultiSessionAggregator::new(0.0);

        aggregator.suspend();
        aggregator.on_event(&al_event(9, ids::AL_FUNCTION_START, "foo", 0.0));
        assert_eq!(aggregator.session_count(), 0);

        aggregator.resume();
        aggregator.on_event(&al_event(9, ids::AL_FUNCTION_START, "foo", 1.0));
        assert_eq!(aggregator.session_count(), 1);
    }

    #[test]
    fn test_noise_events_create_no_sessions() {
        let mut aggregator = MultiSessionAggregator::new(0.0);

        aggregator.on_event(&al_event(9, ids::AL_FUNCTION_FAILED, "foo", 0.0));
        assert_eq!(aggregator.session_count(), 0);
    }

    #[test]
    fn test_max_relative_timestamp_spans_sessions() {
        let mut aggregator = MultiSessionAggregator::new(0.0);

        aggregator.on_event(&al_event(1, ids::AL_FUNCTION_START, "foo", 0.0));
        aggregator.on_event(&al_event(1, ids::AL_FUNCTION_STOP, "foo", 4.0));
        aggregator.on_event(&al_event(2, ids::AL_FUNCTION_START, "bar", 0.0));
        aggregator.on_event(&al_event(2, ids::AL_FUNCTION_STOP, "bar", 9.0));
        aggregator.finish_aggregation(true);

        assert_eq!(aggregator.max_relative_timestamp(), 9.0);
    }
}
