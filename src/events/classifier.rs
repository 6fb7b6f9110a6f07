//! Classification of numeric event ids.
//!
//! The manifest's event-id space collapses into a small tuple the
//! aggregation core understands: an event kind (start/stop/statement), a
//! sub-type (AL, SQL, system), where the statement text comes from, and
//! whether the event carries an owning-object identity. Everything the
//! server can emit is decided in one exhaustive match here; no other
//! module branches on event ids.

use crate::aggregator::{EventKind, EventSubType};
use crate::events::ids;
use crate::events::raw::RawEvent;

/// Where the statement text of a classified event comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementSource {
    /// Read the text from this payload index
    Payload(usize),

    /// The event has no textual payload; use this fixed label
    Fixed(&'static str),
}

/// Result of classifying one event id.
///
/// **Public** - consumed by the session aggregator when building the
/// canonical profiler event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    /// Start, stop, or statement
    pub kind: EventKind,

    /// AL, SQL, or system
    pub sub_type: EventSubType,

    /// Source of the statement text
    pub statement: StatementSource,

    /// True if payloads 3-4 carry the owning object type and id
    pub has_object_identity: bool,
}

impl Classification {
    const fn al(kind: EventKind, statement_index: usize) -> Self {
        Classification {
            kind,
            sub_type: EventSubType::AlEvent,
            statement: StatementSource::Payload(statement_index),
            has_object_identity: true,
        }
    }

    const fn sql(kind: EventKind) -> Self {
        Classification {
            kind,
            sub_type: EventSubType::SqlEvent,
            statement: StatementSource::Payload(ids::SQL_STATEMENT_PAYLOAD_INDEX),
            has_object_identity: false,
        }
    }

    const fn sql_fixed(kind: EventKind, label: &'static str) -> Self {
        Classification {
            kind,
            sub_type: EventSubType::SqlEvent,
            statement: StatementSource::Fixed(label),
            has_object_identity: false,
        }
    }

    const fn system(kind: EventKind, statement: StatementSource) -> Self {
        Classification {
            kind,
            sub_type: EventSubType::SystemEvent,
            statement,
            has_object_identity: false,
        }
    }
}

/// Classify a numeric event id.
///
/// **Public** - the only bridge between the id table and the core
///
/// Returns `None` for ids the call tree does not track: read-next-result
/// and read-next-row (far too chatty to chart), failed AL functions, and
/// service-session bookkeeping. Unknown ids are `None` as well - new server
/// versions may add events we have never heard of.
pub fn classify(event_id: u16) -> Option<Classification> {
    use EventKind::{StartMethod, Statement, StopMethod};

    let classification = match event_id {
        ids::AL_FUNCTION_START => {
            Classification::al(StartMethod, ids::AL_FUNCTION_NAME_PAYLOAD_INDEX)
        }
        ids::AL_FUNCTION_STOP => {
            Classification::al(StopMethod, ids::AL_FUNCTION_NAME_PAYLOAD_INDEX)
        }
        ids::AL_FUNCTION_STATEMENT => {
            Classification::al(Statement, ids::AL_STATEMENT_PAYLOAD_INDEX)
        }

        ids::SQL_EXECUTE_SCALAR_START => Classification::sql(StartMethod),
        ids::SQL_EXECUTE_SCALAR_STOP => Classification::sql(StopMethod),
        ids::SQL_EXECUTE_NON_QUERY_START => Classification::sql(StartMethod),
        ids::SQL_EXECUTE_NON_QUERY_STOP => Classification::sql(StopMethod),
        ids::SQL_EXECUTE_READER_START => Classification::sql(StartMethod),
        ids::SQL_EXECUTE_READER_STOP => Classification::sql(StopMethod),
        ids::SQL_PREPARE_START => Classification::sql(StartMethod),
        ids::SQL_PREPARE_STOP => Classification::sql(StopMethod),

        // Transaction control carries no statement text.
        ids::SQL_BEGIN_TRANSACTION_START => {
            Classification::sql_fixed(StartMethod, "BEGIN TRANSACTION")
        }
        ids::SQL_BEGIN_TRANSACTION_STOP => {
            Classification::sql_fixed(StopMethod, "BEGIN TRANSACTION")
        }
        ids::SQL_COMMIT_START => Classification::sql_fixed(StartMethod, "COMMIT"),
        ids::SQL_COMMIT_STOP => Classification::sql_fixed(StopMethod, "COMMIT"),
        ids::SQL_ROLLBACK_START => Classification::sql_fixed(StartMethod, "ROLLBACK"),
        ids::SQL_ROLLBACK_STOP => Classification::sql_fixed(StopMethod, "ROLLBACK"),

        ids::SQL_OPEN_CONNECTION_START => {
            Classification::system(StartMethod, StatementSource::Fixed("OPEN CONNECTION"))
        }
        ids::SQL_OPEN_CONNECTION_STOP => {
            Classification::system(StopMethod, StatementSource::Fixed("OPEN CONNECTION"))
        }

        ids::SESSION_OPENED => Classification::system(
            StartMethod,
            StatementSource::Payload(ids::CONNECTION_TYPE_PAYLOAD_INDEX),
        ),
        ids::SESSION_CLOSED => Classification::system(
            StopMethod,
            StatementSource::Payload(ids::CONNECTION_TYPE_PAYLOAD_INDEX),
        ),

        _ => return None,
    };

    Some(classification)
}

/// Extract the session id of a classified event.
///
/// **Public** - used by the demultiplexer for routing and by the session
/// aggregator for filtering foreign events
///
/// Only meaningful after [`classify`] succeeded; unclassified events may
/// not carry a session id at this index at all.
pub fn session_id(event: &RawEvent) -> Option<i32> {
    event
        .payload_int(ids::SESSION_ID_PAYLOAD_INDEX)
        .map(|id| id as i32)
}
