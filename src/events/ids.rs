//! Event ids and payload indexes as defined in the server's trace manifest.
//!
//! These numbers are fixed by the emitting server; they are not negotiated
//! and never change within a trace file.

// SQL operation events
pub const SQL_EXECUTE_SCALAR_START: u16 = 1;
pub const SQL_EXECUTE_SCALAR_STOP: u16 = 2;
pub const SQL_EXECUTE_NON_QUERY_START: u16 = 3;
pub const SQL_EXECUTE_NON_QUERY_STOP: u16 = 4;
pub const SQL_EXECUTE_READER_START: u16 = 5;
pub const SQL_EXECUTE_READER_STOP: u16 = 6;
pub const SQL_READ_NEXT_RESULT_START: u16 = 7;
pub const SQL_READ_NEXT_RESULT_STOP: u16 = 8;
pub const SQL_READ_NEXT_ROW_START: u16 = 9;
pub const SQL_READ_NEXT_ROW_STOP: u16 = 10;
pub const SQL_BEGIN_TRANSACTION_START: u16 = 11;
pub const SQL_BEGIN_TRANSACTION_STOP: u16 = 12;
pub const SQL_PREPARE_START: u16 = 13;
pub const SQL_PREPARE_STOP: u16 = 14;
pub const SQL_OPEN_CONNECTION_START: u16 = 15;
pub const SQL_OPEN_CONNECTION_STOP: u16 = 16;
pub const SQL_COMMIT_START: u16 = 17;
pub const SQL_COMMIT_STOP: u16 = 18;
pub const SQL_ROLLBACK_START: u16 = 19;
pub const SQL_ROLLBACK_STOP: u16 = 20;

// Service call events
pub const CREATE_SERVICE_SESSION_START: u16 = 312;
pub const CREATE_SERVICE_SESSION_STOP: u16 = 313;
pub const END_SERVICE_SESSION_START: u16 = 314;
pub const END_SERVICE_SESSION_STOP: u16 = 315;

// AL (application layer) events
pub const AL_FUNCTION_START: u16 = 400;
pub const AL_FUNCTION_STOP: u16 = 401;
pub const AL_FUNCTION_FAILED: u16 = 402;
pub const AL_FUNCTION_STATEMENT: u16 = 403;

// Session lifecycle events
pub const SESSION_OPENED: u16 = 500;
pub const SESSION_CLOSED: u16 = 501;

// Payload indexes, shared across event kinds. Index 3 is overloaded by the
// manifest: SQL statement, connection type, and object type all live there
// depending on the event id.
pub const TENANT_ID_PAYLOAD_INDEX: usize = 0;
pub const SESSION_ID_PAYLOAD_INDEX: usize = 1;
pub const USER_NAME_PAYLOAD_INDEX: usize = 2;
pub const SQL_STATEMENT_PAYLOAD_INDEX: usize = 3;
pub const CONNECTION_TYPE_PAYLOAD_INDEX: usize = 3;
pub const OBJECT_TYPE_PAYLOAD_INDEX: usize = 3;
pub const OBJECT_ID_PAYLOAD_INDEX: usize = 4;
pub const AL_FUNCTION_NAME_PAYLOAD_INDEX: usize = 5;
pub const LINE_NO_PAYLOAD_INDEX: usize = 6;
pub const AL_STATEMENT_PAYLOAD_INDEX: usize = 7;
