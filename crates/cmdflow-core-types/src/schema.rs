//! Canonical schema constants for structured logging and events
//!
//! These constants ensure consistency across all logging and error reporting.

// Canonical field keys for structured logging
pub const FIELD_COMPONENT: &str = "component";
pub const FIELD_OP: &str = "op";
pub const FIELD_EVENT: &str = "event";
pub const FIELD_DURATION_MS: &str = "duration_ms";

// Pipeline identifiers
pub const FIELD_CONTEXT_ID: &str = "context_id";
pub const FIELD_COMMAND: &str = "command";
pub const FIELD_ENGINE: &str = "engine";
pub const FIELD_PHASE: &str = "phase";

// Error fields
pub const FIELD_ERR_KIND: &str = "err.kind";
pub const FIELD_ERR_CODE: &str = "err.code";

// Canonical event names
pub const EVENT_START: &str = "start";
pub const EVENT_END: &str = "end";
pub const EVENT_END_ERROR: &str = "end_error";

// Close protocol phases, as logged in the `phase` field
pub const PHASE_CLOSING: &str = "closing";
pub const PHASE_FLUSH: &str = "flush";
pub const PHASE_AFTER_SESSION_FLUSH: &str = "after_session_flush";
pub const PHASE_CLOSE_SESSIONS: &str = "close_sessions";
pub const PHASE_CLOSED: &str = "closed";
pub const PHASE_CLOSE_FAILURE: &str = "close_failure";
