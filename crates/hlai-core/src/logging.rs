//! Structured logging field name constants.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation can query realtime and REST activity the same way.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied (socket closed, REST failure) |
//! | INFO  | Lifecycle events (connect, stop, resume, reconnect scheduled) |
//! | DEBUG | Decision points (dedup drop, token absent, refresh coalesced) |
//! | TRACE | Per-frame data |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "realtime", "store", "client"
pub const SUBSYSTEM: &str = "subsystem";

/// Owning agent (tenant) identifier.
pub const AGENT_ID: &str = "agent_id";

// ─── Event fields ──────────────────────────────────────────────────────────

/// Realtime event type (e.g. `lead.created`).
pub const EVENT_TYPE: &str = "event_type";

/// Lead, appointment, or listing id addressed by an event.
pub const ENTITY_ID: &str = "entity_id";

/// De-duplication identity key.
pub const EVENT_KEY: &str = "event_key";

// ─── Connection fields ─────────────────────────────────────────────────────

/// Reconnect attempt counter.
pub const ATTEMPT: &str = "attempt";

/// Scheduled delay in milliseconds.
pub const DELAY_MS: &str = "delay_ms";

/// Connection phase name.
pub const PHASE: &str = "phase";

// ─── REST fields ───────────────────────────────────────────────────────────

/// Endpoint path.
pub const PATH: &str = "path";

/// HTTP status code.
pub const STATUS: &str = "status";

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";
