//! Centralized default constants for the dashboard sync layer.
//!
//! **This module is the single source of truth** for shared default values.
//! Configuration types in `hlai-client` and `hlai-realtime` read their
//! fallbacks from here instead of defining their own magic numbers.

// =============================================================================
// REALTIME PROTOCOL
// =============================================================================

/// The only envelope protocol version accepted by the client.
pub const PROTOCOL_VERSION: i64 = 1;

/// Path of the realtime socket endpoint, appended to the websocket base URL.
pub const SOCKET_PATH: &str = "/ws";

/// How long an event identity key is remembered for de-duplication (2 minutes).
pub const DEDUP_TTL_SECS: u64 = 120;

// =============================================================================
// RECONNECT
// =============================================================================

/// Linear reconnect step: attempt `n` waits `n * step`.
pub const RECONNECT_STEP_MS: u64 = 1_000;

/// Upper bound on the reconnect delay.
pub const RECONNECT_MAX_MS: u64 = 15_000;

// =============================================================================
// REFRESH / DEBOUNCE
// =============================================================================

/// Trailing debounce before re-fetching the command-center snapshot.
pub const COMMAND_CENTER_DEBOUNCE_MS: u64 = 750;

/// Default debounce for realtime-driven metric reloads.
pub const METRICS_UPDATE_DEBOUNCE_MS: u64 = 500;

// =============================================================================
// STORE / NOTIFICATIONS
// =============================================================================

/// Broadcast capacity for store change notifications.
pub const STORE_CHANNEL_CAPACITY: usize = 256;

/// Broadcast capacity for API-error and toast notices.
pub const NOTICE_CHANNEL_CAPACITY: usize = 64;

/// How long a toast stays on screen.
pub const TOAST_DURATION_MS: u64 = 4_000;

// =============================================================================
// REST API
// =============================================================================

/// Default dashboard API base URL (local backend).
pub const API_BASE_URL: &str = "http://localhost:3002";

/// Header carrying the agent identity on REST calls.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Sentinel value of the `error` field for plan-limit violations.
pub const LIMIT_REACHED: &str = "limit_reached";

// =============================================================================
// NORMALIZATION FALLBACKS
// =============================================================================

/// Lead name when neither the event nor the current record has one.
pub const LEAD_NAME: &str = "Unknown";

/// Lead status for brand-new records.
pub const LEAD_STATUS: &str = "New";

/// Placeholder for unknown source/timeline/financing values.
pub const UNKNOWN: &str = "unknown";

/// Lead summary placeholder.
pub const LEAD_SUMMARY: &str = "No summary yet.";

/// Relative activity label for freshly seen leads.
pub const ACTIVITY_RELATIVE: &str = "just now";

/// Appointment status when none is known.
pub const APPOINTMENT_STATUS: &str = "scheduled";

/// Reminder channel when none is known.
pub const REMINDER_TYPE: &str = "voice";

/// Reminder provider recorded on outcome events that omit one.
pub const REMINDER_PROVIDER: &str = "vapi";
