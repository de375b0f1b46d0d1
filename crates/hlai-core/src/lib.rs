//! # hlai-core
//!
//! Core types for the HomeListingAI dashboard sync layer: the realtime event
//! envelope, payload normalization, the realtime store, the billing error
//! contract, and the traits the client and realtime crates plug into.
//!
//! This crate performs no network I/O.

pub mod billing;
pub mod defaults;
pub mod error;
pub mod events;
pub mod lenient;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod notices;
pub mod store;
pub mod traits;

// Re-export commonly used types at crate root
pub use billing::{error_from_response, ApiErrorBody, BillingLimitError, LimitModal};
pub use error::{Error, Result};
pub use events::{
    AppointmentPayload, EntityRefs, EnvelopeError, LeadPayload, RealtimeEvent,
    RealtimeEventEnvelope, RealtimeEventType, ReminderOutcomePayload, ReminderUpdatePayload,
};
pub use models::*;
pub use normalize::{map_appointment_payload, map_lead_payload};
pub use notices::{ApiErrorNotice, ApiErrorNotifier, ToastNotice};
pub use store::{reduce, DashboardState, RealtimeStore, SliceSubscription, StoreChange, StoreSlice};
pub use traits::*;
