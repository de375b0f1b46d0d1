//! # hlai-client
//!
//! REST client for the HomeListingAI dashboard API.
//!
//! All calls attach the session identity and map non-2xx responses through
//! the billing error contract in `hlai-core`.

pub mod client;
pub mod config;
pub mod session;
pub mod types;

pub use client::DashboardClient;
pub use config::ClientConfig;
pub use session::{DashboardSession, StaticSession};
pub use types::{
    AgentAction, AgentActionRecord, AgentActionRequest, AppointmentsPage, AppointmentsView,
    LeadsFilter, LeadsPage, LeadsSort, LeadsTab,
};
