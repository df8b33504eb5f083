//! Opsgenie alerting client for atlas-tools.
//!
//! Covers alerts (list, count, create, acknowledge, close, notes), the
//! asynchronous request status endpoint, schedules and on-call lookups.
//! Opsgenie has a single hosted API, so the flavor is always Cloud.

mod client;
mod types;

pub use client::OpsgenieClient;
pub use types::*;
