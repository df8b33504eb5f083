//! Confluence wiki client for atlas-tools.
//!
//! Talks to the `/rest/api` content API, which Cloud and Server share. The
//! flavor only changes how a bare text search is turned into CQL.

mod client;
mod types;

pub use client::ConfluenceClient;
pub use types::*;
