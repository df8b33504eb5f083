//! Jira issue tracker client for atlas-tools.
//!
//! Supports both Jira Cloud (API v3, rich text as a document tree) and Jira
//! Server / Data Center (API v2, plain markup). The flavor is detected from
//! the base URL and decides the API prefix, the search endpoint, and how
//! descriptions and comment bodies are encoded.

mod client;
mod types;

pub use client::JiraClient;
pub use types::*;
