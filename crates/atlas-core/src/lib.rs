//! Core traits, types, and error handling for atlas-tools.
//!
//! This crate provides the foundational pieces shared by every service plugin:
//! credential providers, the cancellation context, deployment flavor detection,
//! the retrying HTTP engine, and configuration loading.

pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod flavor;
pub mod http;
pub mod provider;

pub use auth::{AuthProvider, Credential};
pub use context::Context;
pub use error::{Error, Result};
pub use flavor::Flavor;
pub use http::{HttpClient, HttpConfig, Request, Response};
pub use provider::ServiceProvider;
