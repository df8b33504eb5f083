//! Provider trait for upstream collaboration services.

use async_trait::async_trait;
use serde_json::Value;

use crate::context::Context;
use crate::error::Result;
use crate::flavor::Flavor;

/// Trait implemented by every service client (Jira, Confluence, Opsgenie).
#[async_trait]
pub trait ServiceProvider: Send + Sync {
    /// Service name (e.g., "jira"), also the tool name prefix.
    fn name(&self) -> &'static str;

    /// Deployment flavor the client talks to.
    fn flavor(&self) -> Flavor;

    /// Fetch the identity behind the configured credential.
    async fn health_check(&self, ctx: &Context) -> Result<Value>;
}
