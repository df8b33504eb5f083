//! Deployment flavor detection.
//!
//! Atlassian products ship as a hosted cloud service and as self-managed
//! Server / Data Center installs. The two speak different API dialects, so
//! every client decides once, from its base URL, which one it talks to.

use serde::{Deserialize, Serialize};

/// Domain suffixes served by the hosted platform.
const HOSTED_SUFFIXES: &[&str] = &[".atlassian.net", ".jira.com", ".jira-dev.com"];

/// Gateway host used for OAuth-scoped cloud access.
const HOSTED_GATEWAY: &str = "api.atlassian.com";

/// Deployment flavor of an Atlassian-style service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flavor {
    /// Hosted cloud. Newer API versions and document-tree rich text.
    Cloud,
    /// Self-managed Server / Data Center. Previous API version, plain markup.
    SelfHosted,
}

impl Flavor {
    /// Detect the flavor from a service base URL.
    ///
    /// An unparseable URL is treated as self-managed.
    pub fn detect(base_url: &str) -> Self {
        let host = match url::Url::parse(base_url) {
            Ok(url) => url.host_str().map(|h| h.to_ascii_lowercase()),
            Err(_) => None,
        };
        match host {
            Some(host) if is_hosted_host(&host) => Flavor::Cloud,
            _ => Flavor::SelfHosted,
        }
    }

    /// Whether this is the hosted flavor.
    pub fn is_cloud(self) -> bool {
        matches!(self, Flavor::Cloud)
    }

    /// Name used in logs and health reports.
    pub fn as_str(self) -> &'static str {
        match self {
            Flavor::Cloud => "cloud",
            Flavor::SelfHosted => "self_hosted",
        }
    }
}

fn is_hosted_host(host: &str) -> bool {
    host == HOSTED_GATEWAY || HOSTED_SUFFIXES.iter().any(|suffix| host.ends_with(suffix))
}
