//! Configuration management for atlas-tools.
//!
//! Configuration is read from a TOML file and then overridden from the
//! environment. The file lives in a platform-specific location:
//!
//! - **macOS/Linux**: `~/.config/atlas-tools/config.toml`
//! - **Windows**: `%APPDATA%\atlas-tools\config.toml`
//!
//! # Example
//!
//! ```toml
//! read_only = true
//!
//! [http]
//! max_attempts = 5
//!
//! [jira]
//! url = "https://acme.atlassian.net"
//! username = "bot@acme.com"
//! api_token = "..."
//! projects_filter = ["OPS", "PLAT"]
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use crate::auth::Credential;
use crate::http::{HttpConfig, ProxyConfig, RetryPolicy};
use crate::{Error, Result};

/// Config file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Config directory name.
const CONFIG_DIR_NAME: &str = "atlas-tools";

/// Opsgenie API base used when only an API key is configured.
pub const DEFAULT_OPSGENIE_URL: &str = "https://api.opsgenie.com";

// =============================================================================
// Configuration structures
// =============================================================================

/// One of the upstream services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Jira,
    Confluence,
    Opsgenie,
}

impl Service {
    pub const ALL: [Service; 3] = [Service::Jira, Service::Confluence, Service::Opsgenie];

    /// Lowercase name, also the tool name prefix.
    pub fn name(&self) -> &'static str {
        match self {
            Service::Jira => "jira",
            Service::Confluence => "confluence",
            Service::Opsgenie => "opsgenie",
        }
    }

    fn env_prefix(&self) -> &'static str {
        match self {
            Service::Jira => "JIRA",
            Service::Confluence => "CONFLUENCE",
            Service::Opsgenie => "OPSGENIE",
        }
    }

    /// Name of the filter list for this service, if it has one.
    fn filter_key(&self) -> Option<&'static str> {
        match self {
            Service::Jira => Some("PROJECTS_FILTER"),
            Service::Confluence => Some("SPACES_FILTER"),
            Service::Opsgenie => None,
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Hide and refuse every tool tagged `write`
    #[serde(default)]
    pub read_only: bool,

    /// Tool allow-list; empty means all tools
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enabled_tools: Vec<String>,

    /// Timeouts and retry policy shared by every client
    #[serde(default)]
    pub http: HttpSettings,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jira: Option<ServiceConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confluence: Option<ServiceConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opsgenie: Option<ServiceConfig>,
}

/// HTTP engine settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub max_attempts: u32,
    pub retry_base_ms: u64,
    pub retry_max_ms: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_attempts: 3,
            retry_base_ms: 500,
            retry_max_ms: 10_000,
        }
    }
}

impl HttpSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        RetryPolicy::new(
            self.max_attempts,
            Duration::from_millis(self.retry_base_ms),
            Duration::from_millis(self.retry_max_ms),
        )
    }
}

/// Connection settings for one service.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub url: Option<String>,
    pub username: Option<String>,
    pub api_token: Option<String>,
    pub personal_token: Option<String>,
    pub cloud_id: Option<String>,
    /// Opsgenie API key
    pub api_key: Option<String>,
    pub ssl_verify: Option<bool>,
    pub http_proxy: Option<String>,
    pub https_proxy: Option<String>,
    pub socks_proxy: Option<String>,
    pub no_proxy: Option<String>,
    /// `key=value` pairs separated by commas
    pub custom_headers: Option<String>,
    /// Jira project keys the search tools are limited to
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub projects_filter: Vec<String>,
    /// Confluence space keys the search tools are limited to
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub spaces_filter: Vec<String>,
}

impl std::fmt::Debug for ServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let secret = |v: &Option<String>| v.as_deref().map(crate::auth::redact);
        f.debug_struct("ServiceConfig")
            .field("url", &self.url.as_deref().map(crate::http::mask_url))
            .field("username", &self.username)
            .field("api_token", &secret(&self.api_token))
            .field("personal_token", &secret(&self.personal_token))
            .field("cloud_id", &self.cloud_id)
            .field("api_key", &secret(&self.api_key))
            .field("ssl_verify", &self.ssl_verify)
            .field("socks_proxy", &self.socks_proxy.as_deref().map(crate::http::mask_url))
            .field("projects_filter", &self.projects_filter)
            .field("spaces_filter", &self.spaces_filter)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Config implementation
// =============================================================================

impl Config {
    /// Get the configuration directory path.
    pub fn config_dir() -> Result<PathBuf> {
        dirs::config_dir()
            .map(|p| p.join(CONFIG_DIR_NAME))
            .ok_or_else(|| Error::Config("Could not determine config directory".to_string()))
    }

    /// Get the configuration file path.
    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Load configuration from the default location.
    ///
    /// Returns a default (empty) config if the file doesn't exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    ///
    /// Returns a default (empty) config if the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = ?path, "Config file does not exist, using defaults");
            return Ok(Self::default());
        }

        debug!(path = ?path, "Loading config");

        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;

        info!(path = ?path, "Config loaded successfully");
        Ok(config)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(value) = get("READ_ONLY_MODE") {
            self.read_only = parse_bool("READ_ONLY_MODE", &value)?;
        }
        if let Some(value) = get("ENABLED_TOOLS") {
            self.enabled_tools = split_list(&value);
        }

        for service in Service::ALL {
            let prefix = service.env_prefix();
            let var = |name: &str| get(&format!("{}_{}", prefix, name));

            let mut overrides = ServiceConfig {
                url: var("URL"),
                username: var("USERNAME"),
                api_token: var("API_TOKEN"),
                personal_token: var("PERSONAL_TOKEN"),
                cloud_id: var("CLOUD_ID"),
                api_key: var("API_KEY"),
                ssl_verify: None,
                http_proxy: var("HTTP_PROXY"),
                https_proxy: var("HTTPS_PROXY"),
                socks_proxy: var("SOCKS_PROXY"),
                no_proxy: var("NO_PROXY"),
                custom_headers: var("CUSTOM_HEADERS"),
                projects_filter: Vec::new(),
                spaces_filter: Vec::new(),
            };
            if let Some(value) = var("SSL_VERIFY") {
                overrides.ssl_verify = Some(parse_bool(&format!("{}_SSL_VERIFY", prefix), &value)?);
            }
            if let Some(list) = service.filter_key().and_then(|key| var(key)) {
                match service {
                    Service::Jira => overrides.projects_filter = split_list(&list),
                    _ => overrides.spaces_filter = split_list(&list),
                }
            }

            if overrides != ServiceConfig::default() {
                debug!(service = service.name(), "applying environment overrides");
                self.section_mut(service)
                    .get_or_insert_with(ServiceConfig::default)
                    .merge(overrides);
            }
        }

        // Process-wide proxies fill whatever a service left unset.
        let global = ProxyConfig {
            http: get("HTTP_PROXY"),
            https: get("HTTPS_PROXY"),
            socks: get("SOCKS_PROXY"),
            no_proxy: get("NO_PROXY"),
        };
        if !global.is_empty() || global.no_proxy.is_some() {
            for service in Service::ALL {
                if let Some(section) = self.section_mut(service) {
                    fill(&mut section.http_proxy, &global.http);
                    fill(&mut section.https_proxy, &global.https);
                    fill(&mut section.socks_proxy, &global.socks);
                    fill(&mut section.no_proxy, &global.no_proxy);
                }
            }
        }

        Ok(())
    }

    /// Settings for a service, if that section exists.
    pub fn service(&self, service: Service) -> Option<&ServiceConfig> {
        match service {
            Service::Jira => self.jira.as_ref(),
            Service::Confluence => self.confluence.as_ref(),
            Service::Opsgenie => self.opsgenie.as_ref(),
        }
    }

    fn section_mut(&mut self, service: Service) -> &mut Option<ServiceConfig> {
        match service {
            Service::Jira => &mut self.jira,
            Service::Confluence => &mut self.confluence,
            Service::Opsgenie => &mut self.opsgenie,
        }
    }

    /// Services with enough settings to build a client.
    pub fn configured_services(&self) -> Vec<Service> {
        Service::ALL
            .into_iter()
            .filter(|&s| self.service(s).is_some_and(|c| c.is_configured(s)))
            .collect()
    }

    /// Check every configured service. Fails on the first invalid one.
    pub fn validate(&self) -> Result<()> {
        self.http.retry_policy()?;
        for service in self.configured_services() {
            if let Some(section) = self.service(service) {
                section.credential(service)?;
                section.http_config(service, &self.http)?;
            }
        }
        Ok(())
    }
}

impl ServiceConfig {
    /// Whether this section names a target to talk to.
    pub fn is_configured(&self, service: Service) -> bool {
        is_set(&self.url) || (service == Service::Opsgenie && is_set(&self.api_key))
    }

    /// Base URL, falling back to the public Opsgenie endpoint.
    pub fn base_url(&self, service: Service) -> Result<String> {
        match (self.url.as_deref().map(str::trim), service) {
            (Some(url), _) if !url.is_empty() => Ok(url.to_string()),
            (_, Service::Opsgenie) => Ok(DEFAULT_OPSGENIE_URL.to_string()),
            _ => Err(Error::Config(format!("{} URL is not set", service.name()))),
        }
    }

    /// Pick the credential for this service.
    ///
    /// Atlassian services prefer a personal token (bearer, scoped to the
    /// cloud id when one is set) over username plus API token.
    pub fn credential(&self, service: Service) -> Result<Credential> {
        let name = service.name();
        if service == Service::Opsgenie {
            return match value(&self.api_key) {
                Some(key) => Credential::vendor_key(key),
                None => Err(Error::Config(format!("{} requires an API key", name))),
            };
        }
        if let Some(token) = value(&self.personal_token) {
            return match value(&self.cloud_id) {
                Some(cloud_id) => Credential::bearer_with_tenant(token, Some(cloud_id.to_string())),
                None => Credential::bearer(token),
            };
        }
        match (value(&self.username), value(&self.api_token)) {
            (Some(user), Some(token)) => Credential::basic(user, token),
            (Some(_), None) => Err(Error::Config(format!("{} username is set without an API token", name))),
            _ => Err(Error::Config(format!(
                "{} requires a personal token or a username and API token",
                name
            ))),
        }
    }

    /// The proxy settings for this service.
    pub fn proxy(&self) -> ProxyConfig {
        ProxyConfig {
            http: self.http_proxy.clone(),
            https: self.https_proxy.clone(),
            socks: self.socks_proxy.clone(),
            no_proxy: self.no_proxy.clone(),
        }
    }

    /// Build the validated HTTP engine settings for this service.
    pub fn http_config(&self, service: Service, http: &HttpSettings) -> Result<HttpConfig> {
        let base_url = self.base_url(service)?;
        validate_url(&base_url, &format!("{} URL", service.name()))?;

        let proxy = self.proxy();
        if let Some(socks) = value(&proxy.socks) {
            validate_proxy_url(socks, "SOCKS")?;
        }
        if let Some(raw) = value(&proxy.http) {
            validate_proxy_url(raw, "HTTP")?;
        }
        if let Some(raw) = value(&proxy.https) {
            validate_proxy_url(raw, "HTTPS")?;
        }

        let custom_headers = match value(&self.custom_headers) {
            Some(raw) => parse_custom_headers(raw)?,
            None => Vec::new(),
        };

        let mut config = HttpConfig::new(base_url)
            .with_timeout(http.timeout())
            .with_retry(http.retry_policy()?);
        config.verify_ssl = self.ssl_verify.unwrap_or(true);
        config.proxy = proxy;
        config.custom_headers = custom_headers;
        Ok(config)
    }

    /// Overwrite every field that `other` sets.
    fn merge(&mut self, other: ServiceConfig) {
        fn take(slot: &mut Option<String>, value: Option<String>) {
            if value.is_some() {
                *slot = value;
            }
        }
        take(&mut self.url, other.url);
        take(&mut self.username, other.username);
        take(&mut self.api_token, other.api_token);
        take(&mut self.personal_token, other.personal_token);
        take(&mut self.cloud_id, other.cloud_id);
        take(&mut self.api_key, other.api_key);
        take(&mut self.http_proxy, other.http_proxy);
        take(&mut self.https_proxy, other.https_proxy);
        take(&mut self.socks_proxy, other.socks_proxy);
        take(&mut self.no_proxy, other.no_proxy);
        take(&mut self.custom_headers, other.custom_headers);
        if other.ssl_verify.is_some() {
            self.ssl_verify = other.ssl_verify;
        }
        if !other.projects_filter.is_empty() {
            self.projects_filter = other.projects_filter;
        }
        if !other.spaces_filter.is_empty() {
            self.spaces_filter = other.spaces_filter;
        }
    }
}

// =============================================================================
// Parsing helpers
// =============================================================================

/// Parse `key=value` pairs separated by commas.
///
/// Entries are trimmed and empty entries skipped. The value may itself
/// contain `=`. Names and values must be valid HTTP header tokens.
pub fn parse_custom_headers(raw: &str) -> Result<Vec<(String, String)>> {
    let mut headers = Vec::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (name, value) = entry
            .split_once('=')
            .ok_or_else(|| Error::Config(format!("custom header {:?} is not key=value", entry)))?;
        let (name, value) = (name.trim(), value.trim());
        if name.is_empty() {
            return Err(Error::Config(format!("custom header {:?} has no name", entry)));
        }
        HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| Error::Config(format!("invalid custom header name: {:?}", name)))?;
        HeaderValue::from_str(value)
            .map_err(|_| Error::Config(format!("invalid value for custom header {}", name)))?;
        headers.push((name.to_string(), value.to_string()));
    }
    Ok(headers)
}

/// Split a comma-separated list into trimmed, non-empty items.
pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config(format!("{} must be true or false, got {:?}", key, raw))),
    }
}

fn validate_url(raw: &str, label: &str) -> Result<()> {
    let url = Url::parse(raw).map_err(|e| {
        Error::Config(format!("{} is invalid ({}): {}", label, e, crate::http::mask_url(raw)))
    })?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(Error::Config(format!(
            "{} must use http or https, not {}",
            label, other
        ))),
    }
}

fn validate_proxy_url(raw: &str, label: &str) -> Result<()> {
    Url::parse(raw)
        .map(|_| ())
        .map_err(|e| Error::Config(format!("{} proxy URL is invalid: {}", label, e)))
}

fn value(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn is_set(field: &Option<String>) -> bool {
    value(field).is_some()
}

fn fill(slot: &mut Option<String>, fallback: &Option<String>) {
    if !is_set(slot) {
        if let Some(v) = fallback {
            *slot = Some(v.clone());
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
