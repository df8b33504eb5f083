//! Proxy selection.
//!
//! A SOCKS proxy, when configured, carries all traffic. Otherwise each request
//! chooses between the HTTPS proxy, the HTTP proxy, and a direct connection,
//! honoring the no-proxy exemption list.

use reqwest::ClientBuilder;
use tracing::debug;
use url::Url;

use super::mask::mask_url;
use crate::{Error, Result};

/// Proxy settings for one service.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyConfig {
    pub http: Option<String>,
    pub https: Option<String>,
    pub socks: Option<String>,
    /// Comma-separated host patterns that bypass the HTTP/HTTPS proxies
    pub no_proxy: Option<String>,
}

impl ProxyConfig {
    /// Whether no proxy of any kind is configured.
    pub fn is_empty(&self) -> bool {
        non_empty(&self.http).is_none()
            && non_empty(&self.https).is_none()
            && non_empty(&self.socks).is_none()
    }

    /// Install the proxy configuration on a client builder.
    pub(crate) fn install(&self, builder: ClientBuilder) -> Result<ClientBuilder> {
        if let Some(socks) = non_empty(&self.socks) {
            debug!(proxy = %mask_url(socks), "routing all traffic through SOCKS proxy");
            let proxy = reqwest::Proxy::all(socks)
                .map_err(|e| Error::Config(format!("invalid SOCKS proxy URL: {}", e.without_url())))?;
            return Ok(builder.proxy(proxy));
        }

        let routes = ProxyRoutes {
            http: parse_proxy_url(non_empty(&self.http), "HTTP")?,
            https: parse_proxy_url(non_empty(&self.https), "HTTPS")?,
            no_proxy: parse_no_proxy(self.no_proxy.as_deref().unwrap_or("")),
        };
        if routes.http.is_none() && routes.https.is_none() {
            return Ok(builder.no_proxy());
        }

        Ok(builder.proxy(reqwest::Proxy::custom(move |url| routes.select(url))))
    }
}

/// Per-request routing table for HTTP/HTTPS proxies.
#[derive(Debug, Clone, Default)]
pub struct ProxyRoutes {
    pub http: Option<Url>,
    pub https: Option<Url>,
    pub no_proxy: Vec<String>,
}

impl ProxyRoutes {
    /// Proxy to use for a destination URL, or `None` for a direct connection.
    pub fn select(&self, destination: &Url) -> Option<Url> {
        let host = match (destination.host_str(), destination.port()) {
            (Some(host), Some(port)) => format!("{}:{}", host, port),
            (Some(host), None) => host.to_string(),
            (None, _) => return None,
        };
        if matches_no_proxy(&host, &self.no_proxy) {
            return None;
        }
        if destination.scheme() == "https" {
            if let Some(https) = &self.https {
                return Some(https.clone());
            }
        }
        self.http.clone()
    }
}

/// Split a no-proxy list into trimmed, non-empty entries.
pub fn parse_no_proxy(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(String::from)
        .collect()
}

/// Whether `host` (optionally with a port) is exempt from proxying.
///
/// An entry matches on exact equality, when it starts with `.` and the host
/// ends with it, or when the host ends with `.` followed by the entry.
pub fn matches_no_proxy(host: &str, entries: &[String]) -> bool {
    let host = strip_port(host.trim());
    entries.iter().any(|entry| {
        let entry = entry.trim();
        if entry.is_empty() {
            return false;
        }
        host == entry
            || (entry.starts_with('.') && host.ends_with(entry))
            || host.ends_with(&format!(".{}", entry))
    })
}

fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        // Bracketed IPv6 literal, with or without a port.
        return match rest.find(']') {
            Some(end) => &host[..end + 2],
            None => host,
        };
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !port.is_empty() && port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn parse_proxy_url(value: Option<&str>, label: &str) -> Result<Option<Url>> {
    value
        .map(|raw| {
            Url::parse(raw)
                .map_err(|e| Error::Config(format!("invalid {} proxy URL {}: {}", label, mask_url(raw), e)))
        })
        .transpose()
}
