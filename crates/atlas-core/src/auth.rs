//! Credential providers.
//!
//! Every service authenticates with one of four header schemes. The
//! [`Credential`] enum holds the secrets; the [`AuthProvider`] trait is the
//! seam the HTTP engine uses to attach them to outgoing requests.

use std::fmt;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};

use crate::{Error, Result};

/// Side header carrying the Atlassian tenant for OAuth-style bearer tokens.
pub const CLOUD_ID_HEADER: &str = "X-Atlassian-Cloud-Id";

/// Authorization scheme used by Opsgenie API keys.
pub const GENIE_KEY_SCHEME: &str = "GenieKey";

/// Something that can authenticate an outgoing HTTP request.
pub trait AuthProvider: Send + Sync {
    /// Attach authentication headers to the request.
    fn apply(&self, request: &mut reqwest::Request) -> Result<()>;

    /// Short tag naming the scheme (e.g. "basic").
    fn kind(&self) -> &'static str;

    /// Human-readable description with every secret masked.
    fn redacted(&self) -> String;
}

/// A pre-provisioned credential.
#[derive(Clone, PartialEq, Eq)]
pub enum Credential {
    /// `Authorization: Basic base64(principal:secret)`
    Basic { principal: String, secret: String },
    /// `Authorization: Bearer <token>`
    Bearer { token: String },
    /// Bearer token plus `X-Atlassian-Cloud-Id` when a tenant is known
    BearerWithTenant {
        token: String,
        tenant_id: Option<String>,
    },
    /// `Authorization: GenieKey <key>`
    VendorKey { key: String },
}

impl Credential {
    /// Basic credential. Both the principal and the secret must be non-empty.
    pub fn basic(principal: impl Into<String>, secret: impl Into<String>) -> Result<Self> {
        let principal = principal.into();
        let secret = secret.into();
        if principal.is_empty() {
            return Err(Error::Config("basic auth requires a username".into()));
        }
        if secret.is_empty() {
            return Err(Error::Config("basic auth requires a secret".into()));
        }
        Ok(Credential::Basic { principal, secret })
    }

    /// Bearer credential from a personal access token.
    pub fn bearer(token: impl Into<String>) -> Result<Self> {
        let token = non_empty_token(token.into(), "bearer")?;
        Ok(Credential::Bearer { token })
    }

    /// Bearer credential scoped to an Atlassian cloud tenant.
    pub fn bearer_with_tenant(token: impl Into<String>, tenant_id: Option<String>) -> Result<Self> {
        let token = non_empty_token(token.into(), "bearer")?;
        let tenant_id = tenant_id.filter(|id| !id.is_empty());
        Ok(Credential::BearerWithTenant { token, tenant_id })
    }

    /// Opsgenie API key credential.
    pub fn vendor_key(key: impl Into<String>) -> Result<Self> {
        let key = non_empty_token(key.into(), "api key")?;
        Ok(Credential::VendorKey { key })
    }

    /// Headers this credential produces, in the order they are applied.
    pub fn headers(&self) -> Result<Vec<(HeaderName, HeaderValue)>> {
        let mut headers = Vec::with_capacity(2);
        match self {
            Credential::Basic { principal, secret } => {
                let encoded = STANDARD.encode(format!("{}:{}", principal, secret));
                headers.push((AUTHORIZATION, sensitive(&format!("Basic {}", encoded))?));
            }
            Credential::Bearer { token } => {
                headers.push((AUTHORIZATION, sensitive(&format!("Bearer {}", token))?));
            }
            Credential::BearerWithTenant { token, tenant_id } => {
                headers.push((AUTHORIZATION, sensitive(&format!("Bearer {}", token))?));
                if let Some(tenant) = tenant_id {
                    let value = HeaderValue::from_str(tenant)
                        .map_err(|_| Error::Auth("cloud id is not a valid header value".into()))?;
                    headers.push((HeaderName::from_static("x-atlassian-cloud-id"), value));
                }
            }
            Credential::VendorKey { key } => {
                headers.push((
                    AUTHORIZATION,
                    sensitive(&format!("{} {}", GENIE_KEY_SCHEME, key))?,
                ));
            }
        }
        Ok(headers)
    }
}

impl AuthProvider for Credential {
    fn apply(&self, request: &mut reqwest::Request) -> Result<()> {
        for (name, value) in self.headers()? {
            request.headers_mut().insert(name, value);
        }
        Ok(())
    }

    fn kind(&self) -> &'static str {
        match self {
            Credential::Basic { .. } => "basic",
            Credential::Bearer { .. } => "bearer",
            Credential::BearerWithTenant { .. } => "bearer-tenant",
            Credential::VendorKey { .. } => "vendor-key",
        }
    }

    fn redacted(&self) -> String {
        match self {
            Credential::Basic { principal, secret } => {
                format!("basic(user={}, secret={})", principal, redact(secret))
            }
            Credential::Bearer { token } => format!("bearer(token={})", redact(token)),
            Credential::BearerWithTenant { token, tenant_id } => match tenant_id {
                Some(tenant) => format!("bearer(token={}, cloud_id={})", redact(token), tenant),
                None => format!("bearer(token={})", redact(token)),
            },
            Credential::VendorKey { key } => format!("genie-key(key={})", redact(key)),
        }
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

/// Mask a secret for display.
///
/// Secrets of up to eight characters become the same number of asterisks.
/// Longer secrets keep their first and last four characters.
pub fn redact(secret: &str) -> String {
    if secret.is_empty() {
        return "<empty>".to_string();
    }
    let chars: Vec<char> = secret.chars().collect();
    let len = chars.len();
    if len <= 8 {
        return "*".repeat(len);
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[len - 4..].iter().collect();
    format!("{}{}{}", head, "*".repeat(len - 8), tail)
}

fn non_empty_token(token: String, what: &str) -> Result<String> {
    if token.is_empty() {
        return Err(Error::Config(format!("{} credential requires a token", what)));
    }
    Ok(token)
}

fn sensitive(value: &str) -> Result<HeaderValue> {
    let mut header = HeaderValue::from_str(value)
        .map_err(|_| Error::Auth("credential contains characters not allowed in a header".into()))?;
    header.set_sensitive(true);
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_request() -> reqwest::Request {
        reqwest::Request::new(
            reqwest::Method::GET,
            url::Url::parse("https://example.com/rest").unwrap(),
        )
    }

    fn header(req: &reqwest::Request, name: &str) -> Option<String> {
        req.headers()
            .get(name)
            .map(|v| v.to_str().unwrap().to_string())
    }

    // =========================================================================
    // Header formulation
    // =========================================================================

    #[test]
    fn test_basic_header() {
        let cred = Credential::basic("user", "pass").unwrap();
        let mut req = blank_request();
        cred.apply(&mut req).unwrap();
        assert_eq!(header(&req, "authorization").unwrap(), "Basic dXNlcjpwYXNz");
        assert_eq!(req.headers().len(), 1);
    }

    #[test]
    fn test_bearer_header() {
        let cred = Credential::bearer("pat-123").unwrap();
        let mut req = blank_request();
        cred.apply(&mut req).unwrap();
        assert_eq!(header(&req, "authorization").unwrap(), "Bearer pat-123");
        assert_eq!(req.headers().len(), 1);
    }

    #[test]
    fn test_bearer_with_tenant_headers() {
        let cred = Credential::bearer_with_tenant("tok", Some("cloud-1".into())).unwrap();
        let mut req = blank_request();
        cred.apply(&mut req).unwrap();
        assert_eq!(header(&req, "authorization").unwrap(), "Bearer tok");
        assert_eq!(header(&req, CLOUD_ID_HEADER).unwrap(), "cloud-1");
        assert_eq!(req.headers().len(), 2);
    }

    #[test]
    fn test_bearer_with_empty_tenant_sets_one_header() {
        let cred = Credential::bearer_with_tenant("tok", Some(String::new())).unwrap();
        let mut req = blank_request();
        cred.apply(&mut req).unwrap();
        assert_eq!(req.headers().len(), 1);
        assert!(header(&req, CLOUD_ID_HEADER).is_none());
    }

    #[test]
    fn test_vendor_key_header() {
        let cred = Credential::vendor_key("abc-def").unwrap();
        let mut req = blank_request();
        cred.apply(&mut req).unwrap();
        assert_eq!(header(&req, "authorization").unwrap(), "GenieKey abc-def");
    }

    #[test]
    fn test_apply_replaces_existing_authorization() {
        let cred = Credential::bearer("new").unwrap();
        let mut req = blank_request();
        req.headers_mut()
            .insert(AUTHORIZATION, HeaderValue::from_static("Bearer old"));
        cred.apply(&mut req).unwrap();
        assert_eq!(header(&req, "authorization").unwrap(), "Bearer new");
    }

    #[test]
    fn test_apply_rejects_unencodable_token() {
        let cred = Credential::bearer("line\nbreak").unwrap();
        let mut req = blank_request();
        let err = cred.apply(&mut req).unwrap_err();
        assert_eq!(err.kind(), "auth_error");
    }

    // =========================================================================
    // Construction checks
    // =========================================================================

    #[test]
    fn test_empty_secrets_rejected() {
        assert!(matches!(Credential::basic("", "x"), Err(Error::Config(_))));
        assert!(matches!(Credential::basic("u", ""), Err(Error::Config(_))));
        assert!(matches!(Credential::bearer(""), Err(Error::Config(_))));
        assert!(matches!(
            Credential::bearer_with_tenant("", Some("t".into())),
            Err(Error::Config(_))
        ));
        assert!(matches!(Credential::vendor_key(""), Err(Error::Config(_))));
    }

    #[test]
    fn test_kinds() {
        assert_eq!(Credential::basic("u", "p").unwrap().kind(), "basic");
        assert_eq!(Credential::bearer("t").unwrap().kind(), "bearer");
        assert_eq!(
            Credential::bearer_with_tenant("t", None).unwrap().kind(),
            "bearer-tenant"
        );
        assert_eq!(Credential::vendor_key("k").unwrap().kind(), "vendor-key");
    }

    // =========================================================================
    // Redaction
    // =========================================================================

    #[test]
    fn test_redact_empty() {
        assert_eq!(redact(""), "<empty>");
    }

    #[test]
    fn test_redact_short_secrets_fully_masked() {
        assert_eq!(redact("a"), "*");
        assert_eq!(redact("12345678"), "********");
    }

    #[test]
    fn test_redact_long_secret_keeps_edges() {
        assert_eq!(redact("123456789"), "1234*6789");
        assert_eq!(redact("abcdefghijklmnop"), "abcd********mnop");
    }

    #[test]
    fn test_redact_counts_characters_not_bytes() {
        assert_eq!(redact("ключ"), "****");
        assert_eq!(redact("äöüßäöüßäö"), "äöüß**üßäö");
    }

    #[test]
    fn test_debug_never_prints_secret() {
        let cred = Credential::basic("alice", "super-secret-token").unwrap();
        let debug = format!("{:?}", cred);
        assert!(!debug.contains("super-secret-token"));
        assert!(debug.contains("alice"));
        assert!(debug.contains("supe**********oken"));
    }
}
