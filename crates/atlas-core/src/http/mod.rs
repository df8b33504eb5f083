//! Authenticated HTTP engine shared by every service client.
//!
//! Responsibilities:
//! - compose `{base_url}{path}?{query}` and attach the credential
//! - default `Content-Type`/`Accept` to JSON, then apply custom headers
//! - TLS policy and proxy selection, fixed when the client is built
//! - retry transport failures and retryable statuses with capped backoff
//! - log every request with credentials masked out of the URL

pub mod mask;
pub mod proxy;
pub mod retry;

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};
use url::Url;

use crate::auth::AuthProvider;
use crate::context::Context;
use crate::{Error, Result};

pub use mask::{excerpt, mask_url};
pub use proxy::{matches_no_proxy, parse_no_proxy, ProxyConfig, ProxyRoutes};
pub use retry::{is_retryable_status, RetryPolicy};

/// Default per-request deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest error body excerpt carried in [`Error::Api`].
const MAX_ERROR_BODY_CHARS: usize = 1000;

const DEFAULT_USER_AGENT: &str = concat!("atlas-tools/", env!("CARGO_PKG_VERSION"));

/// Settings for building an [`HttpClient`].
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub base_url: String,
    pub verify_ssl: bool,
    pub proxy: ProxyConfig,
    /// Extra headers sent with every request, applied after the JSON defaults
    pub custom_headers: Vec<(String, String)>,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub user_agent: String,
}

impl HttpConfig {
    /// Defaults for the given base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            verify_ssl: true,
            proxy: ProxyConfig::default(),
            custom_headers: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
            retry: RetryPolicy::default(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers.push((name.into(), value.into()));
        self
    }
}

/// One request against a service, relative to the client's base URL.
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: Option<Vec<u8>>,
    headers: Vec<(String, String)>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
            headers: Vec::new(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append a query parameter.
    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Append a query parameter when the value is present.
    pub fn query_opt<V: ToString>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(value) => self.query(key, value),
            None => self,
        }
    }

    /// Serialize `body` as the JSON request body.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self> {
        self.body = Some(serde_json::to_vec(body)?);
        Ok(self)
    }

    /// Add a header for this request only.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// A successful response: the status and the raw body.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: u16,
    pub body: Vec<u8>,
}

impl Response {
    /// Decode the body as `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| Error::Decode(format!("failed to parse response body: {}", e)))
    }

    /// Decode the body as a JSON value. An empty body becomes `null`.
    pub fn value(&self) -> Result<Value> {
        if self.body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        self.json()
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// HTTP client bound to one service base URL and credential.
#[derive(Clone)]
pub struct HttpClient {
    base_url: String,
    client: reqwest::Client,
    auth: Arc<dyn AuthProvider>,
    headers: HeaderMap,
    timeout: Duration,
    retry: RetryPolicy,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &mask_url(&self.base_url))
            .field("auth", &self.auth.redacted())
            .field("timeout", &self.timeout)
            .field("retry", &self.retry)
            .finish()
    }
}

impl HttpClient {
    /// Build a client. Fails with a config error on a bad URL, proxy, or header.
    pub fn new(config: HttpConfig, auth: Arc<dyn AuthProvider>) -> Result<Self> {
        let base_url = config.base_url.trim().trim_end_matches('/').to_string();
        let parsed = Url::parse(&base_url).map_err(|e| {
            Error::Config(format!("invalid base URL {}: {}", mask_url(&base_url), e))
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "base URL must use http or https: {}",
                mask_url(&base_url)
            )));
        }
        if config.retry.max_attempts == 0 {
            return Err(Error::Config("retry policy needs at least one attempt".into()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        for (name, value) in &config.custom_headers {
            let (name, value) = parse_header(name, value)?;
            headers.insert(name, value);
        }

        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.clone());
        if !config.verify_ssl {
            warn!(base_url = %mask_url(&base_url), "TLS certificate verification disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }
        builder = config.proxy.install(builder)?;
        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e.without_url())))?;

        debug!(
            base_url = %mask_url(&base_url),
            auth = auth.kind(),
            custom_headers = config.custom_headers.len(),
            "HTTP client ready"
        );

        Ok(Self {
            base_url,
            client,
            auth,
            headers,
            timeout: config.timeout,
            retry: config.retry,
        })
    }

    /// Base URL without a trailing slash.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Execute a request, retrying failures per the policy.
    pub async fn execute(&self, ctx: &Context, request: Request) -> Result<Response> {
        let url = self.compose_url(&request)?;
        let masked = mask_url(url.as_str());
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            if let Some(err) = ctx.err() {
                return Err(err);
            }

            let outgoing = self.build_request(&request, &url, ctx)?;
            debug!(method = %request.method, url = %masked, attempt, "sending request");

            let outcome = tokio::select! {
                err = ctx.done() => return Err(err),
                outcome = self.send_once(outgoing) => outcome,
            };

            let failure = match outcome {
                Ok(response) => return Ok(response),
                Err(Attempt::Fatal(err)) => {
                    warn!(method = %request.method, url = %masked, error = %err, "request failed");
                    return Err(err);
                }
                Err(Attempt::Retryable(err)) => err,
            };

            if attempt >= self.retry.max_attempts {
                error!(
                    method = %request.method,
                    url = %masked,
                    attempts = attempt,
                    error = %failure,
                    "all retry attempts exhausted"
                );
                return Err(Error::RetriesExhausted {
                    attempts: attempt,
                    source: Box::new(failure),
                });
            }

            let delay = self.retry.delay_for(attempt);
            warn!(
                method = %request.method,
                url = %masked,
                attempt,
                max_attempts = self.retry.max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %failure,
                "retrying request"
            );
            ctx.sleep(delay).await?;
        }
    }

    /// GET `path` and decode the JSON body.
    pub async fn get_json(&self, ctx: &Context, request: Request) -> Result<Value> {
        self.execute(ctx, request).await?.value()
    }

    /// POST a JSON body and decode the JSON response.
    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        ctx: &Context,
        path: &str,
        body: &B,
    ) -> Result<Value> {
        self.execute(ctx, Request::post(path).json(body)?)
            .await?
            .value()
    }

    /// PUT a JSON body and decode the JSON response (often empty).
    pub async fn put_json<B: Serialize + ?Sized>(
        &self,
        ctx: &Context,
        path: &str,
        body: &B,
    ) -> Result<Value> {
        self.execute(ctx, Request::put(path).json(body)?)
            .await?
            .value()
    }

    /// DELETE `path`.
    pub async fn delete(&self, ctx: &Context, path: &str) -> Result<Value> {
        self.execute(ctx, Request::delete(path)).await?.value()
    }

    fn compose_url(&self, request: &Request) -> Result<Url> {
        let path = if request.path.starts_with('/') || request.path.is_empty() {
            request.path.clone()
        } else {
            format!("/{}", request.path)
        };
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| Error::InvalidInput(format!("invalid request path {}: {}", path, e)))?;
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(request.query.iter());
        }
        Ok(url)
    }

    fn build_request(&self, request: &Request, url: &Url, ctx: &Context) -> Result<reqwest::Request> {
        let mut outgoing = reqwest::Request::new(request.method.clone(), url.clone());
        *outgoing.headers_mut() = self.headers.clone();
        for (name, value) in &request.headers {
            let (name, value) = parse_header(name, value)?;
            outgoing.headers_mut().insert(name, value);
        }
        if let Some(body) = &request.body {
            *outgoing.body_mut() = Some(body.clone().into());
        }
        let timeout = match ctx.remaining() {
            Some(remaining) => remaining.min(self.timeout),
            None => self.timeout,
        };
        *outgoing.timeout_mut() = Some(timeout);
        self.auth.apply(&mut outgoing)?;
        Ok(outgoing)
    }

    async fn send_once(&self, outgoing: reqwest::Request) -> std::result::Result<Response, Attempt> {
        let response = self
            .client
            .execute(outgoing)
            .await
            .map_err(|e| Attempt::Retryable(Error::Transport(e.without_url().to_string())))?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| Attempt::Retryable(Error::Transport(e.without_url().to_string())))?;

        if status.is_success() {
            return Ok(Response {
                status: status.as_u16(),
                body: body.to_vec(),
            });
        }

        let err = Error::Api {
            status: status.as_u16(),
            status_line: status.to_string(),
            body: excerpt(&String::from_utf8_lossy(&body), MAX_ERROR_BODY_CHARS),
        };
        if is_retryable_status(status.as_u16()) {
            Err(Attempt::Retryable(err))
        } else {
            Err(Attempt::Fatal(err))
        }
    }
}

/// Outcome of a single failed attempt.
enum Attempt {
    Retryable(Error),
    Fatal(Error),
}

fn parse_header(name: &str, value: &str) -> Result<(HeaderName, HeaderValue)> {
    let header_name = HeaderName::from_bytes(name.trim().as_bytes())
        .map_err(|_| Error::Config(format!("invalid header name: {:?}", name)))?;
    let header_value = HeaderValue::from_str(value.trim())
        .map_err(|_| Error::Config(format!("invalid value for header {}", name.trim())))?;
    Ok((header_name, header_value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Credential;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, retry: RetryPolicy) -> HttpClient {
        let config = HttpConfig::new(server.uri()).with_retry(retry);
        HttpClient::new(config, Arc::new(Credential::bearer("tok").unwrap())).unwrap()
    }

    fn fast_retry(attempts: u32) -> RetryPolicy {
        RetryPolicy::new(attempts, Duration::from_millis(10), Duration::from_millis(100)).unwrap()
    }

    // =========================================================================
    // Construction
    // =========================================================================

    #[test]
    fn test_rejects_invalid_base_url() {
        let auth = Arc::new(Credential::bearer("t").unwrap());
        let err = HttpClient::new(HttpConfig::new("not a url"), auth.clone()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        let err = HttpClient::new(HttpConfig::new("ftp://host"), auth).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_rejects_invalid_custom_header() {
        let auth = Arc::new(Credential::bearer("t").unwrap());
        let config = HttpConfig::new("https://example.com").with_header("bad header", "x");
        assert!(matches!(HttpClient::new(config, auth), Err(Error::Config(_))));
    }

    #[test]
    fn test_trailing_slash_trimmed() {
        let auth = Arc::new(Credential::bearer("t").unwrap());
        let client = HttpClient::new(HttpConfig::new("https://example.com/wiki/"), auth).unwrap();
        assert_eq!(client.base_url(), "https://example.com/wiki");
    }

    #[test]
    fn test_debug_masks_credentials() {
        let auth = Arc::new(Credential::bearer("very-secret-token").unwrap());
        let client = HttpClient::new(HttpConfig::new("https://u:p@example.com"), auth).unwrap();
        let debug = format!("{:?}", client);
        assert!(!debug.contains("very-secret-token"));
        assert!(!debug.contains("u:p@"));
    }

    #[test]
    fn test_compose_url_with_query() {
        let auth = Arc::new(Credential::bearer("t").unwrap());
        let client = HttpClient::new(HttpConfig::new("https://example.com/wiki"), auth).unwrap();
        let url = client
            .compose_url(&Request::get("rest/api/search").query("cql", "type = page"))
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/wiki/rest/api/search?cql=type+%3D+page"
        );
    }

    // =========================================================================
    // Request plumbing
    // =========================================================================

    #[tokio::test]
    async fn test_sends_auth_default_and_custom_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/item"))
            .and(query_param("a", "1"))
            .and(header("authorization", "Bearer tok"))
            .and(header("content-type", "application/json"))
            .and(header("accept", "application/json"))
            .and(header("x-team", "core"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let config = HttpConfig::new(server.uri()).with_header("X-Team", "core");
        let client = HttpClient::new(config, Arc::new(Credential::bearer("tok").unwrap())).unwrap();
        let value = client
            .get_json(&Context::new(), Request::get("/rest/item").query("a", 1))
            .await
            .unwrap();
        assert_eq!(value, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_empty_body_decodes_to_null() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/issue/X-1"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let client = client_for(&server, fast_retry(1));
        let value = client
            .put_json(&Context::new(), "/issue/X-1", &json!({"fields": {}}))
            .await
            .unwrap();
        assert_eq!(value, Value::Null);
    }

    #[tokio::test]
    async fn test_invalid_json_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = client_for(&server, fast_retry(1));
        let err = client
            .get_json(&Context::new(), Request::get("/x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "decode_error");
    }

    // =========================================================================
    // Retry loop
    // =========================================================================

    #[tokio::test]
    async fn test_retries_503_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"done": 1})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, fast_retry(3));
        let started = std::time::Instant::now();
        let value = client
            .get_json(&Context::new(), Request::get("/flaky"))
            .await
            .unwrap();
        assert_eq!(value, json!({"done": 1}));
        // 10ms + 20ms of backoff
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    /// Log sink shared between the test and the subscriber.
    #[derive(Clone, Default)]
    struct CapturedLogs(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl CapturedLogs {
        fn lines(&self) -> Vec<String> {
            let bytes = self.0.lock().unwrap().clone();
            String::from_utf8_lossy(&bytes).lines().map(str::to_string).collect()
        }
    }

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CapturedLogs {
        type Writer = CapturedLogs;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }

    #[tokio::test]
    async fn test_retries_are_logged_once_per_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"done": 1})))
            .mount(&server)
            .await;

        let logs = CapturedLogs::default();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(logs.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let client = client_for(&server, fast_retry(3));
        client
            .get_json(&Context::new(), Request::get("/flaky"))
            .await
            .unwrap();

        let retries: Vec<String> = logs
            .lines()
            .into_iter()
            .filter(|line| line.contains("retrying request"))
            .collect();
        assert_eq!(retries.len(), 2, "{:?}", retries);
        assert!(retries[0].contains("attempt=1"));
        assert!(retries[0].contains("delay_ms=10"));
        assert!(retries[1].contains("attempt=2"));
        assert!(retries[1].contains("delay_ms=20"));
        assert!(retries.iter().all(|line| line.contains("WARN")));
        assert!(!logs.lines().iter().any(|line| line.contains("all retry attempts exhausted")));
    }

    #[tokio::test]
    async fn test_retries_429() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, fast_retry(2));
        assert_eq!(
            client.get_json(&Context::new(), Request::get("/x")).await.unwrap(),
            json!([])
        );
    }

    #[tokio::test]
    async fn test_client_error_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Issue does not exist"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, fast_retry(3));
        let err = client
            .get_json(&Context::new(), Request::get("/issue/NOPE-1"))
            .await
            .unwrap_err();
        match err {
            Error::Api { status, status_line, body } => {
                assert_eq!(status, 404);
                assert_eq!(status_line, "404 Not Found");
                assert_eq!(body, "Issue does not exist");
            }
            other => panic!("expected API error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_exhausted_retries_wrap_last_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .expect(3)
            .mount(&server)
            .await;

        let client = client_for(&server, fast_retry(3));
        let err = client
            .get_json(&Context::new(), Request::get("/down"))
            .await
            .unwrap_err();
        match &err {
            Error::RetriesExhausted { attempts, source } => {
                assert_eq!(*attempts, 3);
                assert_eq!(source.status(), Some(502));
            }
            other => panic!("expected exhausted retries, got {:?}", other),
        }
        assert_eq!(err.kind(), "http_error");
    }

    #[tokio::test]
    async fn test_transport_error_retried_then_wrapped() {
        // Nothing listens on this port once the server is dropped.
        let uri = {
            let server = MockServer::builder().start().await;
            server.uri()
        };
        let config = HttpConfig::new(uri).with_retry(fast_retry(2));
        let client = HttpClient::new(config, Arc::new(Credential::bearer("t").unwrap())).unwrap();
        let err = client
            .get_json(&Context::new(), Request::get("/x"))
            .await
            .unwrap_err();
        match err {
            Error::RetriesExhausted { attempts, source } => {
                assert_eq!(attempts, 2);
                assert!(matches!(*source, Error::Transport(_)));
            }
            other => panic!("expected exhausted retries, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_cancel_during_backoff_stops_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let retry =
            RetryPolicy::new(5, Duration::from_secs(30), Duration::from_secs(60)).unwrap();
        let client = client_for(&server, retry);
        let ctx = Context::new();
        let canceller = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            canceller.cancel();
        });

        let started = std::time::Instant::now();
        let err = client
            .get_json(&ctx, Request::get("/slow"))
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_already_cancelled_context_sends_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server, fast_retry(3));
        let ctx = Context::new();
        ctx.cancel();
        let err = client.get_json(&ctx, Request::get("/x")).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn test_auth_failure_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let config = HttpConfig::new(server.uri()).with_retry(fast_retry(3));
        let client =
            HttpClient::new(config, Arc::new(Credential::bearer("bad\ntoken").unwrap())).unwrap();
        let err = client
            .get_json(&Context::new(), Request::get("/x"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "auth_error");
    }
}
