use crate::resilience::{is_retryable_status, RateLimiter, RateLimiterConfig, RetryConfig};
use crate::utils::env_parse;
use crate::{Error, ErrorContext, Result};
use arc_swap::ArcSwap;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Method;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Correlation id attached to every logical request (shared by all of its attempts).
pub const REQUEST_ID_HEADER: &str = "x-client-request-id";

/// One field of a multipart upload. Kept as owned data so the body can be rebuilt per attempt.
#[derive(Debug, Clone)]
pub enum FormPart {
    Text {
        name: String,
        value: String,
    },
    File {
        name: String,
        file_name: String,
        data: Bytes,
        mime: Option<String>,
    },
}

impl FormPart {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        FormPart::Text {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn file(name: impl Into<String>, file_name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        FormPart::File {
            name: name.into(),
            file_name: file_name.into(),
            data: data.into(),
            mime: None,
        }
    }

    /// Set the MIME type of a file part; ignored for text parts.
    pub fn with_mime(mut self, mime_type: impl Into<String>) -> Self {
        if let FormPart::File { mime, .. } = &mut self {
            *mime = Some(mime_type.into());
        }
        self
    }
}

#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Bytes(Bytes),
    Multipart(Vec<FormPart>),
}

/// A fully formed, replayable HTTP operation.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: RequestBody,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HashMap::new(),
            body: RequestBody::Empty,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Set a header, replacing any existing one whose name differs only in case.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|k, _| !k.eq_ignore_ascii_case(&name));
        self.headers.insert(name, value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = RequestBody::Bytes(body.into());
        self
    }

    pub fn with_json<T: Serialize + ?Sized>(self, body: &T) -> Result<Self> {
        let bytes = serde_json::to_vec(body)?;
        Ok(self
            .with_header("Content-Type", "application/json")
            .with_body(bytes))
    }

    pub fn with_form(mut self, parts: Vec<FormPart>) -> Self {
        self.body = RequestBody::Multipart(parts);
        self
    }

    fn is_multipart(&self) -> bool {
        matches!(self.body, RequestBody::Multipart(_))
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Decode the body as JSON. Decode failures are not retried.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(Error::ResponseUnparsable)
    }

    /// Turn a 4xx/5xx response into [`Error::RequestFailed`].
    pub fn error_for_status(self) -> Result<Self> {
        if self.status >= 400 {
            return Err(Error::RequestFailed {
                status: self.status,
                body: self.text(),
            });
        }
        Ok(self)
    }
}

/// The HTTP execution primitive: one request, one response or transport error. No retries.
#[async_trait]
pub trait HttpExecutor: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> std::result::Result<HttpResponse, TransportError>;
}

/// [`HttpExecutor`] backed by a pooled `reqwest::Client`.
pub struct ReqwestExecutor {
    client: reqwest::Client,
}

impl ReqwestExecutor {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(32)
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .build()
            .map_err(|e| Error::Transport(TransportError::Other(e.to_string())))?;
        Ok(Self { client })
    }

    fn build_form(parts: &[FormPart]) -> std::result::Result<reqwest::multipart::Form, TransportError> {
        let mut form = reqwest::multipart::Form::new();
        for part in parts {
            form = match part {
                FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
                FormPart::File {
                    name,
                    file_name,
                    data,
                    mime,
                } => {
                    let mut p = reqwest::multipart::Part::bytes(data.to_vec()).file_name(file_name.clone());
                    if let Some(mime) = mime {
                        p = p.mime_str(mime)?;
                    }
                    form.part(name.clone(), p)
                }
            };
        }
        Ok(form)
    }
}

#[async_trait]
impl HttpExecutor for ReqwestExecutor {
    async fn send(&self, request: &HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
        let mut req = self.client.request(request.method.clone(), &request.url);
        for (k, v) in &request.headers {
            req = req.header(k.as_str(), v.as_str());
        }
        req = match &request.body {
            RequestBody::Empty => req,
            RequestBody::Bytes(bytes) => req.body(bytes.clone()),
            RequestBody::Multipart(parts) => req.multipart(Self::build_form(parts)?),
        };

        let resp = req.send().await.map_err(TransportError::from_reqwest)?;
        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = resp.bytes().await.map_err(TransportError::from_reqwest)?;
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    #[serde(with = "crate::utils::duration_ms")]
    pub max_request_timeout: Duration,
    pub requests_per_second: u32,
    pub max_retries: u32,
    /// Base delay of the linear backoff.
    #[serde(with = "crate::utils::duration_ms")]
    pub retry_wait_time: Duration,
    /// Merged into every request; request headers win on conflict.
    pub base_headers: HashMap<String, String>,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_request_timeout: Duration::from_secs(30),
            requests_per_second: 10,
            max_retries: 3,
            retry_wait_time: Duration::from_secs(1),
            base_headers: HashMap::new(),
        }
    }
}

impl TransportConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults with environment overrides (`GROQ_HTTP_TIMEOUT_SECS`, `GROQ_REQUESTS_PER_SECOND`,
    /// `GROQ_MAX_RETRIES`, `GROQ_RETRY_WAIT_MS`, `GROQ_API_KEY`).
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(secs) = env_parse::<u64>("GROQ_HTTP_TIMEOUT_SECS") {
            cfg.max_request_timeout = Duration::from_secs(secs);
        }
        if let Some(rps) = env_parse::<u32>("GROQ_REQUESTS_PER_SECOND") {
            cfg.requests_per_second = rps;
        }
        if let Some(n) = env_parse::<u32>("GROQ_MAX_RETRIES") {
            cfg.max_retries = n;
        }
        if let Some(ms) = env_parse::<u64>("GROQ_RETRY_WAIT_MS") {
            cfg.retry_wait_time = Duration::from_millis(ms);
        }
        if let Ok(key) = std::env::var("GROQ_API_KEY") {
            cfg = cfg.with_api_key(key);
        }
        cfg
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let cfg: Self = serde_yaml::from_str(yaml).map_err(|e| {
            Error::configuration_with_context(
                format!("invalid transport config: {}", e),
                ErrorContext::new().with_source("transport_config"),
            )
        })?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.max_request_timeout = timeout;
        self
    }

    pub fn with_requests_per_second(mut self, rps: u32) -> Self {
        self.requests_per_second = rps;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_wait_time(mut self, wait: Duration) -> Self {
        self.retry_wait_time = wait;
        self
    }

    pub fn with_base_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.base_headers.insert(name.into(), value.into());
        self
    }

    pub fn with_api_key(self, api_key: impl AsRef<str>) -> Self {
        self.with_base_header("Authorization", format!("Bearer {}", api_key.as_ref()))
    }

    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            base_delay: self.retry_wait_time,
        }
    }

    pub fn rate_limiter_config(&self) -> RateLimiterConfig {
        RateLimiterConfig {
            requests_per_second: self.requests_per_second,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_request_timeout.is_zero() {
            return Err(Error::configuration_with_context(
                "request timeout must be positive",
                ErrorContext::new().with_field_path("transport.max_request_timeout"),
            ));
        }
        if self.requests_per_second == 0 {
            return Err(Error::configuration_with_context(
                "requests_per_second must be greater than zero",
                ErrorContext::new().with_field_path("transport.requests_per_second"),
            ));
        }
        self.retry_config().validate()
    }
}

/// Rate-limited, retrying HTTP transport.
///
/// Every attempt takes a token from the [`RateLimiter`] first. Transport errors and
/// retryable statuses (see [`crate::resilience::RETRYABLE_STATUS`]) are retried with
/// linear backoff; any other response is returned as-is, whatever its status.
pub struct HttpTransport {
    executor: Arc<dyn HttpExecutor>,
    limiter: Arc<RateLimiter>,
    retry: RetryConfig,
    base_headers: ArcSwap<HashMap<String, String>>,
}

impl HttpTransport {
    pub fn new(config: TransportConfig) -> Result<Self> {
        let executor = Arc::new(ReqwestExecutor::new(config.max_request_timeout)?);
        Self::with_executor(config, executor)
    }

    /// Build over a custom execution primitive (proxies, test doubles, other HTTP stacks).
    pub fn with_executor(config: TransportConfig, executor: Arc<dyn HttpExecutor>) -> Result<Self> {
        config.validate()?;
        let limiter = Arc::new(RateLimiter::new(config.rate_limiter_config())?);
        Ok(Self::from_parts(executor, limiter, config.retry_config(), config.base_headers))
    }

    /// Assemble from pre-built parts, e.g. to share one limiter between transports.
    pub fn from_parts(
        executor: Arc<dyn HttpExecutor>,
        limiter: Arc<RateLimiter>,
        retry: RetryConfig,
        base_headers: HashMap<String, String>,
    ) -> Self {
        Self {
            executor,
            limiter,
            retry,
            base_headers: ArcSwap::from_pointee(base_headers),
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// A copy of the current base headers.
    pub fn base_headers(&self) -> HashMap<String, String> {
        self.base_headers.load().as_ref().clone()
    }

    /// Replace all base headers. In-flight requests keep the headers they started with.
    pub fn set_base_headers(&self, headers: HashMap<String, String>) {
        debug!(count = headers.len(), "base headers replaced");
        self.base_headers.store(Arc::new(headers));
    }

    fn prepare(&self, mut request: HttpRequest, request_id: &str) -> HttpRequest {
        let base = self.base_headers.load();
        let multipart = request.is_multipart();
        for (k, v) in base.iter() {
            // The multipart boundary is set by the form encoder.
            if multipart && k.eq_ignore_ascii_case("content-type") {
                continue;
            }
            let overridden = request.headers.keys().any(|h| h.eq_ignore_ascii_case(k));
            if !overridden {
                request.headers.insert(k.clone(), v.clone());
            }
        }
        request
            .headers
            .entry(REQUEST_ID_HEADER.to_string())
            .or_insert_with(|| request_id.to_string());
        request
    }

    /// Execute one logical operation with rate limiting and bounded retries.
    ///
    /// Returns the first non-retryable response. Fails with [`Error::TransportFailed`]
    /// after `max_retries + 1` unsuccessful attempts, with [`Error::RateLimitExceeded`]
    /// if cancelled while waiting for a token, and with [`Error::Cancelled`] if cancelled
    /// during an attempt or a backoff sleep.
    pub async fn execute(&self, cancel: &CancellationToken, request: HttpRequest) -> Result<HttpResponse> {
        let request_id = Uuid::new_v4().to_string();
        let request = self.prepare(request, &request_id);
        let start = Instant::now();
        let mut last_error: Option<TransportError> = None;

        for attempt in 0..=self.retry.max_retries {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            if let Some(delay) = self.retry.backoff(attempt) {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(Error::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
            }

            self.limiter.acquire(cancel).await.map_err(|e| match e {
                Error::Cancelled => Error::RateLimitExceeded,
                other => other,
            })?;

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                outcome = self.executor.send(&request) => outcome,
            };

            let failure = match outcome {
                Ok(resp) if !is_retryable_status(resp.status) => {
                    debug!(
                        request_id = request_id.as_str(),
                        method = %request.method,
                        http_status = resp.status,
                        attempt,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "request completed"
                    );
                    return Ok(resp);
                }
                Ok(resp) => TransportError::RetryableStatus { status: resp.status },
                Err(e) => e,
            };

            let next_delay_ms = self
                .retry
                .backoff(attempt + 1)
                .map(|d| d.as_millis() as u64);
            warn!(
                request_id = request_id.as_str(),
                url = request.url.as_str(),
                attempt,
                error = %failure,
                next_delay_ms = ?next_delay_ms,
                "request attempt failed"
            );
            last_error = Some(failure);
        }

        let attempts = self.retry.max_attempts();
        info!(
            request_id = request_id.as_str(),
            url = request.url.as_str(),
            attempts,
            duration_ms = start.elapsed().as_millis() as u64,
            "retries exhausted"
        );
        Err(Error::TransportFailed {
            attempts,
            last: last_error.unwrap_or_else(|| TransportError::Other("no attempt was made".into())),
        })
    }

    /// JSON request/response helper.
    ///
    /// Sends `body` as JSON, treats any status >= 400 as [`Error::RequestFailed`], and
    /// decodes the response into `T` ([`Error::ResponseUnparsable`] on failure).
    pub async fn execute_json<T, B>(
        &self,
        cancel: &CancellationToken,
        method: Method,
        url: &str,
        body: Option<&B>,
        headers: Option<&HashMap<String, String>>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut request = HttpRequest::new(method, url);
        if let Some(body) = body {
            request = request.with_json(body)?;
        }
        if let Some(headers) = headers {
            for (k, v) in headers {
                request = request.with_header(k.clone(), v.clone());
            }
        }
        request = request.with_header("Content-Type", "application/json");
        self.execute(cancel, request).await?.error_for_status()?.json()
    }

    /// Multipart upload helper (audio transcription/translation style endpoints).
    pub async fn execute_multipart<T: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        url: &str,
        parts: Vec<FormPart>,
    ) -> Result<T> {
        let request = HttpRequest::post(url).with_form(parts);
        self.execute(cancel, request).await?.error_for_status()?.json()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Request timed out")]
    Timeout,

    #[error("Retryable status: HTTP {status}")]
    RetryableStatus { status: u16 },

    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else {
            TransportError::Http(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    /// Replays a fixed script of outcomes, then repeats the last one.
    struct ScriptedExecutor {
        script: Vec<std::result::Result<u16, &'static str>>,
        calls: AtomicU32,
        seen: Mutex<Vec<HttpRequest>>,
    }

    impl ScriptedExecutor {
        fn new(script: Vec<std::result::Result<u16, &'static str>>) -> Arc<Self> {
            Arc::new(Self {
                script,
                calls: AtomicU32::new(0),
                seen: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HttpExecutor for ScriptedExecutor {
        async fn send(&self, request: &HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            self.seen.lock().unwrap().push(request.clone());
            let step = self.script[n.min(self.script.len() - 1)];
            match step {
                Ok(status) => Ok(HttpResponse {
                    status,
                    headers: HashMap::new(),
                    body: Bytes::from_static(br#"{"ok":true}"#),
                }),
                Err(msg) => Err(TransportError::Other(msg.to_string())),
            }
        }
    }

    fn fast_config(max_retries: u32) -> TransportConfig {
        TransportConfig::new()
            .with_requests_per_second(1000)
            .with_max_retries(max_retries)
            .with_retry_wait_time(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let exec = ScriptedExecutor::new(vec![Ok(200)]);
        let transport = HttpTransport::with_executor(fast_config(3), exec.clone()).unwrap();
        let resp = transport
            .execute(&CancellationToken::new(), HttpRequest::get("http://test/ok"))
            .await
            .unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(exec.calls(), 1);
    }

    #[tokio::test]
    async fn test_retryable_status_then_success() {
        let exec = ScriptedExecutor::new(vec![Ok(503), Ok(429), Ok(502), Ok(200)]);
        let transport = HttpTransport::with_executor(fast_config(3), exec.clone()).unwrap();
        let resp = transport
            .execute(&CancellationToken::new(), HttpRequest::get("http://test/flaky"))
            .await
            .unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(exec.calls(), 4);
    }

    #[tokio::test]
    async fn test_always_failing_exhausts_attempts() {
        let exec = ScriptedExecutor::new(vec![Err("connection refused")]);
        let transport = HttpTransport::with_executor(fast_config(2), exec.clone()).unwrap();
        let err = transport
            .execute(&CancellationToken::new(), HttpRequest::get("http://test/down"))
            .await
            .unwrap_err();
        assert_eq!(exec.calls(), 3);
        match err {
            Error::TransportFailed { attempts, last } => {
                assert_eq!(attempts, 3);
                assert!(last.to_string().contains("connection refused"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_non_retryable_status_returned_immediately() {
        let exec = ScriptedExecutor::new(vec![Ok(404), Ok(200)]);
        let transport = HttpTransport::with_executor(fast_config(3), exec.clone()).unwrap();
        let resp = transport
            .execute(&CancellationToken::new(), HttpRequest::get("http://test/missing"))
            .await
            .unwrap();
        assert_eq!(resp.status, 404);
        assert_eq!(exec.calls(), 1);
        assert!(matches!(resp.error_for_status(), Err(Error::RequestFailed { status: 404, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_stops_retrying() {
        let exec = ScriptedExecutor::new(vec![Ok(500)]);
        let config = fast_config(5).with_retry_wait_time(Duration::from_secs(10));
        let transport = HttpTransport::with_executor(config, exec.clone()).unwrap();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });
        let err = transport
            .execute(&cancel, HttpRequest::get("http://test/slow"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert_eq!(exec.calls(), 1);
    }

    #[tokio::test]
    async fn test_cancel_while_waiting_for_token_is_rate_limit_exceeded() {
        let exec = ScriptedExecutor::new(vec![Ok(200)]);
        let limiter = Arc::new(RateLimiter::without_refill(0));
        let transport = HttpTransport::from_parts(exec.clone(), limiter, RetryConfig::default(), HashMap::new());
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });
        let err = transport
            .execute(&cancel, HttpRequest::get("http://test/throttled"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::RateLimitExceeded));
        assert_eq!(exec.calls(), 0);
    }

    #[tokio::test]
    async fn test_base_headers_merged_and_overridden() {
        let exec = ScriptedExecutor::new(vec![Ok(200)]);
        let config = fast_config(0)
            .with_api_key("secret")
            .with_base_header("X-Team", "core");
        let transport = HttpTransport::with_executor(config, exec.clone()).unwrap();
        transport
            .execute(
                &CancellationToken::new(),
                HttpRequest::get("http://test/h").with_header("x-team", "override"),
            )
            .await
            .unwrap();

        let seen = exec.seen.lock().unwrap();
        let headers = &seen[0].headers;
        assert_eq!(headers.get("Authorization").map(String::as_str), Some("Bearer secret"));
        assert_eq!(headers.get("x-team").map(String::as_str), Some("override"));
        assert!(!headers.contains_key("X-Team"));
        assert!(headers.contains_key(REQUEST_ID_HEADER));
    }

    #[tokio::test]
    async fn test_execute_json_sends_single_content_type() {
        let exec = ScriptedExecutor::new(vec![Ok(200)]);
        let transport = HttpTransport::with_executor(fast_config(0), exec.clone()).unwrap();
        let mut extra = HashMap::new();
        extra.insert("content-type".to_string(), "text/plain".to_string());
        extra.insert("X-Trace".to_string(), "t1".to_string());
        let _: serde_json::Value = transport
            .execute_json(
                &CancellationToken::new(),
                Method::POST,
                "http://test/json",
                Some(&serde_json::json!({"a": 1})),
                Some(&extra),
            )
            .await
            .unwrap();

        let seen = exec.seen.lock().unwrap();
        let content_types: Vec<_> = seen[0]
            .headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("content-type"))
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(content_types, vec!["application/json"]);
        assert_eq!(seen[0].headers.get("X-Trace").map(String::as_str), Some("t1"));
    }

    #[test]
    fn test_with_header_replaces_case_insensitively() {
        let req = HttpRequest::get("http://test/h")
            .with_header("X-Team", "a")
            .with_header("x-team", "b");
        assert_eq!(req.headers.len(), 1);
        assert_eq!(req.headers.get("x-team").map(String::as_str), Some("b"));
    }

    #[tokio::test]
    async fn test_multipart_skips_base_content_type() {
        let exec = ScriptedExecutor::new(vec![Ok(200)]);
        let config = fast_config(0).with_base_header("Content-Type", "application/json");
        let transport = HttpTransport::with_executor(config, exec.clone()).unwrap();
        let parts = vec![
            FormPart::text("model", "whisper-large-v3"),
            FormPart::file("file", "a.wav", vec![1u8, 2, 3]),
        ];
        let _: serde_json::Value = transport
            .execute_multipart(&CancellationToken::new(), "http://test/audio", parts)
            .await
            .unwrap();
        let seen = exec.seen.lock().unwrap();
        assert!(!seen[0].headers.contains_key("Content-Type"));
    }

    #[tokio::test]
    async fn test_set_base_headers_replaces_all() {
        let exec = ScriptedExecutor::new(vec![Ok(200)]);
        let transport = HttpTransport::with_executor(fast_config(0).with_api_key("a"), exec).unwrap();
        let mut next = HashMap::new();
        next.insert("Authorization".to_string(), "Bearer b".to_string());
        transport.set_base_headers(next.clone());
        assert_eq!(transport.base_headers(), next);
    }

    #[test]
    fn test_config_from_yaml() {
        let cfg = TransportConfig::from_yaml_str(
            "requests_per_second: 5\nmax_retries: 1\nretry_wait_time: 250\n",
        )
        .unwrap();
        assert_eq!(cfg.requests_per_second, 5);
        assert_eq!(cfg.max_retries, 1);
        assert_eq!(cfg.retry_wait_time, Duration::from_millis(250));
        assert_eq!(cfg.max_request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_config_validation() {
        assert!(TransportConfig::new().with_requests_per_second(0).validate().is_err());
        assert!(TransportConfig::new().with_retry_wait_time(Duration::ZERO).validate().is_err());
        assert!(TransportConfig::new().validate().is_ok());
    }
}
