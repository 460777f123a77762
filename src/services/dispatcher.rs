use crate::constants::{api, retry as retry_constants};
use crate::errors::{ApiError, ApiErrorKind};
use crate::services::concurrency::ConcurrencyGate;
use crate::services::credentials::Credentials;
use crate::services::logger::Logger;
use crate::services::settings::Settings;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER};
use reqwest::{Client, Method};
use serde_json::Value;
use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: f64,
    pub rate_limit_delay_ms: u64,
    pub status_codes: Vec<u16>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: retry_constants::MAX_RETRIES,
            base_delay_ms: retry_constants::BASE_DELAY_MS,
            max_delay_ms: retry_constants::MAX_DELAY_MS,
            jitter: retry_constants::JITTER,
            rate_limit_delay_ms: retry_constants::RATE_LIMIT_DELAY_MS,
            status_codes: retry_constants::STATUS_CODES.to_vec(),
        }
    }
}

impl RetryPolicy {
    pub fn backoff_delay_ms(&self, attempt: usize) -> u64 {
        self.backoff_delay_with(attempt, rand::random::<f64>())
    }

    // `unit` is a sample from [0, 1) scaling the upward-only jitter.
    pub fn backoff_delay_with(&self, attempt: usize, unit: f64) -> u64 {
        let exponent = attempt.min(32) as i32;
        let mut delay = (self.base_delay_ms as f64) * 2f64.powi(exponent);
        if self.jitter > 0.0 {
            delay += delay * self.jitter * unit.clamp(0.0, 1.0);
        }
        delay.min(self.max_delay_ms as f64).max(0.0) as u64
    }

    pub fn rate_limit_delay(&self, retry_after: Option<&str>) -> u64 {
        retry_after
            .and_then(|raw| raw.trim().parse::<f64>().ok())
            .filter(|secs| secs.is_finite() && *secs >= 0.0)
            .map(|secs| ((secs * 1000.0).ceil() as u64).min(self.rate_limit_delay_ms))
            .unwrap_or(self.rate_limit_delay_ms)
    }

    fn retries_status(&self, status: u16) -> bool {
        self.status_codes.contains(&status)
    }
}

#[derive(Clone, Debug)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub operation: String,
    pub item_index: usize,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            operation: String::new(),
            item_index: 0,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_context(mut self, operation: impl Into<String>, item_index: usize) -> Self {
        self.operation = operation.into();
        self.item_index = item_index;
        self
    }
}

#[derive(Debug)]
enum Failure {
    Status {
        status: u16,
        retry_after: Option<String>,
        message_len: Option<usize>,
    },
    Transport {
        retryable: bool,
    },
}

#[derive(Clone)]
pub struct Dispatcher {
    logger: Logger,
    client: Client,
    base_url: String,
    credentials: Arc<Credentials>,
    gate: Arc<ConcurrencyGate>,
    policy: RetryPolicy,
}

impl Dispatcher {
    pub fn new(
        logger: Logger,
        settings: &Settings,
        credentials: Arc<Credentials>,
        gate: Arc<ConcurrencyGate>,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .user_agent(api::USER_AGENT)
            .build()
            .map_err(|_| ApiError::unknown())?;
        Ok(Self {
            logger: logger.child("dispatcher"),
            client,
            base_url: settings.base_url.clone(),
            credentials,
            gate,
            policy: settings.retry.clone(),
        })
    }

    pub fn gate(&self) -> &Arc<ConcurrencyGate> {
        &self.gate
    }

    pub fn secret_values(&self) -> Vec<String> {
        self.credentials.secret_values()
    }

    pub fn build_url(&self, path: &str) -> Result<Url, ApiError> {
        if !path.starts_with('/') || path.starts_with("//") {
            return Err(ApiError::from_kind(ApiErrorKind::InvalidRequest));
        }
        let raw = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        let mut url =
            Url::parse(&raw).map_err(|_| ApiError::from_kind(ApiErrorKind::InvalidRequest))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ApiError::from_kind(ApiErrorKind::InvalidRequest));
        }
        url.query_pairs_mut()
            .append_pair(api::SITE_QUERY_PARAM, self.credentials.site_uuid());
        Ok(url)
    }

    pub async fn dispatch(&self, request: RequestDescriptor) -> Result<Value, ApiError> {
        match self.prepare(&request) {
            Ok((url, body)) => self.execute(&request, url, body).await,
            Err(err) => {
                self.logger.warn(
                    "Request rejected before dispatch",
                    Some(&serde_json::json!({
                        "operation": request.operation,
                        "item_index": request.item_index,
                        "path": strip_query(&request.path),
                        "error_type": err.kind.as_str(),
                    })),
                );
                Err(err)
            }
        }
    }

    fn prepare(&self, request: &RequestDescriptor) -> Result<(Url, Option<Vec<u8>>), ApiError> {
        let body = match request.body.as_ref() {
            Some(body) => {
                let bytes = serde_json::to_vec(body)?;
                if bytes.len() > api::MAX_PAYLOAD_BYTES {
                    return Err(ApiError::payload_too_large());
                }
                Some(bytes)
            }
            None => None,
        };
        self.credentials.validate()?;
        if !matches!(
            request.method,
            Method::GET | Method::POST | Method::PUT | Method::DELETE
        ) {
            return Err(ApiError::invalid_request("Unsupported HTTP method"));
        }
        let url = self.build_url(&request.path)?;
        Ok((url, body))
    }

    async fn execute(
        &self,
        request: &RequestDescriptor,
        url: Url,
        body: Option<Vec<u8>>,
    ) -> Result<Value, ApiError> {
        let _slot = self.gate.acquire().await?;
        let request_id = uuid::Uuid::new_v4().to_string();
        let mut attempt = 0usize;

        loop {
            let failure = match self.attempt(request, &url, body.as_deref()).await {
                Ok(value) => {
                    if attempt > 0 {
                        self.logger.debug(
                            "Request succeeded after retry",
                            Some(&serde_json::json!({
                                "request_id": request_id,
                                "operation": request.operation,
                                "attempts": attempt + 1,
                            })),
                        );
                    }
                    return Ok(value);
                }
                Err(failure) => failure,
            };

            let delay = self.retry_delay(&failure, attempt);
            match delay {
                Some(delay_ms) if attempt < self.policy.max_retries => {
                    self.logger.warn(
                        "Retrying request",
                        Some(&serde_json::json!({
                            "request_id": request_id,
                            "operation": request.operation,
                            "item_index": request.item_index,
                            "path": url.path(),
                            "attempt": attempt + 1,
                            "delay_ms": delay_ms,
                            "status": failure_status(&failure),
                        })),
                    );
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    attempt += 1;
                }
                _ => {
                    let err = classify(&failure);
                    let message_len = match &failure {
                        Failure::Status { message_len, .. } => *message_len,
                        Failure::Transport { .. } => None,
                    };
                    self.logger.error(
                        "Bento API request failed",
                        Some(&serde_json::json!({
                            "request_id": request_id,
                            "operation": request.operation,
                            "item_index": request.item_index,
                            "path": url.path(),
                            "status": failure_status(&failure),
                            "error_type": err.kind.as_str(),
                            "attempts": attempt + 1,
                            "has_message": message_len.is_some(),
                            "message_length": message_len.unwrap_or(0),
                        })),
                    );
                    return Err(err);
                }
            }
        }
    }

    fn retry_delay(&self, failure: &Failure, attempt: usize) -> Option<u64> {
        match failure {
            Failure::Status {
                status: 429,
                retry_after,
                ..
            } => Some(self.policy.rate_limit_delay(retry_after.as_deref())),
            Failure::Status { status, .. } if self.policy.retries_status(*status) => {
                Some(self.policy.backoff_delay_ms(attempt))
            }
            Failure::Transport { retryable: true } => Some(self.policy.backoff_delay_ms(attempt)),
            _ => None,
        }
    }

    async fn attempt(
        &self,
        request: &RequestDescriptor,
        url: &Url,
        body: Option<&[u8]>,
    ) -> Result<Value, Failure> {
        let mut req = self
            .client
            .request(request.method.clone(), url.clone())
            .header(ACCEPT, "application/json")
            .header(AUTHORIZATION, self.credentials.authorization_header());
        if let Some(bytes) = body {
            req = req
                .header(CONTENT_TYPE, "application/json")
                .body(bytes.to_vec());
        }

        let response = req.send().await.map_err(|err| Failure::Transport {
            retryable: is_retryable_transport(&err),
        })?;
        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let bytes = response.bytes().await.map_err(|err| Failure::Transport {
            retryable: is_retryable_transport(&err),
        })?;

        if status.is_success() {
            return Ok(parse_body(&bytes));
        }
        Err(Failure::Status {
            status: status.as_u16(),
            retry_after,
            message_len: upstream_message_len(&bytes),
        })
    }
}

fn classify(failure: &Failure) -> ApiError {
    match failure {
        Failure::Status { status, .. } => ApiError::from_status(*status),
        Failure::Transport { retryable: true } => ApiError::network(),
        Failure::Transport { retryable: false } => ApiError::unknown(),
    }
}

fn failure_status(failure: &Failure) -> Option<u16> {
    match failure {
        Failure::Status { status, .. } => Some(*status),
        Failure::Transport { .. } => None,
    }
}

fn parse_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Value::Object(Default::default());
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).to_string()))
}

fn upstream_message_len(bytes: &[u8]) -> Option<usize> {
    if let Ok(Value::Object(map)) = serde_json::from_slice::<Value>(bytes) {
        return ["message", "error", "errors"]
            .iter()
            .find_map(|key| match map.get(*key) {
                Some(Value::String(text)) if !text.trim().is_empty() => Some(text.len()),
                Some(Value::Null) | None => None,
                Some(other) => Some(other.to_string().len()),
            });
    }
    let text = String::from_utf8_lossy(bytes);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.len())
    }
}

fn strip_query(path: &str) -> &str {
    path.split('?').next().unwrap_or(path)
}

fn is_retryable_transport(err: &reqwest::Error) -> bool {
    if err.is_timeout() || err.is_connect() {
        return true;
    }
    let mut source: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
                    | std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::TimedOut
            ) {
                return true;
            }
        }
        let text = cause.to_string().to_lowercase();
        if text.contains("dns error")
            || text.contains("connection reset")
            || text.contains("connection closed before message completed")
        {
            return true;
        }
        source = cause.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::{parse_body, strip_query, upstream_message_len, RetryPolicy};

    #[test]
    fn backoff_stays_within_jitter_window() {
        let policy = RetryPolicy::default();
        for attempt in 1..=4 {
            let floor = 1_000u64 * 2u64.pow(attempt as u32);
            let ceiling = ((floor as f64) * 1.1) as u64;
            for _ in 0..50 {
                let delay = policy.backoff_delay_ms(attempt);
                assert!(delay >= floor.min(30_000), "attempt {attempt}: {delay}");
                assert!(delay <= ceiling.min(30_000), "attempt {attempt}: {delay}");
            }
        }
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_delay_with(5, 0.0), 30_000);
        assert_eq!(policy.backoff_delay_with(20, 0.99), 30_000);
        assert_eq!(policy.backoff_delay_with(0, 0.0), 1_000);
        assert_eq!(policy.backoff_delay_with(2, 1.0), 4_400);
    }

    #[test]
    fn rate_limit_delay_prefers_retry_after() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.rate_limit_delay(Some("2")), 2_000);
        assert_eq!(policy.rate_limit_delay(Some(" 1.5 ")), 1_500);
        assert_eq!(policy.rate_limit_delay(None), 60_000);
        assert_eq!(policy.rate_limit_delay(Some("soon")), 60_000);
        assert_eq!(policy.rate_limit_delay(Some("-3")), 60_000);
    }

    #[test]
    fn rate_limit_delay_is_capped_at_the_default_wait() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.rate_limit_delay(Some("86400")), 60_000);
        assert_eq!(policy.rate_limit_delay(Some("60")), 60_000);
    }

    #[test]
    fn success_bodies_parse_leniently() {
        assert_eq!(parse_body(b""), serde_json::json!({}));
        assert_eq!(parse_body(br#"{"data":{}}"#), serde_json::json!({"data": {}}));
        assert_eq!(parse_body(b"ok"), serde_json::json!("ok"));
    }

    #[test]
    fn upstream_message_is_measured_not_kept() {
        assert_eq!(upstream_message_len(br#"{"error":"bad key"}"#), Some(7));
        assert_eq!(upstream_message_len(br#"{"status":"x"}"#), None);
        assert_eq!(upstream_message_len(b"  "), None);
        assert_eq!(upstream_message_len(b"Server Error"), Some(12));
    }

    #[test]
    fn query_is_dropped_from_logged_paths() {
        assert_eq!(
            strip_query("/api/v1/fetch/subscribers?email=a%40b.com"),
            "/api/v1/fetch/subscribers"
        );
    }
}
