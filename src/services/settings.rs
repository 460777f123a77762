use crate::constants::{api, concurrency, retry};
use crate::errors::ApiError;
use crate::services::dispatcher::RetryPolicy;
use url::Url;

#[derive(Debug, Clone)]
pub struct Settings {
    pub base_url: String,
    pub timeout_ms: u64,
    pub max_in_flight: usize,
    pub retry: RetryPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            base_url: api::BASE_URL.to_string(),
            timeout_ms: api::TIMEOUT_MS,
            max_in_flight: concurrency::MAX_IN_FLIGHT,
            retry: RetryPolicy::default(),
        }
    }
}

impl Settings {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();
        if let Some(base) = lookup("BENTO_API_BASE_URL").filter(|v| !v.trim().is_empty()) {
            settings.base_url = base.trim().trim_end_matches('/').to_string();
        }
        if let Some(timeout) = read_u64(&lookup, "BENTO_TIMEOUT_MS") {
            settings.timeout_ms = timeout;
        }
        if let Some(limit) = read_u64(&lookup, "BENTO_MAX_IN_FLIGHT") {
            settings.max_in_flight = (limit as usize).min(concurrency::MAX_IN_FLIGHT);
        }
        if let Some(retries) = lookup("BENTO_MAX_RETRIES")
            .and_then(|v| v.trim().parse::<usize>().ok())
        {
            settings.retry.max_retries = retries.min(retry::MAX_RETRIES);
        }
        if let Some(base_delay) = read_u64(&lookup, "BENTO_RETRY_BASE_DELAY_MS") {
            settings.retry.base_delay_ms = base_delay;
        }
        if let Some(delay) = read_u64(&lookup, "BENTO_RATE_LIMIT_DELAY_MS") {
            settings.retry.rate_limit_delay_ms = delay;
        }
        settings
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn parsed_base_url(&self) -> Result<Url, ApiError> {
        let parsed = Url::parse(&self.base_url)
            .map_err(|_| ApiError::invalid_request("Invalid API base URL"))?;
        match parsed.scheme() {
            "http" | "https" => Ok(parsed),
            _ => Err(ApiError::invalid_request(
                "Only http/https API base URLs are supported",
            )),
        }
    }
}

fn read_u64<F>(lookup: &F, key: &str) -> Option<u64>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|v| *v > 0)
}
