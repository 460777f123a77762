use serde::Serialize;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ApiErrorKind {
    AuthenticationFailed,
    InvalidCredentials,
    InvalidRequest,
    NotFound,
    RateLimited,
    ServerError,
    NetworkError,
    ValidationError,
    PayloadTooLarge,
    UnknownError,
}

impl ApiErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ApiErrorKind::AuthenticationFailed => "AuthenticationFailed",
            ApiErrorKind::InvalidCredentials => "InvalidCredentials",
            ApiErrorKind::InvalidRequest => "InvalidRequest",
            ApiErrorKind::NotFound => "NotFound",
            ApiErrorKind::RateLimited => "RateLimited",
            ApiErrorKind::ServerError => "ServerError",
            ApiErrorKind::NetworkError => "NetworkError",
            ApiErrorKind::ValidationError => "ValidationError",
            ApiErrorKind::PayloadTooLarge => "PayloadTooLarge",
            ApiErrorKind::UnknownError => "UnknownError",
        }
    }

    pub fn safe_message(self) -> &'static str {
        match self {
            ApiErrorKind::AuthenticationFailed => {
                "Authentication failed. Check your publishable key, secret key and site UUID."
            }
            ApiErrorKind::InvalidCredentials => {
                "Invalid credentials: publishable key, secret key and site UUID are required."
            }
            ApiErrorKind::InvalidRequest => "Invalid request. Check the provided parameters.",
            ApiErrorKind::NotFound => "The requested resource was not found.",
            ApiErrorKind::RateLimited => "Rate limit exceeded. Please try again later.",
            ApiErrorKind::ServerError => "The Bento API is temporarily unavailable.",
            ApiErrorKind::NetworkError => "Network error: unable to reach the Bento API.",
            ApiErrorKind::ValidationError => "Input validation failed.",
            ApiErrorKind::PayloadTooLarge => "Request payload exceeds the 1 MiB limit.",
            ApiErrorKind::UnknownError => "An unexpected error occurred.",
        }
    }

    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 422 => ApiErrorKind::InvalidRequest,
            401 | 403 => ApiErrorKind::AuthenticationFailed,
            404 => ApiErrorKind::NotFound,
            413 => ApiErrorKind::PayloadTooLarge,
            429 => ApiErrorKind::RateLimited,
            500..=599 => ApiErrorKind::ServerError,
            _ => ApiErrorKind::UnknownError,
        }
    }
}

impl fmt::Display for ApiErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ApiErrorKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ApiError {
    pub fn new(kind: ApiErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            details: None,
        }
    }

    pub fn from_kind(kind: ApiErrorKind) -> Self {
        Self::new(kind, kind.safe_message())
    }

    pub fn from_status(status: u16) -> Self {
        let mut err = Self::from_kind(ApiErrorKind::from_status(status));
        err.status = Some(status);
        err
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::ValidationError, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ApiErrorKind::InvalidRequest, message)
    }

    pub fn invalid_credentials() -> Self {
        Self::from_kind(ApiErrorKind::InvalidCredentials)
    }

    pub fn payload_too_large() -> Self {
        Self::from_kind(ApiErrorKind::PayloadTooLarge)
    }

    pub fn network() -> Self {
        Self::from_kind(ApiErrorKind::NetworkError)
    }

    pub fn unknown() -> Self {
        Self::from_kind(ApiErrorKind::UnknownError)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(_: serde_json::Error) -> Self {
        ApiError::invalid_request("Request body could not be serialized")
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::new(ApiErrorKind::UnknownError, format!("I/O failure: {}", err.kind()))
    }
}

#[cfg(test)]
mod tests {
    use super::{ApiError, ApiErrorKind};

    #[test]
    fn status_codes_map_to_fixed_kinds() {
        assert_eq!(ApiErrorKind::from_status(401), ApiErrorKind::AuthenticationFailed);
        assert_eq!(ApiErrorKind::from_status(403), ApiErrorKind::AuthenticationFailed);
        assert_eq!(ApiErrorKind::from_status(400), ApiErrorKind::InvalidRequest);
        assert_eq!(ApiErrorKind::from_status(404), ApiErrorKind::NotFound);
        assert_eq!(ApiErrorKind::from_status(429), ApiErrorKind::RateLimited);
        assert_eq!(ApiErrorKind::from_status(503), ApiErrorKind::ServerError);
        assert_eq!(ApiErrorKind::from_status(418), ApiErrorKind::UnknownError);
    }

    #[test]
    fn status_errors_use_the_safe_message() {
        let err = ApiError::from_status(502);
        assert_eq!(err.kind, ApiErrorKind::ServerError);
        assert_eq!(err.status, Some(502));
        assert_eq!(err.to_string(), ApiErrorKind::ServerError.safe_message());
    }
}
