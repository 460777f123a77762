use crate::constants::redaction::SECRET_MARKER;
use crate::errors::ApiError;
use base64::Engine;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

#[derive(Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    #[serde(default)]
    pub publishable_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default)]
    pub site_uuid: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("publishable_key", &SECRET_MARKER)
            .field("secret_key", &SECRET_MARKER)
            .field("site_uuid", &SECRET_MARKER)
            .finish()
    }
}

impl Credentials {
    pub fn new(
        publishable_key: impl Into<String>,
        secret_key: impl Into<String>,
        site_uuid: impl Into<String>,
    ) -> Self {
        Self {
            publishable_key: publishable_key.into(),
            secret_key: secret_key.into(),
            site_uuid: site_uuid.into(),
        }
    }

    pub fn from_env() -> Self {
        let read = |key: &str| std::env::var(key).unwrap_or_default();
        Self::new(
            read("BENTO_PUBLISHABLE_KEY"),
            read("BENTO_SECRET_KEY"),
            read("BENTO_SITE_UUID"),
        )
    }

    pub fn from_file(path: &Path) -> Result<Self, ApiError> {
        let raw = std::fs::read_to_string(path).map_err(|_| ApiError::invalid_credentials())?;
        serde_json::from_str(&raw).map_err(|_| ApiError::invalid_credentials())
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        let fields = [&self.publishable_key, &self.secret_key, &self.site_uuid];
        if fields.iter().any(|value| value.trim().is_empty()) {
            return Err(ApiError::invalid_credentials());
        }
        Ok(())
    }

    pub fn authorization_header(&self) -> String {
        let encoded = base64::engine::general_purpose::STANDARD.encode(format!(
            "{}:{}",
            self.publishable_key.trim(),
            self.secret_key.trim()
        ));
        format!("Basic {}", encoded)
    }

    pub fn site_uuid(&self) -> &str {
        self.site_uuid.trim()
    }

    // Stable, non-reversible key for scoping concurrency per site identity.
    pub fn instance_key(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.site_uuid.trim().as_bytes());
        hasher.update(b":");
        hasher.update(self.publishable_key.trim().as_bytes());
        let digest = hex::encode(hasher.finalize());
        format!("site-{}", &digest[..16])
    }

    pub fn secret_values(&self) -> Vec<String> {
        [&self.publishable_key, &self.secret_key, &self.site_uuid]
            .iter()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::Credentials;
    use crate::errors::ApiErrorKind;

    #[test]
    fn blank_fields_are_rejected() {
        let cases = [
            Credentials::new("", "secret", "site"),
            Credentials::new("pub", "   ", "site"),
            Credentials::new("pub", "secret", "\t"),
            Credentials::default(),
        ];
        for creds in cases {
            let err = creds.validate().expect_err("blank credentials must fail");
            assert_eq!(err.kind, ApiErrorKind::InvalidCredentials);
        }
        assert!(Credentials::new("pub", "secret", "site").validate().is_ok());
    }

    #[test]
    fn basic_header_encodes_key_pair() {
        let creds = Credentials::new("pub", "secret", "site");
        assert_eq!(creds.authorization_header(), "Basic cHViOnNlY3JldA==");
    }

    #[test]
    fn debug_output_hides_values() {
        let creds = Credentials::new("pk_live_123", "sk_live_456", "site-789");
        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("pk_live_123"));
        assert!(!rendered.contains("sk_live_456"));
        assert!(!rendered.contains("site-789"));
    }

    #[test]
    fn instance_key_is_stable_and_opaque() {
        let a = Credentials::new("pub", "secret", "site");
        let b = Credentials::new(" pub ", "other-secret", "site");
        assert_eq!(a.instance_key(), b.instance_key());
        assert!(!a.instance_key().contains("pub"));
        assert_ne!(
            a.instance_key(),
            Credentials::new("pub", "secret", "site-2").instance_key()
        );
    }

    #[test]
    fn deserializes_camel_case_record() {
        let creds: Credentials = serde_json::from_value(serde_json::json!({
            "publishableKey": "pub",
            "secretKey": "secret",
            "siteUuid": "site"
        }))
        .expect("credentials");
        assert!(creds.validate().is_ok());
        assert_eq!(creds.site_uuid(), "site");
    }
}
