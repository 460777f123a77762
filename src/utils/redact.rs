use crate::constants::redaction::{EMAIL_MARKER, SECRET_MARKER};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;

static EMAIL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)[a-z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-z0-9](?:[a-z0-9-]*[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]*[a-z0-9])?)+")
        .expect("email redaction regex")
});

static SENSITIVE_KEYS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "publishablekey",
        "publishable_key",
        "secretkey",
        "secret_key",
        "siteuuid",
        "site_uuid",
        "authorization",
        "password",
        "token",
        "api_key",
    ]
    .into_iter()
    .collect()
});

fn normalize_key(key: &str) -> String {
    key.trim().to_lowercase()
}

pub fn is_sensitive_key(key: &str) -> bool {
    let normalized = normalize_key(key);
    if normalized.is_empty() {
        return false;
    }
    SENSITIVE_KEYS.contains(normalized.as_str()) || normalized.contains("secret")
}

pub fn redact_emails(text: &str) -> String {
    EMAIL_PATTERN.replace_all(text, EMAIL_MARKER).into_owned()
}

pub fn redact_text(value: &str, extra_secrets: Option<&[String]>) -> String {
    let mut out = redact_emails(value);
    if let Some(values) = extra_secrets {
        for raw in values {
            let needle = raw.trim();
            if needle.len() < 4 {
                continue;
            }
            out = out.replace(needle, SECRET_MARKER);
        }
    }
    out
}

// Used for echoed inputs on failure envelopes: every email-looking string is
// masked, and credential-like keys are masked wholesale.
pub fn redact_object(value: &Value, extra_secrets: Option<&[String]>) -> Value {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) => value.clone(),
        Value::String(text) => Value::String(redact_text(text, extra_secrets)),
        Value::Array(items) => Value::Array(
            items
                .iter()
                .map(|item| redact_object(item, extra_secrets))
                .collect(),
        ),
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (key, entry) in map.iter() {
                if is_sensitive_key(key) {
                    out.insert(key.clone(), Value::String(SECRET_MARKER.to_string()));
                    continue;
                }
                out.insert(key.clone(), redact_object(entry, extra_secrets));
            }
            Value::Object(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{redact_emails, redact_object, redact_text};
    use serde_json::json;

    #[test]
    fn emails_are_masked_anywhere_in_text() {
        assert_eq!(
            redact_emails("contact Jane.Doe+x@Example.co.uk today"),
            "contact [REDACTED_EMAIL] today"
        );
        assert_eq!(redact_emails("no address here"), "no address here");
    }

    #[test]
    fn nested_echo_is_redacted() {
        let input = json!({
            "email": "user@example.com",
            "subscribers": [{"email": "a@b.io", "first_name": "Ada"}],
            "secretKey": "sk_live_123",
            "count": 3
        });
        let out = redact_object(&input, None);
        assert_eq!(out["email"], "[REDACTED_EMAIL]");
        assert_eq!(out["subscribers"][0]["email"], "[REDACTED_EMAIL]");
        assert_eq!(out["subscribers"][0]["first_name"], "Ada");
        assert_eq!(out["secretKey"], "[REDACTED]");
        assert_eq!(out["count"], 3);
    }

    #[test]
    fn known_secret_values_are_masked() {
        let secrets = vec!["pk_live_abcdef".to_string(), "ab".to_string()];
        assert_eq!(
            redact_text("key=pk_live_abcdef ab", Some(&secrets)),
            "key=[REDACTED] ab"
        );
    }
}
