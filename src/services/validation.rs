use crate::constants::limits::{
    DOMAIN_LENGTH, EMAIL_LABEL_LENGTH, FIELD_KEY_LENGTH, FIELD_VALUE_LENGTH, IDENTIFIER_LENGTH,
    IP_LENGTH, MAX_FIELDS, MAX_TAGS, TAG_LENGTH,
};
use crate::errors::ApiError;
use crate::utils::email::{check_email, sanitize_email};
use crate::utils::html::{sanitize_html, validate_html_structure};
use serde_json::{Map, Value};
use std::net::IpAddr;

#[derive(Clone)]
pub struct Validation;

impl Validation {
    pub fn new() -> Self {
        Self
    }

    pub fn ensure_string(
        &self,
        value: Option<&Value>,
        label: &str,
        max_length: usize,
    ) -> Result<String, ApiError> {
        let text = value
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ApiError::validation(format!("{} is required", label)))?;
        self.ensure_max_length(text, label, max_length)?;
        Ok(text.to_string())
    }

    pub fn ensure_optional_string(
        &self,
        value: Option<&Value>,
        label: &str,
        max_length: usize,
    ) -> Result<Option<String>, ApiError> {
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(_)) => self.ensure_string(value, label, max_length).map(Some),
            Some(_) => Err(ApiError::validation(format!("{} must be a string", label))),
        }
    }

    pub fn ensure_max_length(&self, text: &str, label: &str, max: usize) -> Result<(), ApiError> {
        if text.chars().count() > max {
            return Err(ApiError::validation(format!(
                "{} must be at most {} characters",
                label, max
            )));
        }
        Ok(())
    }

    pub fn ensure_email(&self, value: Option<&Value>, label: &str) -> Result<String, ApiError> {
        let raw = value
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| ApiError::validation(format!("{} is required", label)))?;
        let email = sanitize_email(raw);
        check_email(&email)
            .map_err(|issue| ApiError::validation(format!("{} {}", label, issue.describe())))?;
        Ok(email)
    }

    pub fn ensure_optional_email(
        &self,
        value: Option<&Value>,
        label: &str,
    ) -> Result<Option<String>, ApiError> {
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(_) => self.ensure_email(value, label).map(Some),
        }
    }

    // Unsafe markup is rejected unless the caller opted into sanitizing, in
    // which case the cleaned markup must pass the same check.
    pub fn ensure_html(
        &self,
        value: Option<&Value>,
        label: &str,
        max_length: usize,
        sanitize: bool,
    ) -> Result<String, ApiError> {
        let raw = self.ensure_string(value, label, max_length)?;
        let html = if sanitize { sanitize_html(&raw) } else { raw };
        let report = validate_html_structure(&html);
        if !report.valid {
            return Err(ApiError::validation(format!(
                "{} contains unsafe HTML: {}",
                label,
                report.issues.join("; ")
            ))
            .with_details(serde_json::json!({ "issues": report.issues })));
        }
        if html.trim().is_empty() {
            return Err(ApiError::validation(format!("{} is required", label)));
        }
        Ok(html)
    }

    pub fn ensure_tags(&self, value: Option<&Value>, label: &str) -> Result<Vec<String>, ApiError> {
        let raw: Vec<String> = match value {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::String(s)) => s.split(',').map(|t| t.to_string()).collect(),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str().map(|s| s.to_string()).ok_or_else(|| {
                        ApiError::validation(format!("{} must contain only strings", label))
                    })
                })
                .collect::<Result<_, _>>()?,
            Some(_) => {
                return Err(ApiError::validation(format!(
                    "{} must be a comma-separated string or a list",
                    label
                )))
            }
        };
        let mut tags: Vec<String> = Vec::new();
        for tag in raw {
            let tag = tag.trim();
            if tag.is_empty() || tags.iter().any(|t| t == tag) {
                continue;
            }
            self.ensure_max_length(tag, label, TAG_LENGTH)?;
            tags.push(tag.to_string());
        }
        if tags.len() > MAX_TAGS {
            return Err(ApiError::validation(format!(
                "{} must contain at most {} entries",
                label, MAX_TAGS
            )));
        }
        Ok(tags)
    }

    pub fn ensure_fields(
        &self,
        value: Option<&Value>,
        label: &str,
    ) -> Result<Map<String, Value>, ApiError> {
        let Some(obj) = self.ensure_optional_object(value, label)? else {
            return Ok(Map::new());
        };
        if obj.len() > MAX_FIELDS {
            return Err(ApiError::validation(format!(
                "{} must contain at most {} entries",
                label, MAX_FIELDS
            )));
        }
        let mut out = Map::new();
        for (key, entry) in obj {
            let key = key.trim().to_string();
            self.ensure_field_key(&key, label)?;
            let rendered_len = match &entry {
                Value::String(s) => s.chars().count(),
                Value::Array(_) | Value::Object(_) => entry.to_string().chars().count(),
                _ => 0,
            };
            if rendered_len > FIELD_VALUE_LENGTH {
                return Err(ApiError::validation(format!(
                    "{} value for '{}' must be at most {} characters",
                    label, key, FIELD_VALUE_LENGTH
                )));
            }
            out.insert(key, entry);
        }
        Ok(out)
    }

    pub fn ensure_field_key(&self, key: &str, label: &str) -> Result<(), ApiError> {
        let mut chars = key.chars();
        let valid_start = chars
            .next()
            .map(|c| c.is_ascii_alphabetic() || c == '_')
            .unwrap_or(false);
        if !valid_start
            || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
            || key.len() > FIELD_KEY_LENGTH
        {
            return Err(ApiError::validation(format!(
                "{} keys must be letters, digits or underscores (max {} characters)",
                label, FIELD_KEY_LENGTH
            )));
        }
        Ok(())
    }

    pub fn ensure_identifier(&self, value: Option<&Value>, label: &str) -> Result<String, ApiError> {
        let text = match value {
            Some(Value::Number(n)) => n.to_string(),
            other => self.ensure_string(other, label, IDENTIFIER_LENGTH)?,
        };
        if text.chars().any(|c| c.is_control()) {
            return Err(ApiError::validation(format!(
                "{} must not contain control characters",
                label
            )));
        }
        Ok(text)
    }

    pub fn ensure_optional_identifier(
        &self,
        value: Option<&Value>,
        label: &str,
    ) -> Result<Option<String>, ApiError> {
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(_) => self.ensure_identifier(value, label).map(Some),
        }
    }

    pub fn ensure_ip(&self, value: Option<&Value>, label: &str) -> Result<String, ApiError> {
        let text = self.ensure_string(value, label, IP_LENGTH)?;
        text.parse::<IpAddr>()
            .map_err(|_| ApiError::validation(format!("{} must be a valid IP address", label)))?;
        Ok(text)
    }

    pub fn ensure_domain(&self, value: Option<&Value>, label: &str) -> Result<String, ApiError> {
        let domain = self
            .ensure_string(value, label, DOMAIN_LENGTH)?
            .trim_end_matches('.')
            .to_lowercase();
        let labels: Vec<&str> = domain.split('.').collect();
        let valid = labels.len() >= 2
            && labels.iter().all(|l| {
                !l.is_empty()
                    && l.len() <= EMAIL_LABEL_LENGTH
                    && !l.starts_with('-')
                    && !l.ends_with('-')
                    && l.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
            });
        if !valid {
            return Err(ApiError::validation(format!(
                "{} must be a valid domain name",
                label
            )));
        }
        Ok(domain)
    }

    pub fn ensure_bool(&self, value: Option<&Value>, fallback: bool) -> bool {
        match value {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => match s.trim().to_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                _ => fallback,
            },
            _ => fallback,
        }
    }

    pub fn ensure_positive_int(
        &self,
        value: Option<&Value>,
        label: &str,
        max: u64,
    ) -> Result<Option<u64>, ApiError> {
        let numeric = match value {
            None | Some(Value::Null) => return Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => return Ok(None),
            Some(v) => v
                .as_u64()
                .or_else(|| v.as_str().and_then(|s| s.trim().parse::<u64>().ok())),
        };
        match numeric {
            Some(n) if (1..=max).contains(&n) => Ok(Some(n)),
            _ => Err(ApiError::validation(format!(
                "{} must be an integer between 1 and {}",
                label, max
            ))),
        }
    }

    pub fn ensure_object(&self, value: &Value, label: &str) -> Result<Map<String, Value>, ApiError> {
        value
            .as_object()
            .cloned()
            .ok_or_else(|| ApiError::validation(format!("{} must be an object", label)))
    }

    // Objects may also arrive as JSON text from host form fields.
    pub fn ensure_optional_object(
        &self,
        value: Option<&Value>,
        label: &str,
    ) -> Result<Option<Map<String, Value>>, ApiError> {
        match value {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => {
                let parsed: Value = serde_json::from_str(s).map_err(|_| {
                    ApiError::validation(format!("{} must be a JSON object", label))
                })?;
                self.ensure_object(&parsed, label).map(Some)
            }
            Some(val) => self.ensure_object(val, label).map(Some),
        }
    }
}

impl Default for Validation {
    fn default() -> Self {
        Self::new()
    }
}
