use crate::errors::ApiError;
use crate::utils::redact::redact_object;
use serde_json::{Map, Value};

pub fn success_envelope(echo: &Map<String, Value>, response: Value) -> Value {
    let mut out = Map::new();
    out.insert("success".to_string(), Value::Bool(true));
    out.insert("apiResponse".to_string(), response);
    for (key, value) in echo {
        out.entry(key.clone()).or_insert_with(|| value.clone());
    }
    Value::Object(out)
}

pub fn failure_envelope(echo: &Map<String, Value>, err: &ApiError, secrets: &[String]) -> Value {
    let mut out = Map::new();
    out.insert("success".to_string(), Value::Bool(false));
    out.insert("error".to_string(), Value::String(err.message.clone()));
    out.insert(
        "errorType".to_string(),
        Value::String(err.kind.as_str().to_string()),
    );
    if let Value::Object(redacted) = redact_object(&Value::Object(echo.clone()), Some(secrets)) {
        for (key, value) in redacted {
            out.entry(key).or_insert(value);
        }
    }
    if let Some(details) = err.details.as_ref() {
        out.insert("details".to_string(), redact_object(details, Some(secrets)));
    }
    Value::Object(out)
}

// Record emitted for an uncaught error when the host runs with
// continue-on-failure enabled.
pub fn error_record(err: &ApiError) -> Value {
    serde_json::json!({ "error": err.message })
}
