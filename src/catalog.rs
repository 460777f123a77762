use crate::errors::ApiError;
use jsonschema::JSONSchema;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationDef {
    pub name: String,
    pub resource: String,
    pub description: String,
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

static OPERATION_CATALOG: Lazy<Vec<OperationDef>> = Lazy::new(|| {
    let raw = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/operation_catalog.json"));
    serde_json::from_str(raw).expect("operation_catalog.json must be valid JSON")
});

static OPERATION_MAP: Lazy<HashMap<String, OperationDef>> = Lazy::new(|| {
    OPERATION_CATALOG
        .iter()
        .cloned()
        .map(|op| (op.name.clone(), op))
        .collect()
});

static OPERATION_VALIDATORS: Lazy<HashMap<String, JSONSchema>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for op in OPERATION_CATALOG.iter() {
        if let Ok(schema) = JSONSchema::compile(&op.input_schema) {
            map.insert(op.name.clone(), schema);
        }
    }
    map
});

pub fn operation_catalog() -> &'static Vec<OperationDef> {
    &OPERATION_CATALOG
}

pub fn operation_by_name(name: &str) -> Option<&'static OperationDef> {
    OPERATION_MAP.get(name)
}

pub fn validate_params(operation: &str, params: &Value) -> Result<(), ApiError> {
    let Some(schema) = OPERATION_VALIDATORS.get(operation) else {
        return Ok(());
    };
    if let Err(errors) = schema.validate(params) {
        let rendered: Vec<String> = errors
            .take(10)
            .map(|err| {
                let path = err.instance_path.to_string();
                let path = if path.is_empty() {
                    "(root)".to_string()
                } else {
                    path
                };
                // the error text quotes the offending value, which may be personal data
                format!("{}: does not match the expected type", path)
            })
            .collect();
        return Err(ApiError::invalid_request(format!(
            "Invalid parameters for {}",
            operation
        ))
        .with_details(serde_json::json!({ "problems": rendered })));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{operation_by_name, operation_catalog, validate_params};
    use serde_json::json;
    use std::collections::HashSet;

    #[test]
    fn catalog_names_are_unique_and_schemas_compile() {
        let names: HashSet<&str> = operation_catalog().iter().map(|op| op.name.as_str()).collect();
        assert_eq!(names.len(), operation_catalog().len());
        assert_eq!(names.len(), 16);
        for op in operation_catalog() {
            assert!(jsonschema::JSONSchema::compile(&op.input_schema).is_ok(), "{}", op.name);
        }
    }

    #[test]
    fn params_are_checked_against_the_schema() {
        assert!(validate_params("get_subscriber", &json!({"email": "a@b.co"})).is_ok());
        assert!(validate_params("get_subscriber", &json!({"email": null})).is_ok());
        let err = validate_params("get_subscriber", &json!({"email": ["a@b.co"]})).unwrap_err();
        assert_eq!(err.message, "Invalid parameters for get_subscriber");
        assert!(!err.details.unwrap().to_string().contains("a@b.co"));
        assert!(validate_params("track_event", &json!("not an object")).is_err());
    }

    #[test]
    fn lookup_by_name() {
        assert_eq!(operation_by_name("guess_gender").unwrap().resource, "experimental");
        assert!(operation_by_name("delete_everything").is_none());
    }
}
