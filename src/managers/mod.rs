pub mod broadcast;
pub mod email;
pub mod event;
pub mod experimental;
pub mod stats;
pub mod subscriber;

use crate::errors::ApiError;
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait OperationHandler: Send + Sync {
    fn operations(&self) -> &'static [&'static str];

    async fn handle(
        &self,
        operation: &str,
        item_index: usize,
        params: Value,
    ) -> Result<Value, ApiError>;
}

pub(crate) fn unknown_operation(resource: &str, operation: &str, known: &[&str]) -> ApiError {
    ApiError::invalid_request(format!(
        "Unknown {} operation: {}. Use one of: {}.",
        resource,
        operation,
        known.join(", ")
    ))
    .with_details(serde_json::json!({ "known_operations": known }))
}
