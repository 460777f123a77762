use crate::constants::endpoints;
use crate::constants::limits::EVENT_TYPE_LENGTH;
use crate::errors::ApiError;
use crate::managers::{unknown_operation, OperationHandler};
use crate::services::dispatcher::Dispatcher;
use crate::services::pipeline::{execute, OperationContext, Step};
use crate::services::validation::Validation;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

const EVENT_OPERATIONS: &[&str] = &["track_event"];
const TRACK_STEPS: &[Step] = &[read_event, build_event];

#[derive(Clone)]
pub struct EventManager {
    validation: Validation,
    dispatcher: Arc<Dispatcher>,
}

impl EventManager {
    pub fn new(validation: Validation, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            validation,
            dispatcher,
        }
    }
}

#[async_trait]
impl OperationHandler for EventManager {
    fn operations(&self) -> &'static [&'static str] {
        EVENT_OPERATIONS
    }

    async fn handle(
        &self,
        operation: &str,
        item_index: usize,
        params: Value,
    ) -> Result<Value, ApiError> {
        if operation != "track_event" {
            return Err(unknown_operation("event", operation, EVENT_OPERATIONS));
        }
        let ctx = OperationContext::new(operation, item_index, params);
        Ok(execute(&self.dispatcher, &self.validation, ctx, TRACK_STEPS).await)
    }
}

fn read_event(v: &Validation, ctx: &mut OperationContext) -> Result<(), ApiError> {
    let event_type = v.ensure_string(ctx.param("eventType"), "Event type", EVENT_TYPE_LENGTH)?;
    if event_type.chars().any(char::is_whitespace) {
        return Err(ApiError::validation("Event type must not contain whitespace"));
    }
    let email = v.ensure_email(ctx.param("email"), "Email")?;
    ctx.keep("eventType", "type", event_type);
    ctx.keep("email", "email", email);

    let fields = v.ensure_fields(ctx.param("fields"), "Fields")?;
    if !fields.is_empty() {
        ctx.keep("fields", "fields", Value::Object(fields));
    }
    // details are free-form event payloads, e.g. purchase values
    if let Some(details) = v.ensure_optional_object(ctx.param("details"), "Details")? {
        ctx.fields
            .insert("details".to_string(), Value::Object(details));
    }
    Ok(())
}

fn build_event(_: &Validation, ctx: &mut OperationContext) -> Result<(), ApiError> {
    let mut event = Map::new();
    for key in ["type", "email", "fields", "details"] {
        if let Some(value) = ctx.field(key) {
            event.insert(key.to_string(), value.clone());
        }
    }
    let body = serde_json::json!({ "events": [Value::Object(event)] });
    ctx.post(endpoints::BATCH_EVENTS, body)
}

#[cfg(test)]
mod tests {
    use super::TRACK_STEPS;
    use crate::services::pipeline::{run_steps, OperationContext};
    use crate::services::validation::Validation;
    use serde_json::json;

    #[test]
    fn builds_single_event_batch() {
        let mut ctx = OperationContext::new(
            "track_event",
            0,
            json!({
                "eventType": "$purchase",
                "email": "Buyer@Example.com",
                "details": {"unique": {"key": "order-1"}, "value": {"amount": 4200, "currency": "USD"}}
            }),
        );
        run_steps(&Validation::new(), &mut ctx, TRACK_STEPS).expect("steps");
        let request = ctx.request.expect("request");
        assert_eq!(request.path, "/api/v1/batch/events");
        let body = request.body.expect("body");
        assert_eq!(body["events"][0]["type"], "$purchase");
        assert_eq!(body["events"][0]["email"], "buyer@example.com");
        assert_eq!(body["events"][0]["details"]["value"]["amount"], 4200);
        assert!(body["events"][0].get("fields").is_none());
        assert!(ctx.echo.get("details").is_none());
    }

    #[test]
    fn rejects_whitespace_in_event_type() {
        let mut ctx = OperationContext::new(
            "track_event",
            0,
            json!({"eventType": "signed up", "email": "a@b.co"}),
        );
        assert!(run_steps(&Validation::new(), &mut ctx, TRACK_STEPS).is_err());
    }
}
