use crate::constants::endpoints;
use crate::constants::limits::{
    BROADCAST_NAME_LENGTH, HTML_LENGTH, MAX_BATCH_SIZE_PER_HOUR, NAME_LENGTH, SUBJECT_LENGTH,
};
use crate::errors::ApiError;
use crate::managers::{unknown_operation, OperationHandler};
use crate::services::dispatcher::Dispatcher;
use crate::services::pipeline::{execute, OperationContext, Step};
use crate::services::validation::Validation;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

const BROADCAST_OPERATIONS: &[&str] = &["get_broadcasts", "create_broadcast"];
const CONTENT_TYPES: &[&str] = &["plain", "html", "markdown"];
const DEFAULT_BATCH_SIZE_PER_HOUR: u64 = 1_000;

const LIST_STEPS: &[Step] = &[read_page, build_list];
const CREATE_STEPS: &[Step] = &[read_broadcast, read_audience, build_create];

#[derive(Clone)]
pub struct BroadcastManager {
    validation: Validation,
    dispatcher: Arc<Dispatcher>,
}

impl BroadcastManager {
    pub fn new(validation: Validation, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            validation,
            dispatcher,
        }
    }
}

#[async_trait]
impl OperationHandler for BroadcastManager {
    fn operations(&self) -> &'static [&'static str] {
        BROADCAST_OPERATIONS
    }

    async fn handle(
        &self,
        operation: &str,
        item_index: usize,
        params: Value,
    ) -> Result<Value, ApiError> {
        let steps = match operation {
            "get_broadcasts" => LIST_STEPS,
            "create_broadcast" => CREATE_STEPS,
            _ => {
                return Err(unknown_operation(
                    "broadcast",
                    operation,
                    BROADCAST_OPERATIONS,
                ))
            }
        };
        let ctx = OperationContext::new(operation, item_index, params);
        Ok(execute(&self.dispatcher, &self.validation, ctx, steps).await)
    }
}

fn read_page(v: &Validation, ctx: &mut OperationContext) -> Result<(), ApiError> {
    if let Some(page) = v.ensure_positive_int(ctx.param("page"), "Page", 10_000)? {
        ctx.echo("page", page);
        ctx.query_param("page", page.to_string());
    }
    Ok(())
}

fn build_list(_: &Validation, ctx: &mut OperationContext) -> Result<(), ApiError> {
    ctx.get(endpoints::FETCH_BROADCASTS)
}

fn read_broadcast(v: &Validation, ctx: &mut OperationContext) -> Result<(), ApiError> {
    let name = v.ensure_string(ctx.param("name"), "Broadcast name", BROADCAST_NAME_LENGTH)?;
    let subject = v.ensure_string(ctx.param("subject"), "Subject", SUBJECT_LENGTH)?;
    let content_type = v
        .ensure_optional_string(ctx.param("contentType"), "Content type", 16)?
        .map(|t| t.to_lowercase())
        .unwrap_or_else(|| "plain".to_string());
    if !CONTENT_TYPES.contains(&content_type.as_str()) {
        return Err(ApiError::validation(format!(
            "Content type must be one of: {}",
            CONTENT_TYPES.join(", ")
        )));
    }
    let sanitize = v.ensure_bool(ctx.param("sanitizeHtml"), false);
    // markdown and plain bodies may still carry raw markup
    let content = v.ensure_html(ctx.param("content"), "Content", HTML_LENGTH, sanitize)?;

    let from_email = v.ensure_email(ctx.param("fromEmail"), "Sender email")?;
    let mut from = Map::new();
    from.insert("email".to_string(), Value::String(from_email.clone()));
    if let Some(from_name) =
        v.ensure_optional_string(ctx.param("fromName"), "Sender name", NAME_LENGTH)?
    {
        ctx.echo("fromName", from_name.clone());
        from.insert("name".to_string(), Value::String(from_name));
    }

    ctx.keep("name", "name", name);
    ctx.keep("subject", "subject", subject);
    ctx.keep("contentType", "type", content_type);
    ctx.echo("fromEmail", from_email);
    ctx.fields
        .insert("content".to_string(), Value::String(content));
    ctx.fields.insert("from".to_string(), Value::Object(from));
    Ok(())
}

fn read_audience(v: &Validation, ctx: &mut OperationContext) -> Result<(), ApiError> {
    let inclusive = v.ensure_tags(ctx.param("inclusiveTags"), "Inclusive tags")?;
    let exclusive = v.ensure_tags(ctx.param("exclusiveTags"), "Exclusive tags")?;
    if inclusive.iter().any(|tag| exclusive.contains(tag)) {
        return Err(ApiError::validation(
            "Inclusive tags and exclusive tags must not overlap",
        ));
    }
    if !inclusive.is_empty() {
        ctx.echo("inclusiveTags", inclusive.clone());
        ctx.fields
            .insert("inclusive_tags".to_string(), Value::String(inclusive.join(",")));
    }
    if !exclusive.is_empty() {
        ctx.echo("exclusiveTags", exclusive.clone());
        ctx.fields
            .insert("exclusive_tags".to_string(), Value::String(exclusive.join(",")));
    }
    if let Some(segment) = v.ensure_optional_identifier(ctx.param("segmentId"), "Segment ID")? {
        ctx.keep("segmentId", "segment_id", segment);
    }
    let batch = v
        .ensure_positive_int(
            ctx.param("batchSizePerHour"),
            "Batch size per hour",
            MAX_BATCH_SIZE_PER_HOUR,
        )?
        .unwrap_or(DEFAULT_BATCH_SIZE_PER_HOUR);
    ctx.keep("batchSizePerHour", "batch_size_per_hour", batch);
    Ok(())
}

fn build_create(_: &Validation, ctx: &mut OperationContext) -> Result<(), ApiError> {
    let mut broadcast = Map::new();
    for key in [
        "name",
        "subject",
        "content",
        "type",
        "from",
        "inclusive_tags",
        "exclusive_tags",
        "segment_id",
        "batch_size_per_hour",
    ] {
        if let Some(value) = ctx.field(key) {
            broadcast.insert(key.to_string(), value.clone());
        }
    }
    let body = serde_json::json!({ "broadcasts": [Value::Object(broadcast)] });
    ctx.post(endpoints::BATCH_BROADCASTS, body)
}
