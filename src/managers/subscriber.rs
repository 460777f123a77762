use crate::constants::endpoints;
use crate::constants::limits::NAME_LENGTH;
use crate::errors::ApiError;
use crate::managers::{unknown_operation, OperationHandler};
use crate::services::dispatcher::Dispatcher;
use crate::services::logger::Logger;
use crate::services::pipeline::{execute, OperationContext, Step};
use crate::services::validation::Validation;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

const SUBSCRIBER_OPERATIONS: &[&str] = &[
    "create_subscriber",
    "update_subscriber",
    "get_subscriber",
    "subscriber_command",
];

const COMMANDS: &[&str] = &[
    "add_tag",
    "add_tag_via_event",
    "remove_tag",
    "add_field",
    "remove_field",
    "subscribe",
    "unsubscribe",
    "change_email",
];

const CREATE_STEPS: &[Step] = &[read_profile, build_import];
const UPDATE_STEPS: &[Step] = &[read_profile, read_update, build_import];
const LOOKUP_STEPS: &[Step] = &[read_lookup, build_lookup];
const COMMAND_STEPS: &[Step] = &[read_command, build_command];

#[derive(Clone)]
pub struct SubscriberManager {
    logger: Logger,
    validation: Validation,
    dispatcher: Arc<Dispatcher>,
}

impl SubscriberManager {
    pub fn new(logger: Logger, validation: Validation, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            logger: logger.child("subscriber"),
            validation,
            dispatcher,
        }
    }

    pub async fn handle_action(
        &self,
        operation: &str,
        item_index: usize,
        params: Value,
    ) -> Result<Value, ApiError> {
        let steps: &[Step] = match operation {
            "create_subscriber" => CREATE_STEPS,
            "update_subscriber" => UPDATE_STEPS,
            "get_subscriber" => LOOKUP_STEPS,
            "subscriber_command" => COMMAND_STEPS,
            _ => {
                return Err(unknown_operation(
                    "subscriber",
                    operation,
                    SUBSCRIBER_OPERATIONS,
                ))
            }
        };
        self.logger.debug(
            "Running subscriber operation",
            Some(&serde_json::json!({"operation": operation, "item_index": item_index})),
        );
        let ctx = OperationContext::new(operation, item_index, params);
        Ok(execute(&self.dispatcher, &self.validation, ctx, steps).await)
    }
}

#[async_trait]
impl OperationHandler for SubscriberManager {
    fn operations(&self) -> &'static [&'static str] {
        SUBSCRIBER_OPERATIONS
    }

    async fn handle(
        &self,
        operation: &str,
        item_index: usize,
        params: Value,
    ) -> Result<Value, ApiError> {
        self.handle_action(operation, item_index, params).await
    }
}

fn read_profile(v: &Validation, ctx: &mut OperationContext) -> Result<(), ApiError> {
    let email = v.ensure_email(ctx.param("email"), "Email")?;
    ctx.keep("email", "email", email);
    if let Some(first) = v.ensure_optional_string(ctx.param("firstName"), "First name", NAME_LENGTH)? {
        ctx.keep("firstName", "first_name", first);
    }
    if let Some(last) = v.ensure_optional_string(ctx.param("lastName"), "Last name", NAME_LENGTH)? {
        ctx.keep("lastName", "last_name", last);
    }
    let tags = v.ensure_tags(ctx.param("tags"), "Tags")?;
    if !tags.is_empty() {
        ctx.echo("tags", tags.clone());
        ctx.fields.insert("tags".to_string(), Value::String(tags.join(",")));
    }
    let custom = v.ensure_fields(ctx.param("fields"), "Fields")?;
    if !custom.is_empty() {
        ctx.echo("fields", Value::Object(custom.clone()));
        ctx.fields
            .insert("custom_fields".to_string(), Value::Object(custom));
    }
    Ok(())
}

fn read_update(v: &Validation, ctx: &mut OperationContext) -> Result<(), ApiError> {
    let remove = v.ensure_tags(ctx.param("removeTags"), "Tags to remove")?;
    if !remove.is_empty() {
        ctx.echo("removeTags", remove.clone());
        ctx.fields
            .insert("remove_tags".to_string(), Value::String(remove.join(",")));
    }
    // email alone would be a no-op upsert
    if ctx.fields.len() <= 1 {
        return Err(ApiError::validation(
            "Provide at least one of first name, last name, tags, tags to remove or fields",
        ));
    }
    Ok(())
}

fn build_import(_: &Validation, ctx: &mut OperationContext) -> Result<(), ApiError> {
    let mut subscriber = Map::new();
    if let Some(Value::Object(custom)) = ctx.fields.get("custom_fields") {
        for (key, value) in custom {
            subscriber.insert(key.clone(), value.clone());
        }
    }
    for (key, value) in ctx.fields.iter() {
        if key != "custom_fields" {
            subscriber.insert(key.clone(), value.clone());
        }
    }
    let body = serde_json::json!({ "subscribers": [Value::Object(subscriber)] });
    ctx.post(endpoints::BATCH_SUBSCRIBERS, body)
}

fn read_lookup(v: &Validation, ctx: &mut OperationContext) -> Result<(), ApiError> {
    let email = v.ensure_optional_email(ctx.param("email"), "Email")?;
    let uuid = v.ensure_optional_identifier(ctx.param("uuid"), "Subscriber UUID")?;
    match (email, uuid) {
        (Some(email), None) => {
            ctx.echo("email", email.clone());
            ctx.query_param("email", email);
        }
        (None, Some(uuid)) => {
            ctx.echo("uuid", uuid.clone());
            ctx.query_param("uuid", uuid);
        }
        (Some(_), Some(_)) => {
            return Err(ApiError::validation(
                "Provide either an email or a subscriber UUID, not both",
            ))
        }
        (None, None) => {
            return Err(ApiError::validation(
                "Either an email or a subscriber UUID is required",
            ))
        }
    }
    Ok(())
}

fn build_lookup(_: &Validation, ctx: &mut OperationContext) -> Result<(), ApiError> {
    ctx.get(endpoints::FETCH_SUBSCRIBERS)
}

fn read_command(v: &Validation, ctx: &mut OperationContext) -> Result<(), ApiError> {
    let command = v
        .ensure_string(ctx.param("command"), "Command", 32)?
        .to_lowercase();
    if !COMMANDS.contains(&command.as_str()) {
        return Err(ApiError::validation(format!(
            "Command must be one of: {}",
            COMMANDS.join(", ")
        )));
    }
    let email = v.ensure_email(ctx.param("email"), "Email")?;
    ctx.keep("command", "command", command.clone());
    ctx.keep("email", "email", email);

    let query = match command.as_str() {
        "subscribe" | "unsubscribe" => None,
        "change_email" => Some(Value::String(
            v.ensure_email(ctx.param("newEmail"), "New email")?,
        )),
        "add_field" => {
            let key = v.ensure_string(ctx.param("fieldKey"), "Field key", 100)?;
            v.ensure_field_key(&key, "Field")?;
            let value = match ctx.param("fieldValue") {
                Some(Value::Null) | None => {
                    return Err(ApiError::validation("Field value is required"))
                }
                Some(value) => value.clone(),
            };
            let mut single = Map::new();
            single.insert(key.clone(), value.clone());
            v.ensure_fields(Some(&Value::Object(single)), "Field")?;
            Some(serde_json::json!({ "key": key, "value": value }))
        }
        "remove_field" => {
            let key = v.ensure_string(ctx.param("fieldKey"), "Field key", 100)?;
            v.ensure_field_key(&key, "Field")?;
            Some(Value::String(key))
        }
        _ => {
            let tags = v.ensure_tags(ctx.param("tag"), "Tag")?;
            match tags.as_slice() {
                [tag] => Some(Value::String(tag.clone())),
                [] => return Err(ApiError::validation("Tag is required")),
                _ => return Err(ApiError::validation("Provide a single tag per command")),
            }
        }
    };
    if let Some(query) = query {
        if command != "change_email" {
            ctx.echo("query", query.clone());
        }
        ctx.fields.insert("query".to_string(), query);
    }
    Ok(())
}

fn build_command(_: &Validation, ctx: &mut OperationContext) -> Result<(), ApiError> {
    let mut entry = Map::new();
    for key in ["command", "email", "query"] {
        if let Some(value) = ctx.field(key) {
            entry.insert(key.to_string(), value.clone());
        }
    }
    let body = serde_json::json!({ "command": [Value::Object(entry)] });
    ctx.post(endpoints::FETCH_COMMANDS, body)
}
