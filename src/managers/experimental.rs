use crate::constants::endpoints;
use crate::constants::limits::{MODERATION_CONTENT_LENGTH, NAME_LENGTH, USER_AGENT_LENGTH};
use crate::errors::ApiError;
use crate::managers::{unknown_operation, OperationHandler};
use crate::services::dispatcher::Dispatcher;
use crate::services::pipeline::{execute, OperationContext, Step};
use crate::services::validation::Validation;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

const EXPERIMENTAL_OPERATIONS: &[&str] = &[
    "validate_email",
    "check_blacklist",
    "moderate_content",
    "guess_gender",
    "geolocate_ip",
];

const VALIDATE_STEPS: &[Step] = &[read_validation, build_validation];
const BLACKLIST_STEPS: &[Step] = &[read_blacklist, build_blacklist];
const MODERATION_STEPS: &[Step] = &[read_moderation, build_moderation];
const GENDER_STEPS: &[Step] = &[read_gender, build_gender];
const GEOLOCATION_STEPS: &[Step] = &[read_geolocation, build_geolocation];

#[derive(Clone)]
pub struct ExperimentalManager {
    validation: Validation,
    dispatcher: Arc<Dispatcher>,
}

impl ExperimentalManager {
    pub fn new(validation: Validation, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            validation,
            dispatcher,
        }
    }
}

#[async_trait]
impl OperationHandler for ExperimentalManager {
    fn operations(&self) -> &'static [&'static str] {
        EXPERIMENTAL_OPERATIONS
    }

    async fn handle(
        &self,
        operation: &str,
        item_index: usize,
        params: Value,
    ) -> Result<Value, ApiError> {
        let steps = match operation {
            "validate_email" => VALIDATE_STEPS,
            "check_blacklist" => BLACKLIST_STEPS,
            "moderate_content" => MODERATION_STEPS,
            "guess_gender" => GENDER_STEPS,
            "geolocate_ip" => GEOLOCATION_STEPS,
            _ => {
                return Err(unknown_operation(
                    "experimental",
                    operation,
                    EXPERIMENTAL_OPERATIONS,
                ))
            }
        };
        let ctx = OperationContext::new(operation, item_index, params);
        Ok(execute(&self.dispatcher, &self.validation, ctx, steps).await)
    }
}

fn post_fields(ctx: &mut OperationContext, path: &str, keys: &[&str]) -> Result<(), ApiError> {
    let mut body = Map::new();
    for key in keys {
        if let Some(value) = ctx.field(key) {
            body.insert(key.to_string(), value.clone());
        }
    }
    ctx.post(path, Value::Object(body))
}

fn read_validation(v: &Validation, ctx: &mut OperationContext) -> Result<(), ApiError> {
    let email = v.ensure_email(ctx.param("email"), "Email")?;
    ctx.keep("email", "email", email);
    if let Some(name) = v.ensure_optional_string(ctx.param("name"), "Name", NAME_LENGTH)? {
        ctx.keep("name", "name", name);
    }
    if let Some(agent) =
        v.ensure_optional_string(ctx.param("userAgent"), "User agent", USER_AGENT_LENGTH)?
    {
        ctx.fields
            .insert("user_agent".to_string(), Value::String(agent));
    }
    if ctx.param("ip").and_then(Value::as_str).map(|s| !s.trim().is_empty()) == Some(true) {
        let ip = v.ensure_ip(ctx.param("ip"), "IP address")?;
        ctx.keep("ip", "ip", ip);
    }
    Ok(())
}

fn build_validation(_: &Validation, ctx: &mut OperationContext) -> Result<(), ApiError> {
    post_fields(
        ctx,
        endpoints::EXPERIMENTAL_VALIDATION,
        &["email", "name", "user_agent", "ip"],
    )
}

fn read_blacklist(v: &Validation, ctx: &mut OperationContext) -> Result<(), ApiError> {
    let present = |key: &str| {
        ctx.param(key)
            .and_then(Value::as_str)
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false)
    };
    match (present("domain"), present("ip")) {
        (true, false) => {
            let domain = v.ensure_domain(ctx.param("domain"), "Domain")?;
            ctx.echo("domain", domain.clone());
            ctx.query_param("domain", domain);
        }
        (false, true) => {
            let ip = v.ensure_ip(ctx.param("ip"), "IP address")?;
            ctx.echo("ip", ip.clone());
            ctx.query_param("ip", ip);
        }
        (true, true) => {
            return Err(ApiError::validation(
                "Provide either a domain or an IP address, not both",
            ))
        }
        (false, false) => {
            return Err(ApiError::validation(
                "Either a domain or an IP address is required",
            ))
        }
    }
    Ok(())
}

fn build_blacklist(_: &Validation, ctx: &mut OperationContext) -> Result<(), ApiError> {
    ctx.get(endpoints::EXPERIMENTAL_BLACKLIST)
}

fn read_moderation(v: &Validation, ctx: &mut OperationContext) -> Result<(), ApiError> {
    let content = v.ensure_string(ctx.param("content"), "Content", MODERATION_CONTENT_LENGTH)?;
    ctx.echo("contentLength", content.chars().count());
    ctx.fields
        .insert("content".to_string(), Value::String(content));
    Ok(())
}

fn build_moderation(_: &Validation, ctx: &mut OperationContext) -> Result<(), ApiError> {
    post_fields(ctx, endpoints::EXPERIMENTAL_MODERATION, &["content"])
}

fn read_gender(v: &Validation, ctx: &mut OperationContext) -> Result<(), ApiError> {
    let name = v.ensure_string(ctx.param("name"), "Name", NAME_LENGTH)?;
    ctx.keep("name", "name", name);
    Ok(())
}

fn build_gender(_: &Validation, ctx: &mut OperationContext) -> Result<(), ApiError> {
    post_fields(ctx, endpoints::EXPERIMENTAL_GENDER, &["name"])
}

fn read_geolocation(v: &Validation, ctx: &mut OperationContext) -> Result<(), ApiError> {
    let ip = v.ensure_ip(ctx.param("ip"), "IP address")?;
    ctx.echo("ip", ip.clone());
    ctx.query_param("ip", ip);
    Ok(())
}

fn build_geolocation(_: &Validation, ctx: &mut OperationContext) -> Result<(), ApiError> {
    ctx.get(endpoints::EXPERIMENTAL_GEOLOCATION)
}
