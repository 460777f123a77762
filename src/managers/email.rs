use crate::constants::endpoints;
use crate::constants::limits::{HTML_LENGTH, SUBJECT_LENGTH};
use crate::errors::ApiError;
use crate::managers::{unknown_operation, OperationHandler};
use crate::services::dispatcher::Dispatcher;
use crate::services::logger::Logger;
use crate::services::pipeline::{execute, OperationContext, Step};
use crate::services::validation::Validation;
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::Arc;

const EMAIL_OPERATIONS: &[&str] = &["send_email"];
const SEND_STEPS: &[Step] = &[read_envelope, read_content, build_send];

#[derive(Clone)]
pub struct EmailManager {
    logger: Logger,
    validation: Validation,
    dispatcher: Arc<Dispatcher>,
}

impl EmailManager {
    pub fn new(logger: Logger, validation: Validation, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            logger: logger.child("email"),
            validation,
            dispatcher,
        }
    }
}

#[async_trait]
impl OperationHandler for EmailManager {
    fn operations(&self) -> &'static [&'static str] {
        EMAIL_OPERATIONS
    }

    async fn handle(
        &self,
        operation: &str,
        item_index: usize,
        params: Value,
    ) -> Result<Value, ApiError> {
        if operation != "send_email" {
            return Err(unknown_operation("email", operation, EMAIL_OPERATIONS));
        }
        let ctx = OperationContext::new(operation, item_index, params);
        let envelope = execute(&self.dispatcher, &self.validation, ctx, SEND_STEPS).await;
        if envelope.get("success").and_then(Value::as_bool) == Some(true) {
            self.logger
                .info("Email queued", Some(&serde_json::json!({"item_index": item_index})));
        }
        Ok(envelope)
    }
}

fn read_envelope(v: &Validation, ctx: &mut OperationContext) -> Result<(), ApiError> {
    let to = v.ensure_email(ctx.param("to"), "Recipient email")?;
    let from = v.ensure_email(ctx.param("from"), "Sender email")?;
    let subject = v.ensure_string(ctx.param("subject"), "Subject", SUBJECT_LENGTH)?;
    if subject.contains(['\r', '\n']) {
        return Err(ApiError::validation("Subject must be a single line"));
    }
    let transactional = v.ensure_bool(ctx.param("transactional"), true);
    ctx.keep("to", "to", to);
    ctx.keep("from", "from", from);
    ctx.keep("subject", "subject", subject);
    ctx.keep("transactional", "transactional", transactional);
    Ok(())
}

fn read_content(v: &Validation, ctx: &mut OperationContext) -> Result<(), ApiError> {
    let sanitize = v.ensure_bool(ctx.param("sanitizeHtml"), false);
    let html = v.ensure_html(ctx.param("htmlBody"), "HTML body", HTML_LENGTH, sanitize)?;
    ctx.fields
        .insert("html_body".to_string(), Value::String(html));
    if let Some(personalizations) =
        v.ensure_optional_object(ctx.param("personalizations"), "Personalizations")?
    {
        ctx.fields
            .insert("personalizations".to_string(), Value::Object(personalizations));
    }
    Ok(())
}

fn build_send(_: &Validation, ctx: &mut OperationContext) -> Result<(), ApiError> {
    let mut email = Map::new();
    for key in [
        "to",
        "from",
        "subject",
        "html_body",
        "transactional",
        "personalizations",
    ] {
        if let Some(value) = ctx.field(key) {
            email.insert(key.to_string(), value.clone());
        }
    }
    let body = serde_json::json!({ "emails": [Value::Object(email)] });
    ctx.post(endpoints::BATCH_EMAILS, body)
}
