use crate::errors::ApiError;
use crate::services::dispatcher::{Dispatcher, RequestDescriptor};
use crate::services::envelope::{failure_envelope, success_envelope};
use crate::services::validation::Validation;
use reqwest::Method;
use serde_json::{Map, Value};

pub type Step = fn(&Validation, &mut OperationContext) -> Result<(), ApiError>;

#[derive(Debug, Clone)]
pub struct OperationContext {
    pub operation: String,
    pub item_index: usize,
    pub params: Value,
    pub echo: Map<String, Value>,
    pub fields: Map<String, Value>,
    pub query: Vec<(String, String)>,
    pub request: Option<RequestDescriptor>,
}

impl OperationContext {
    pub fn new(operation: impl Into<String>, item_index: usize, params: Value) -> Self {
        Self {
            operation: operation.into(),
            item_index,
            params,
            echo: Map::new(),
            fields: Map::new(),
            query: Vec::new(),
            request: None,
        }
    }

    pub fn param(&self, key: &str) -> Option<&Value> {
        self.params.get(key)
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(|v| v.as_str())
    }

    // Records a normalized input for the request body and the echoed output.
    pub fn keep(&mut self, echo_key: &str, field: &str, value: impl Into<Value>) {
        let value = value.into();
        self.echo.insert(echo_key.to_string(), value.clone());
        self.fields.insert(field.to_string(), value);
    }

    pub fn echo(&mut self, key: &str, value: impl Into<Value>) {
        self.echo.insert(key.to_string(), value.into());
    }

    pub fn query_param(&mut self, key: &str, value: impl Into<String>) {
        self.query.push((key.to_string(), value.into()));
    }

    pub fn get(&mut self, path: &str) -> Result<(), ApiError> {
        let target = if self.query.is_empty() {
            path.to_string()
        } else {
            let encoded = serde_urlencoded::to_string(&self.query)
                .map_err(|_| ApiError::invalid_request("Query could not be encoded"))?;
            format!("{}?{}", path, encoded)
        };
        self.set_request(RequestDescriptor::new(Method::GET, target));
        Ok(())
    }

    pub fn post(&mut self, path: &str, body: Value) -> Result<(), ApiError> {
        self.set_request(RequestDescriptor::post(path, body));
        Ok(())
    }

    fn set_request(&mut self, request: RequestDescriptor) {
        let operation = self.operation.clone();
        self.request = Some(request.with_context(operation, self.item_index));
    }
}

pub fn run_steps(
    validation: &Validation,
    ctx: &mut OperationContext,
    steps: &[Step],
) -> Result<(), ApiError> {
    steps.iter().try_for_each(|step| step(validation, ctx))
}

pub async fn execute(
    dispatcher: &Dispatcher,
    validation: &Validation,
    mut ctx: OperationContext,
    steps: &[Step],
) -> Value {
    let outcome = match run_steps(validation, &mut ctx, steps) {
        Ok(()) => match ctx.request.take() {
            Some(request) => dispatcher.dispatch(request).await,
            None => Err(ApiError::unknown()),
        },
        Err(err) => Err(err),
    };
    match outcome {
        Ok(response) => success_envelope(&ctx.echo, response),
        Err(err) => failure_envelope(&ctx.echo, &err, &dispatcher.secret_values()),
    }
}
