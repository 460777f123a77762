use crate::catalog::{operation_catalog, validate_params};
use crate::errors::ApiError;
use crate::managers::broadcast::BroadcastManager;
use crate::managers::email::EmailManager;
use crate::managers::event::EventManager;
use crate::managers::experimental::ExperimentalManager;
use crate::managers::stats::StatsManager;
use crate::managers::subscriber::SubscriberManager;
use crate::managers::{unknown_operation, OperationHandler};
use crate::services::concurrency::ConcurrencyLedger;
use crate::services::credentials::Credentials;
use crate::services::dispatcher::Dispatcher;
use crate::services::logger::Logger;
use crate::services::settings::Settings;
use crate::services::validation::Validation;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

pub struct App {
    pub logger: Logger,
    pub dispatcher: Arc<Dispatcher>,
    handlers: HashMap<String, Arc<dyn OperationHandler>>,
}

impl App {
    fn validate_operation_wiring(
        handlers: &HashMap<String, Arc<dyn OperationHandler>>,
    ) -> Result<(), ApiError> {
        let mut missing: Vec<String> = operation_catalog()
            .iter()
            .filter(|op| !handlers.contains_key(&op.name))
            .map(|op| op.name.clone())
            .collect();
        if missing.is_empty() {
            return Ok(());
        }
        missing.sort();
        Err(ApiError::unknown()
            .with_details(serde_json::json!({ "missing_operations": missing })))
    }

    pub fn initialize(
        logger: Logger,
        settings: &Settings,
        credentials: Credentials,
        ledger: &ConcurrencyLedger,
        instance_key: Option<&str>,
    ) -> Result<Self, ApiError> {
        settings.parsed_base_url()?;
        let validation = Validation::new();
        let key = instance_key
            .map(str::to_string)
            .unwrap_or_else(|| credentials.instance_key());
        let gate = ledger.gate_for(&key);
        let dispatcher = Arc::new(Dispatcher::new(
            logger.clone(),
            settings,
            Arc::new(credentials),
            gate,
        )?);

        let managers: Vec<Arc<dyn OperationHandler>> = vec![
            Arc::new(SubscriberManager::new(
                logger.clone(),
                validation.clone(),
                dispatcher.clone(),
            )),
            Arc::new(EventManager::new(validation.clone(), dispatcher.clone())),
            Arc::new(EmailManager::new(
                logger.clone(),
                validation.clone(),
                dispatcher.clone(),
            )),
            Arc::new(BroadcastManager::new(validation.clone(), dispatcher.clone())),
            Arc::new(StatsManager::new(validation.clone(), dispatcher.clone())),
            Arc::new(ExperimentalManager::new(validation, dispatcher.clone())),
        ];

        let mut handlers: HashMap<String, Arc<dyn OperationHandler>> = HashMap::new();
        for manager in managers {
            for operation in manager.operations() {
                handlers.insert(operation.to_string(), manager.clone());
            }
        }
        Self::validate_operation_wiring(&handlers)?;

        logger.debug(
            "Plugin instance ready",
            Some(&serde_json::json!({
                "instance_key": key,
                "operations": handlers.len(),
            })),
        );
        Ok(Self {
            logger,
            dispatcher,
            handlers,
        })
    }

    pub fn has_operation(&self, operation: &str) -> bool {
        self.handlers.contains_key(operation)
    }

    // Host-level faults only; handler failures come back as Ok envelopes.
    pub fn check(&self, operation: &str, item_index: usize, params: &Value) -> Result<(), ApiError> {
        if !self.handlers.contains_key(operation) {
            let mut known: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
            known.sort_unstable();
            return Err(unknown_operation("plugin", operation, &known));
        }
        if !params.is_object() {
            return Err(ApiError::invalid_request(format!(
                "Item {} must be a JSON object",
                item_index
            )));
        }
        validate_params(operation, params)
    }

    pub async fn handle(
        &self,
        operation: &str,
        item_index: usize,
        params: Value,
    ) -> Result<Value, ApiError> {
        self.check(operation, item_index, &params)?;
        match self.handlers.get(operation) {
            Some(handler) => handler.handle(operation, item_index, params).await,
            None => Err(ApiError::unknown()),
        }
    }
}
