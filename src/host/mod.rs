use crate::app::App;
use crate::errors::ApiError;
use crate::services::concurrency::ConcurrencyLedger;
use crate::services::credentials::Credentials;
use crate::services::envelope::error_record;
use crate::services::logger::Logger;
use crate::services::settings::Settings;
use futures::future::join_all;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};

#[derive(Clone)]
pub struct PluginInstance {
    logger: Logger,
    app: Arc<App>,
}

impl PluginInstance {
    pub fn new(
        logger: Logger,
        settings: &Settings,
        credentials: Credentials,
        ledger: &ConcurrencyLedger,
        instance_key: Option<&str>,
    ) -> Result<Self, ApiError> {
        let app = App::initialize(logger.clone(), settings, credentials, ledger, instance_key)?;
        Ok(Self::from_app(app))
    }

    pub fn from_app(app: App) -> Self {
        Self {
            logger: app.logger.child("host"),
            app: Arc::new(app),
        }
    }

    pub fn app(&self) -> &App {
        &self.app
    }

    // One output record per item, in input order.
    pub async fn execute(
        &self,
        operation: &str,
        items: Vec<Value>,
        continue_on_fail: bool,
    ) -> Result<Vec<Value>, ApiError> {
        let started = Instant::now();
        if !continue_on_fail {
            for (index, params) in items.iter().enumerate() {
                self.app.check(operation, index, params)?;
            }
        }

        let calls = items
            .into_iter()
            .enumerate()
            .map(|(index, params)| self.app.handle(operation, index, params));
        let outcomes = join_all(calls).await;

        let mut records = Vec::with_capacity(outcomes.len());
        let mut failures = 0usize;
        for (index, outcome) in outcomes.into_iter().enumerate() {
            match outcome {
                Ok(envelope) => {
                    if envelope.get("success").and_then(Value::as_bool) != Some(true) {
                        failures += 1;
                    }
                    records.push(envelope);
                }
                Err(err) if continue_on_fail => {
                    failures += 1;
                    self.logger.warn(
                        "Item failed before dispatch",
                        Some(&serde_json::json!({
                            "operation": operation,
                            "item_index": index,
                            "error_type": err.kind.as_str(),
                        })),
                    );
                    records.push(error_record(&err));
                }
                Err(err) => return Err(err),
            }
        }

        self.logger.info(
            "Batch complete",
            Some(&serde_json::json!({
                "operation": operation,
                "items": records.len(),
                "failures": failures,
                "duration_ms": started.elapsed().as_millis() as u64,
            })),
        );
        Ok(records)
    }
}

// Unparseable lines become non-object items so they surface as host faults.
fn parse_line(line: &str) -> Value {
    serde_json::from_str(line).unwrap_or(Value::Null)
}

pub async fn run_stdio(
    instance: &PluginInstance,
    operation: &str,
    continue_on_fail: bool,
) -> Result<usize, ApiError> {
    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();
    let mut reader = BufReader::new(stdin).lines();
    let mut writer = BufWriter::new(stdout);

    let mut items = Vec::new();
    while let Some(line) = reader.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        items.push(parse_line(trimmed));
    }

    let records = instance.execute(operation, items, continue_on_fail).await?;
    for record in &records {
        let payload = serde_json::to_string(record)?;
        writer.write_all(payload.as_bytes()).await?;
        writer.write_all(b"\n").await?;
    }
    writer.flush().await?;
    Ok(records.len())
}
