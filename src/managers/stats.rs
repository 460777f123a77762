use crate::constants::endpoints;
use crate::errors::ApiError;
use crate::managers::{unknown_operation, OperationHandler};
use crate::services::dispatcher::Dispatcher;
use crate::services::pipeline::{execute, OperationContext, Step};
use crate::services::validation::Validation;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

const STATS_OPERATIONS: &[&str] = &["get_site_stats", "get_segment_stats", "get_report_stats"];

const SITE_STEPS: &[Step] = &[build_site];
const SEGMENT_STEPS: &[Step] = &[read_segment, build_segment];
const REPORT_STEPS: &[Step] = &[read_report, build_report];

#[derive(Clone)]
pub struct StatsManager {
    validation: Validation,
    dispatcher: Arc<Dispatcher>,
}

impl StatsManager {
    pub fn new(validation: Validation, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            validation,
            dispatcher,
        }
    }
}

#[async_trait]
impl OperationHandler for StatsManager {
    fn operations(&self) -> &'static [&'static str] {
        STATS_OPERATIONS
    }

    async fn handle(
        &self,
        operation: &str,
        item_index: usize,
        params: Value,
    ) -> Result<Value, ApiError> {
        let steps = match operation {
            "get_site_stats" => SITE_STEPS,
            "get_segment_stats" => SEGMENT_STEPS,
            "get_report_stats" => REPORT_STEPS,
            _ => return Err(unknown_operation("stats", operation, STATS_OPERATIONS)),
        };
        let ctx = OperationContext::new(operation, item_index, params);
        Ok(execute(&self.dispatcher, &self.validation, ctx, steps).await)
    }
}

fn build_site(_: &Validation, ctx: &mut OperationContext) -> Result<(), ApiError> {
    ctx.get(endpoints::STATS_SITE)
}

fn read_segment(v: &Validation, ctx: &mut OperationContext) -> Result<(), ApiError> {
    let segment = v.ensure_identifier(ctx.param("segmentId"), "Segment ID")?;
    ctx.echo("segmentId", segment.clone());
    ctx.query_param("segment_id", segment);
    Ok(())
}

fn build_segment(_: &Validation, ctx: &mut OperationContext) -> Result<(), ApiError> {
    ctx.get(endpoints::STATS_SEGMENT)
}

fn read_report(v: &Validation, ctx: &mut OperationContext) -> Result<(), ApiError> {
    let report = v.ensure_identifier(ctx.param("reportId"), "Report ID")?;
    ctx.echo("reportId", report.clone());
    ctx.query_param("report_id", report);
    Ok(())
}

fn build_report(_: &Validation, ctx: &mut OperationContext) -> Result<(), ApiError> {
    ctx.get(endpoints::STATS_REPORT)
}
