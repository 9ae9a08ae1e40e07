//! Plan execution over the upstream caller.

use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderValue};
use futures_util::future::join_all;
use serde_json::{Map, Value};

use crate::orchestration::mapping::{self, ExecutionContext};
use crate::orchestration::{AggregateResponse, ExecutionError};
use crate::store::model::{ExecutionMode, OrchestrationRule, Step};
use crate::store::RuleStore;
use crate::upstream::{CallRequest, EndpointCaller};

/// Executes orchestration plans against configured endpoints.
pub struct OrchestrationExecutor {
    store: Arc<dyn RuleStore>,
    caller: Arc<EndpointCaller>,
}

impl OrchestrationExecutor {
    pub fn new(store: Arc<dyn RuleStore>, caller: Arc<EndpointCaller>) -> Self {
        Self { store, caller }
    }

    /// Run the plan under its overall deadline. On expiry, in-flight step
    /// calls are cancelled by dropping their futures.
    pub async fn execute(
        &self,
        rule: &OrchestrationRule,
        inbound: &CallRequest,
    ) -> Result<AggregateResponse, ExecutionError> {
        let deadline = Duration::from_millis(rule.timeout_ms);
        let plan = async {
            match rule.mode {
                ExecutionMode::Sequential => self.run_sequential(rule, inbound).await,
                ExecutionMode::Parallel => self.run_parallel(rule, inbound).await,
            }
        };
        match tokio::time::timeout(deadline, plan).await {
            Ok(result) => result,
            Err(_) => Err(ExecutionError::Timeout),
        }
    }

    /// Steps run strictly in list order; each step may consume the inbound
    /// body and all prior outputs. A required step's failure aborts before
    /// any later step dispatches, and partial outputs are not exposed.
    async fn run_sequential(
        &self,
        rule: &OrchestrationRule,
        inbound: &CallRequest,
    ) -> Result<AggregateResponse, ExecutionError> {
        let mut ctx = ExecutionContext::from_request(&inbound.body);
        let mut aggregate = Map::new();

        for (index, step) in rule.steps.iter().enumerate() {
            if let Some(condition) = &step.condition {
                if !ctx.condition_holds(condition) {
                    tracing::debug!(step = %step.name, "step condition not met, skipping");
                    aggregate.insert(step.name.clone(), Value::Null);
                    continue;
                }
            }

            let request = self.step_request(index, step, &ctx, inbound)?;
            let output = match self.dispatch_step(index, step, &request).await {
                Ok(value) => value,
                Err(e) if step.required => return Err(e),
                Err(e) => {
                    tracing::warn!(step = %step.name, error = %e, "non-required step failed");
                    Value::Null
                }
            };

            ctx.record_output(&step.name, output.clone());
            aggregate.insert(step.name.clone(), output);
        }

        Ok(AggregateResponse {
            body: Value::Object(aggregate),
        })
    }

    /// All steps dispatch concurrently and are allowed to finish; the
    /// aggregate fails only when a required step fails, reporting the
    /// lowest failing index. Key order follows declaration order, not
    /// completion order.
    async fn run_parallel(
        &self,
        rule: &OrchestrationRule,
        inbound: &CallRequest,
    ) -> Result<AggregateResponse, ExecutionError> {
        let ctx = ExecutionContext::from_request(&inbound.body);

        let calls = rule.steps.iter().enumerate().map(|(index, step)| {
            let skipped = step
                .condition
                .as_ref()
                .map(|c| !ctx.condition_holds(c))
                .unwrap_or(false);
            let request = inbound.clone();
            async move {
                if skipped {
                    tracing::debug!(step = %step.name, "step condition not met, skipping");
                    return Ok(Value::Null);
                }
                self.dispatch_step(index, step, &request).await
            }
        });

        // join_all preserves input order, so results line up with steps.
        let results = join_all(calls).await;

        let mut aggregate = Map::new();
        for (step, result) in rule.steps.iter().zip(results) {
            let output = match result {
                Ok(value) => value,
                Err(e) if step.required => return Err(e),
                Err(e) => {
                    tracing::warn!(step = %step.name, error = %e, "non-required step failed");
                    Value::Null
                }
            };
            aggregate.insert(step.name.clone(), output);
        }

        Ok(AggregateResponse {
            body: Value::Object(aggregate),
        })
    }

    async fn dispatch_step(
        &self,
        index: usize,
        step: &Step,
        request: &CallRequest,
    ) -> Result<Value, ExecutionError> {
        let endpoint =
            self.store
                .endpoint(step.endpoint_id)
                .ok_or(ExecutionError::UnknownEndpoint {
                    index,
                    name: step.name.clone(),
                    endpoint_id: step.endpoint_id,
                })?;

        match self.caller.call(&endpoint, request).await {
            Ok(response) => {
                tracing::debug!(
                    step = %step.name,
                    endpoint = %endpoint.name,
                    status = response.status.as_u16(),
                    duration_ms = response.duration.as_millis() as u64,
                    "step completed"
                );
                Ok(mapping::parse_body(&response.body))
            }
            Err(source) => Err(ExecutionError::StepFailed {
                index,
                name: step.name.clone(),
                source,
            }),
        }
    }

    /// Build the step's outbound request: the inbound request as-is when no
    /// mapping is declared, otherwise a JSON body assembled from the
    /// mapping table.
    fn step_request(
        &self,
        index: usize,
        step: &Step,
        ctx: &ExecutionContext,
        inbound: &CallRequest,
    ) -> Result<CallRequest, ExecutionError> {
        if step.input.is_empty() {
            return Ok(inbound.clone());
        }

        let input =
            mapping::resolve_step_input(&step.input, ctx).map_err(|detail| {
                ExecutionError::MappingFailed {
                    index,
                    name: step.name.clone(),
                    detail,
                }
            })?;
        let body = serde_json::to_vec(&input).map_err(|e| ExecutionError::MappingFailed {
            index,
            name: step.name.clone(),
            detail: e.to_string(),
        })?;

        let mut headers = inbound.headers.clone();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );

        Ok(CallRequest {
            path: inbound.path.clone(),
            headers,
            body: body.into(),
        })
    }
}
