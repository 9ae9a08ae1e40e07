//! Strategy dispatch.

use std::sync::Arc;
use std::time::Instant;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};

use crate::comparison::ComparisonEngine;
use crate::observability::metrics;
use crate::orchestration::{AggregateResponse, OrchestrationExecutor};
use crate::routing::{matcher, RoutingError};
use crate::store::model::{Endpoint, EndpointId, HttpMethod, RoutingRule, Strategy};
use crate::store::RuleStore;
use crate::upstream::{CallRequest, CallResponse, EndpointCaller};

/// Final response handed back to the inbound caller.
#[derive(Debug)]
pub struct RoutedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RoutedResponse {
    fn from_call(response: CallResponse) -> Self {
        let mut headers = response.headers;
        // Framing is recomputed for the inbound connection.
        headers.remove(header::CONTENT_LENGTH);
        headers.remove(header::TRANSFER_ENCODING);
        headers.remove(header::CONNECTION);
        Self {
            status: response.status,
            headers,
            body: response.body,
        }
    }

    fn from_aggregate(aggregate: AggregateResponse) -> Self {
        let body = serde_json::to_vec(&aggregate.body).unwrap_or_default();
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        Self {
            status: StatusCode::OK,
            headers,
            body: body.into(),
        }
    }
}

/// Root of the core: matches the rule and dispatches per strategy.
pub struct RoutingEngine {
    store: Arc<dyn RuleStore>,
    caller: Arc<EndpointCaller>,
    executor: OrchestrationExecutor,
    comparison: ComparisonEngine,
}

impl RoutingEngine {
    pub fn new(store: Arc<dyn RuleStore>, caller: Arc<EndpointCaller>) -> Self {
        Self {
            executor: OrchestrationExecutor::new(store.clone(), caller.clone()),
            comparison: ComparisonEngine::new(store.clone(), caller.clone()),
            store,
            caller,
        }
    }

    /// Route one inbound request. `path` is the bare request path used for
    /// matching; `request.path` carries path and query for forwarding.
    pub async fn route(
        &self,
        method: HttpMethod,
        path: &str,
        request: CallRequest,
        request_id: &str,
    ) -> Result<RoutedResponse, RoutingError> {
        let start = Instant::now();

        let candidates = self.store.active_rules(path, method);
        let rule = match matcher::select_rule(&candidates, path, method) {
            Some(rule) => rule.clone(),
            None => {
                tracing::debug!(request_id = %request_id, method = method.as_str(), path, "no rule matched");
                metrics::record_request(method.as_str(), "none", 404, start);
                return Err(RoutingError::NoMatchingRule);
            }
        };

        tracing::debug!(
            request_id = %request_id,
            rule_id = rule.id,
            strategy = rule.strategy.as_str(),
            priority = rule.priority,
            "rule matched"
        );

        let result = self.dispatch(&rule, &request, request_id).await;
        let status = match &result {
            Ok(response) => response.status.as_u16(),
            Err(e) => e.status().as_u16(),
        };
        metrics::record_request(method.as_str(), rule.strategy.as_str(), status, start);
        result
    }

    async fn dispatch(
        &self,
        rule: &RoutingRule,
        request: &CallRequest,
        request_id: &str,
    ) -> Result<RoutedResponse, RoutingError> {
        match rule.strategy {
            Strategy::Direct => {
                let endpoint = self.resolve_endpoint(rule, rule.endpoint_id)?;
                let response = self.caller.call(&endpoint, request).await?;
                Ok(RoutedResponse::from_call(response))
            }
            Strategy::Orchestration => {
                let plan =
                    self.store
                        .orchestration(rule.id)
                        .ok_or_else(|| RoutingError::InvalidRule {
                            rule_id: rule.id,
                            detail: "no active orchestration plan".into(),
                        })?;
                let aggregate = self.executor.execute(&plan, request).await?;
                Ok(RoutedResponse::from_aggregate(aggregate))
            }
            Strategy::Comparison | Strategy::AbTest => {
                let old = self.resolve_endpoint(rule, rule.endpoint_id)?;
                let shadow_id =
                    rule.shadow_endpoint_id
                        .ok_or_else(|| RoutingError::InvalidRule {
                            rule_id: rule.id,
                            detail: "comparison rule without shadow endpoint".into(),
                        })?;
                let new = self.resolve_endpoint(rule, shadow_id)?;
                let response = self
                    .comparison
                    .compare(rule, &old, &new, request, request_id)
                    .await?;
                Ok(RoutedResponse::from_call(response))
            }
        }
    }

    fn resolve_endpoint(
        &self,
        rule: &RoutingRule,
        id: EndpointId,
    ) -> Result<Endpoint, RoutingError> {
        let endpoint = self
            .store
            .endpoint(id)
            .ok_or_else(|| RoutingError::InvalidRule {
                rule_id: rule.id,
                detail: format!("unknown endpoint {id}"),
            })?;
        if !endpoint.active {
            return Err(RoutingError::InvalidRule {
                rule_id: rule.id,
                detail: format!("endpoint {} ({}) is inactive", id, endpoint.name),
            });
        }
        Ok(endpoint)
    }
}
