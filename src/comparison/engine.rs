//! Dual dispatch and log emission.

use std::sync::Arc;

use axum::body::Bytes;

use crate::comparison::diff::{self, DiffReport};
use crate::observability::metrics;
use crate::store::model::{ComparisonLog, Endpoint, RoutingRule, SideOutcome, Strategy};
use crate::store::RuleStore;
use crate::upstream::{CallError, CallRequest, CallResponse, EndpointCaller};

/// Dispatches one request to the old and new backends, returns the primary
/// outcome without waiting for the shadow side, and records the comparison
/// off the response path.
pub struct ComparisonEngine {
    store: Arc<dyn RuleStore>,
    caller: Arc<EndpointCaller>,
}

impl ComparisonEngine {
    pub fn new(store: Arc<dyn RuleStore>, caller: Arc<EndpointCaller>) -> Self {
        Self { store, caller }
    }

    /// Call both sides with the identical inbound request. Only the primary
    /// side's outcome reaches the caller, and only its latency is paid on
    /// the response path; the shadow call, the diff and the log append all
    /// run on a detached task. Exactly one log entry is appended per
    /// dispatch.
    pub async fn compare(
        &self,
        rule: &RoutingRule,
        old: &Endpoint,
        new: &Endpoint,
        request: &CallRequest,
        request_id: &str,
    ) -> Result<CallResponse, CallError> {
        let primary_is_new = primary_is_new(rule);
        let (primary, shadow) = if primary_is_new { (new, old) } else { (old, new) };

        // The shadow side runs on its own task so its latency and failures
        // never touch the caller's response path.
        let shadow_call = tokio::spawn({
            let caller = self.caller.clone();
            let endpoint = shadow.clone();
            let request = request.clone();
            async move { caller.call(&endpoint, &request).await }
        });

        let primary_result = self.caller.call(primary, request).await;

        let store = self.store.clone();
        let rule_id = rule.id;
        let strategy = rule.strategy;
        let request_id = request_id.to_string();
        let shadow_name = shadow.name.clone();
        let primary_for_log = primary_result.clone();
        tokio::spawn(async move {
            let shadow_result = match shadow_call.await {
                Ok(result) => result,
                Err(e) => Err(CallError::ConnectionFailed(format!(
                    "shadow call aborted: {e}"
                ))),
            };
            if let Err(e) = &shadow_result {
                tracing::warn!(
                    rule_id,
                    request_id = %request_id,
                    shadow = %shadow_name,
                    error = %e,
                    "shadow call failed"
                );
            }

            // The log records sides by role, whichever one served.
            let (old_result, new_result) = if primary_is_new {
                (shadow_result, primary_for_log)
            } else {
                (primary_for_log, shadow_result)
            };

            let report = outcome_report(&old_result, &new_result);
            metrics::record_comparison(strategy.as_str(), report.matched);

            let entry = ComparisonLog::new(
                rule_id,
                &request_id,
                side_outcome(&old_result),
                side_outcome(&new_result),
                report.matched,
                report.details,
            );
            if let Err(e) = store.append_comparison_log(entry) {
                metrics::record_log_append_failure();
                tracing::error!(error = %e, "failed to append comparison log");
            }
        });

        primary_result
    }
}

/// comparison: the old backend always serves the caller. ab_test: the new
/// backend serves `ab_split_percent` of requests (even split by default).
fn primary_is_new(rule: &RoutingRule) -> bool {
    match rule.strategy {
        Strategy::AbTest => {
            let split = rule.ab_split_percent.unwrap_or(50).min(100);
            fastrand::u8(0..100) < split
        }
        _ => false,
    }
}

/// Status and body when the side produced an HTTP response, even a non-2xx
/// one; `None` for transport-level failures.
fn response_view(result: &Result<CallResponse, CallError>) -> Option<(u16, &Bytes)> {
    match result {
        Ok(response) => Some((response.status.as_u16(), &response.body)),
        Err(CallError::BackendError { status, body }) => Some((*status, body)),
        Err(_) => None,
    }
}

fn outcome_report(
    old: &Result<CallResponse, CallError>,
    new: &Result<CallResponse, CallError>,
) -> DiffReport {
    match (response_view(old), response_view(new)) {
        (Some((old_status, old_body)), Some((new_status, new_body))) => {
            diff::compare_responses(old_status, old_body, new_status, new_body)
        }
        (old_view, new_view) => {
            let mut details = Vec::new();
            if old_view.is_none() {
                if let Err(e) = old {
                    details.push(format!("old side failed: {e}"));
                }
            }
            if new_view.is_none() {
                if let Err(e) = new {
                    details.push(format!("new side failed: {e}"));
                }
            }
            DiffReport {
                matched: false,
                details,
            }
        }
    }
}

fn side_outcome(result: &Result<CallResponse, CallError>) -> SideOutcome {
    match result {
        Ok(response) => SideOutcome {
            status: Some(response.status.as_u16()),
            body: Some(String::from_utf8_lossy(&response.body).into_owned()),
            error: None,
        },
        Err(CallError::BackendError { status, body }) => SideOutcome {
            status: Some(*status),
            body: Some(String::from_utf8_lossy(body).into_owned()),
            error: None,
        },
        Err(e) => SideOutcome {
            status: None,
            body: None,
            error: Some(e.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::model::HttpMethod;

    fn rule(strategy: Strategy, split: Option<u8>) -> RoutingRule {
        RoutingRule {
            id: 1,
            endpoint_id: 1,
            path: "/users".into(),
            method: HttpMethod::Get,
            strategy,
            priority: 0,
            active: true,
            shadow_endpoint_id: Some(2),
            ab_split_percent: split,
        }
    }

    #[test]
    fn comparison_primary_is_always_old() {
        for _ in 0..50 {
            assert!(!primary_is_new(&rule(Strategy::Comparison, None)));
        }
    }

    #[test]
    fn ab_test_split_extremes_are_deterministic() {
        for _ in 0..50 {
            assert!(!primary_is_new(&rule(Strategy::AbTest, Some(0))));
            assert!(primary_is_new(&rule(Strategy::AbTest, Some(100))));
        }
    }

    #[test]
    fn transport_failure_is_reported_per_side() {
        let ok: Result<CallResponse, CallError> = Err(CallError::BackendError {
            status: 500,
            body: Bytes::from_static(b"{}"),
        });
        let failed: Result<CallResponse, CallError> = Err(CallError::Timeout);
        let report = outcome_report(&ok, &failed);
        assert!(!report.matched);
        assert_eq!(report.details, vec!["new side failed: upstream call timed out"]);
    }
}
