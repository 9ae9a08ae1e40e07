//! Immutable view over the rule tables.
//!
//! # Data Flow
//! ```text
//! rules file (TOML)
//!     → RulesFile (serde)
//!     → validate_rules (semantic checks, all errors reported)
//!     → Snapshot (indexed, immutable)
//!     → shared via ArcSwap to all in-flight requests
//! ```
//!
//! # Design Decisions
//! - A snapshot is never mutated; reload builds a fresh one and swaps
//! - Validation rejects miswired rules at load time, not per request
//! - Lookups are indexed by id so the hot path does no scanning beyond
//!   the per-path rule filter

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::store::model::{
    Endpoint, EndpointId, ExecutionMode, OrchestrationRule, RoutingRule, RuleId, Strategy,
};

/// Serialized form of the rule tables, as stored on disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesFile {
    pub endpoints: Vec<Endpoint>,
    pub routing_rules: Vec<RoutingRule>,
    pub orchestration_rules: Vec<OrchestrationRule>,
}

/// One semantic problem found while validating a rules file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RulesError {
    pub entity: String,
    pub detail: String,
}

impl std::fmt::Display for RulesError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.entity, self.detail)
    }
}

/// Validated, indexed view of the rule tables.
#[derive(Debug, Default)]
pub struct Snapshot {
    pub endpoints: HashMap<EndpointId, Endpoint>,
    pub rules: Vec<RoutingRule>,
    /// Keyed by owning routing rule id (1:1).
    pub orchestrations: HashMap<RuleId, OrchestrationRule>,
}

impl Snapshot {
    /// Build a snapshot from a parsed rules file, rejecting it wholesale if
    /// any entity is miswired.
    pub fn from_rules(file: RulesFile) -> Result<Self, Vec<RulesError>> {
        validate_rules(&file)?;

        let endpoints = file.endpoints.into_iter().map(|e| (e.id, e)).collect();
        let orchestrations = file
            .orchestration_rules
            .into_iter()
            .map(|o| (o.routing_rule_id, o))
            .collect();

        Ok(Self {
            endpoints,
            rules: file.routing_rules,
            orchestrations,
        })
    }
}

/// Semantic validation. Serde already guarantees the syntactic shape; this
/// checks referential integrity and per-strategy wiring. All problems are
/// reported, not just the first.
pub fn validate_rules(file: &RulesFile) -> Result<(), Vec<RulesError>> {
    let mut errors = Vec::new();

    let mut endpoint_ids = std::collections::HashSet::new();
    for endpoint in &file.endpoints {
        let label = format!("endpoint {}", endpoint.id);
        if !endpoint_ids.insert(endpoint.id) {
            errors.push(err(&label, "duplicate id"));
        }
        match Url::parse(&endpoint.base_url) {
            Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
            Ok(url) => errors.push(err(
                &label,
                format!("unsupported scheme '{}' in base_url", url.scheme()),
            )),
            Err(e) => errors.push(err(&label, format!("invalid base_url: {e}"))),
        }
    }

    let mut rule_ids = std::collections::HashSet::new();
    for rule in &file.routing_rules {
        let label = format!("routing rule {}", rule.id);
        if !rule_ids.insert(rule.id) {
            errors.push(err(&label, "duplicate id"));
        }
        if !endpoint_ids.contains(&rule.endpoint_id) {
            errors.push(err(&label, format!("unknown endpoint {}", rule.endpoint_id)));
        }
        match rule.strategy {
            Strategy::Comparison | Strategy::AbTest => match rule.shadow_endpoint_id {
                None => errors.push(err(&label, "comparison strategy requires shadow_endpoint_id")),
                Some(id) if !endpoint_ids.contains(&id) => {
                    errors.push(err(&label, format!("unknown shadow endpoint {id}")));
                }
                Some(_) => {}
            },
            Strategy::Direct | Strategy::Orchestration => {}
        }
        if let Some(split) = rule.ab_split_percent {
            if split > 100 {
                errors.push(err(&label, format!("ab_split_percent {split} exceeds 100")));
            }
        }
    }

    for orch in &file.orchestration_rules {
        let label = format!("orchestration rule {}", orch.id);
        if !rule_ids.contains(&orch.routing_rule_id) {
            errors.push(err(
                &label,
                format!("unknown routing rule {}", orch.routing_rule_id),
            ));
        }
        if orch.steps.is_empty() {
            errors.push(err(&label, "steps must be non-empty"));
        }
        let mut step_names = std::collections::HashSet::new();
        for step in &orch.steps {
            if !step_names.insert(step.name.as_str()) {
                errors.push(err(&label, format!("duplicate step name '{}'", step.name)));
            }
            // "request" addresses the inbound body in mappings and
            // conditions; a step by that name would shadow it.
            if step.name == "request" {
                errors.push(err(&label, "step name 'request' is reserved"));
            }
            if !endpoint_ids.contains(&step.endpoint_id) {
                errors.push(err(
                    &label,
                    format!("step '{}' references unknown endpoint {}", step.name, step.endpoint_id),
                ));
            }
            if orch.mode == ExecutionMode::Parallel {
                // Parallel steps run with no inter-step ordering, so they may
                // not consume sibling outputs.
                if !step.input.is_empty() {
                    errors.push(err(
                        &label,
                        format!("parallel step '{}' declares input mappings", step.name),
                    ));
                }
                if let Some(cond) = &step.condition {
                    if cond.source_step != "request" {
                        errors.push(err(
                            &label,
                            format!(
                                "parallel step '{}' condition references step '{}'",
                                step.name, cond.source_step
                            ),
                        ));
                    }
                }
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn err(entity: &str, detail: impl Into<String>) -> RulesError {
    RulesError {
        entity: entity.to_string(),
        detail: detail.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::model::{HttpMethod, InputMapping, Step};

    fn endpoint(id: EndpointId) -> Endpoint {
        Endpoint {
            id,
            name: format!("ep-{id}"),
            base_url: "http://127.0.0.1:9000".into(),
            path: None,
            method: HttpMethod::Get,
            timeout_ms: 1_000,
            retry_count: 0,
            headers: Default::default(),
            active: true,
        }
    }

    fn rule(id: RuleId, strategy: Strategy) -> RoutingRule {
        RoutingRule {
            id,
            endpoint_id: 1,
            path: "/users".into(),
            method: HttpMethod::Get,
            strategy,
            priority: 0,
            active: true,
            shadow_endpoint_id: None,
            ab_split_percent: None,
        }
    }

    #[test]
    fn parses_full_rules_file() {
        let toml = r#"
            [[endpoints]]
            id = 1
            name = "users-v1"
            base_url = "http://127.0.0.1:9001"
            method = "GET"
            timeout_ms = 2000
            retry_count = 2

            [[endpoints]]
            id = 2
            name = "users-v2"
            base_url = "http://127.0.0.1:9002"
            method = "GET"
            [endpoints.headers]
            x-api-key = "secret"

            [[routing_rules]]
            id = 10
            endpoint_id = 1
            path = "/users"
            method = "GET"
            strategy = "comparison"
            priority = 5
            shadow_endpoint_id = 2

            [[routing_rules]]
            id = 11
            endpoint_id = 1
            path = "/orders"
            method = "POST"
            strategy = "orchestration"

            [[orchestration_rules]]
            id = 100
            routing_rule_id = 11
            mode = "sequential"
            timeout_ms = 10000

            [[orchestration_rules.steps]]
            name = "reserve"
            endpoint_id = 1

            [[orchestration_rules.steps]]
            name = "charge"
            endpoint_id = 2
            [[orchestration_rules.steps.input]]
            source_step = "reserve"
            source_field = "id"
            target_field = "reservation_id"
        "#;

        let file: RulesFile = toml::from_str(toml).expect("rules file should parse");
        let snapshot = Snapshot::from_rules(file).expect("rules file should validate");

        assert_eq!(snapshot.endpoints.len(), 2);
        assert_eq!(snapshot.rules.len(), 2);
        let orch = snapshot.orchestrations.get(&11).expect("orchestration present");
        assert_eq!(orch.steps.len(), 2);
        assert_eq!(orch.steps[1].input[0].source_step, "reserve");
    }

    #[test]
    fn rejects_comparison_rule_without_shadow() {
        let file = RulesFile {
            endpoints: vec![endpoint(1)],
            routing_rules: vec![rule(10, Strategy::Comparison)],
            orchestration_rules: vec![],
        };
        let errors = Snapshot::from_rules(file).unwrap_err();
        assert!(errors.iter().any(|e| e.detail.contains("shadow_endpoint_id")));
    }

    #[test]
    fn rejects_parallel_step_with_input_mapping() {
        let mut r = rule(10, Strategy::Orchestration);
        r.path = "/orders".into();
        let file = RulesFile {
            endpoints: vec![endpoint(1)],
            routing_rules: vec![r],
            orchestration_rules: vec![OrchestrationRule {
                id: 100,
                routing_rule_id: 10,
                mode: ExecutionMode::Parallel,
                steps: vec![Step {
                    name: "a".into(),
                    endpoint_id: 1,
                    input: vec![InputMapping {
                        source_step: "b".into(),
                        source_field: "id".into(),
                        target_field: "id".into(),
                    }],
                    condition: None,
                    required: true,
                }],
                timeout_ms: 1_000,
                active: true,
            }],
        };
        let errors = Snapshot::from_rules(file).unwrap_err();
        assert!(errors.iter().any(|e| e.detail.contains("input mappings")));
    }

    #[test]
    fn rejects_step_named_request() {
        let mut r = rule(10, Strategy::Orchestration);
        r.path = "/orders".into();
        let file = RulesFile {
            endpoints: vec![endpoint(1)],
            routing_rules: vec![r],
            orchestration_rules: vec![OrchestrationRule {
                id: 100,
                routing_rule_id: 10,
                mode: ExecutionMode::Sequential,
                steps: vec![
                    Step {
                        name: "request".into(),
                        endpoint_id: 1,
                        input: vec![],
                        condition: None,
                        required: true,
                    },
                    Step {
                        name: "consume".into(),
                        endpoint_id: 1,
                        input: vec![InputMapping {
                            source_step: "request".into(),
                            source_field: "user".into(),
                            target_field: "user".into(),
                        }],
                        condition: None,
                        required: true,
                    },
                ],
                timeout_ms: 1_000,
                active: true,
            }],
        };
        let errors = Snapshot::from_rules(file).unwrap_err();
        assert!(errors.iter().any(|e| e.detail.contains("reserved")));
    }

    #[test]
    fn rejects_empty_steps_and_unknown_references() {
        let file = RulesFile {
            endpoints: vec![],
            routing_rules: vec![rule(10, Strategy::Direct)],
            orchestration_rules: vec![OrchestrationRule {
                id: 100,
                routing_rule_id: 99,
                mode: ExecutionMode::Sequential,
                steps: vec![],
                timeout_ms: 1_000,
                active: true,
            }],
        };
        let errors = Snapshot::from_rules(file).unwrap_err();
        assert!(errors.iter().any(|e| e.detail.contains("unknown endpoint 1")));
        assert!(errors.iter().any(|e| e.detail.contains("non-empty")));
        assert!(errors.iter().any(|e| e.detail.contains("unknown routing rule 99")));
    }
}
