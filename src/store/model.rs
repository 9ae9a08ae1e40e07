//! Persisted entity definitions.
//!
//! These mirror the shapes of the `endpoints`, `routing_rules`,
//! `orchestration_rules` and `comparison_logs` tables owned by the storage
//! collaborator. The gateway treats endpoints and rules as read-mostly
//! configuration; comparison logs are append-only history.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type EndpointId = i64;
pub type RuleId = i64;

/// HTTP verbs the gateway routes. Matching is exact; there is no wildcard
/// method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
}

impl HttpMethod {
    /// Convert from the wire method. Returns `None` for verbs the gateway
    /// does not route (HEAD, OPTIONS, ...).
    pub fn from_wire(method: &axum::http::Method) -> Option<Self> {
        match *method {
            axum::http::Method::GET => Some(Self::Get),
            axum::http::Method::POST => Some(Self::Post),
            axum::http::Method::PUT => Some(Self::Put),
            axum::http::Method::DELETE => Some(Self::Delete),
            axum::http::Method::PATCH => Some(Self::Patch),
            _ => None,
        }
    }

    pub fn to_wire(self) -> axum::http::Method {
        match self {
            Self::Get => axum::http::Method::GET,
            Self::Post => axum::http::Method::POST,
            Self::Put => axum::http::Method::PUT,
            Self::Delete => axum::http::Method::DELETE,
            Self::Patch => axum::http::Method::PATCH,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
        }
    }
}

/// One external backend the gateway can call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endpoint {
    pub id: EndpointId,

    /// Human-readable identifier for logs and metrics.
    pub name: String,

    /// Scheme + authority, e.g. "http://10.0.3.17:9000".
    pub base_url: String,

    /// Fixed outbound path. When absent the inbound request path is reused.
    #[serde(default)]
    pub path: Option<String>,

    pub method: HttpMethod,

    /// Per-attempt deadline.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Retries beyond the first attempt.
    #[serde(default)]
    pub retry_count: u32,

    /// Headers attached to every outbound call. Override same-named inbound
    /// headers.
    #[serde(default)]
    pub headers: HashMap<String, String>,

    #[serde(default = "default_true")]
    pub active: bool,
}

/// Dispatch strategy of a routing rule. The routing engine matches on this
/// exhaustively; a new strategy is a compile error until every dispatch site
/// handles it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Direct,
    Orchestration,
    Comparison,
    AbTest,
}

impl Strategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Direct => "direct",
            Self::Orchestration => "orchestration",
            Self::Comparison => "comparison",
            Self::AbTest => "ab_test",
        }
    }
}

/// A dispatch policy for one inbound path+method.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingRule {
    pub id: RuleId,

    /// Primary backend; the "old" side for comparison strategies.
    pub endpoint_id: EndpointId,

    /// Inbound path, matched exactly.
    pub path: String,

    pub method: HttpMethod,

    pub strategy: Strategy,

    /// Higher wins among rules matching the same path+method. Ties break to
    /// the lowest rule id so repeated matches are deterministic.
    #[serde(default)]
    pub priority: i32,

    #[serde(default = "default_true")]
    pub active: bool,

    /// The "new" side for comparison and ab_test rules.
    #[serde(default)]
    pub shadow_endpoint_id: Option<EndpointId>,

    /// ab_test only: percentage of requests for which the new side is
    /// primary. Defaults to an even split.
    #[serde(default)]
    pub ab_split_percent: Option<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Sequential,
    Parallel,
}

/// Pulls one value out of the execution context into a step's input body.
/// `source_step` is a prior step's name, or "request" for the inbound body.
/// Field paths are dot-separated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputMapping {
    pub source_step: String,
    pub source_field: String,
    pub target_field: String,
}

/// Gate on a context value: the step runs only when the referenced field
/// equals the given value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepCondition {
    pub source_step: String,
    pub field: String,
    pub equals: serde_json::Value,
}

/// One call within an orchestration plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// Key of this step's output in the aggregate response.
    pub name: String,

    pub endpoint_id: EndpointId,

    #[serde(default)]
    pub input: Vec<InputMapping>,

    #[serde(default)]
    pub condition: Option<StepCondition>,

    /// A required step's failure aborts the plan; a non-required failure is
    /// recorded as null and execution continues.
    #[serde(default = "default_true")]
    pub required: bool,
}

/// A multi-step plan bound 1:1 to a routing rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrationRule {
    pub id: i64,

    pub routing_rule_id: RuleId,

    pub mode: ExecutionMode,

    /// Non-empty; executed in declaration order (sequential) or fanned out
    /// (parallel).
    pub steps: Vec<Step>,

    /// Overall deadline across all steps, distinct from each endpoint's own
    /// per-call timeout.
    #[serde(default = "default_orchestration_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_true")]
    pub active: bool,
}

/// Outcome of one side of a dual dispatch as recorded in a comparison log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SideOutcome {
    /// HTTP status when the call produced a response.
    pub status: Option<u16>,

    /// Response body as UTF-8 (lossy) when the call produced a response.
    pub body: Option<String>,

    /// Failure description when it did not.
    pub error: Option<String>,
}

/// One recorded dual-dispatch outcome. Created exactly once per comparison
/// request and never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonLog {
    pub id: Uuid,
    pub routing_rule_id: RuleId,
    pub request_id: String,
    pub old: SideOutcome,
    pub new: SideOutcome,
    /// Derived from the structural diff, never authored directly.
    pub matched: bool,
    pub difference_details: Vec<String>,
    /// Unix epoch milliseconds.
    pub created_at_ms: u64,
}

impl ComparisonLog {
    pub fn new(
        routing_rule_id: RuleId,
        request_id: &str,
        old: SideOutcome,
        new: SideOutcome,
        matched: bool,
        difference_details: Vec<String>,
    ) -> Self {
        let created_at_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            id: Uuid::new_v4(),
            routing_rule_id,
            request_id: request_id.to_string(),
            old,
            new,
            matched,
            difference_details,
            created_at_ms,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_orchestration_timeout_ms() -> u64 {
    30_000
}
