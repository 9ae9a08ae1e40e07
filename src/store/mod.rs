//! Rule storage subsystem.
//!
//! # Data Flow
//! ```text
//! rules file (TOML)
//!     → snapshot.rs (parse, validate, freeze)
//!     → SnapshotStore (ArcSwap<Snapshot>, lock-free reads)
//!     → RuleStore trait (consumed by the routing engine)
//!
//! On file change:
//!     watcher.rs detects write
//!     → SnapshotStore::reload
//!     → atomic swap; in-flight requests keep their old snapshot
//! ```
//!
//! # Design Decisions
//! - The engine only sees the `RuleStore` trait; a database-backed
//!   implementation can replace `SnapshotStore` without touching the core
//! - Reads never lock; each request loads one snapshot pointer
//! - Comparison logs are append-only and capacity-bounded in memory,
//!   mirrored as structured tracing events for external collection

pub mod model;
pub mod snapshot;
pub mod watcher;

use std::path::Path;
use std::sync::Mutex;

use arc_swap::ArcSwap;
use std::sync::Arc;

use crate::store::model::{ComparisonLog, Endpoint, EndpointId, HttpMethod, OrchestrationRule, RoutingRule, RuleId};
use crate::store::snapshot::{RulesFile, RulesError, Snapshot};

pub use model::Strategy;

/// Storage failures surfaced to the core.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to read rules file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse rules file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("rules file failed validation: {}", format_errors(.0))]
    Validation(Vec<RulesError>),

    #[error("comparison log store is unavailable")]
    LogUnavailable,
}

fn format_errors(errors: &[RulesError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Narrow interface the routing core consumes from storage.
pub trait RuleStore: Send + Sync {
    /// All active rules matching the given path+method exactly.
    fn active_rules(&self, path: &str, method: HttpMethod) -> Vec<RoutingRule>;

    /// The active orchestration plan bound to a routing rule, if any.
    fn orchestration(&self, routing_rule_id: RuleId) -> Option<OrchestrationRule>;

    fn endpoint(&self, id: EndpointId) -> Option<Endpoint>;

    /// Append one comparison log entry. Entries are immutable once appended.
    fn append_comparison_log(&self, entry: ComparisonLog) -> Result<(), StoreError>;
}

/// File-backed `RuleStore` holding an immutable, hot-swappable snapshot.
pub struct SnapshotStore {
    snapshot: ArcSwap<Snapshot>,
    logs: Mutex<Vec<ComparisonLog>>,
    log_capacity: usize,
}

impl SnapshotStore {
    const DEFAULT_LOG_CAPACITY: usize = 10_000;

    /// Load the rules file at `path` into a fresh store.
    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let file = read_rules_file(path)?;
        Self::from_rules(file)
    }

    /// Build a store from already-parsed rule tables.
    pub fn from_rules(file: RulesFile) -> Result<Self, StoreError> {
        let snapshot = Snapshot::from_rules(file).map_err(StoreError::Validation)?;
        Ok(Self {
            snapshot: ArcSwap::from_pointee(snapshot),
            logs: Mutex::new(Vec::new()),
            log_capacity: Self::DEFAULT_LOG_CAPACITY,
        })
    }

    /// Re-read the rules file and swap the snapshot. In-flight requests keep
    /// the snapshot they started with; a rejected file leaves the current
    /// snapshot in place.
    pub fn reload(&self, path: &Path) -> Result<(), StoreError> {
        let file = read_rules_file(path)?;
        let snapshot = Snapshot::from_rules(file).map_err(StoreError::Validation)?;
        let rule_count = snapshot.rules.len();
        self.snapshot.store(Arc::new(snapshot));
        tracing::info!(rules = rule_count, "rule snapshot reloaded");
        Ok(())
    }

    /// Recent comparison logs, oldest first. Primarily for the admin surface
    /// and tests; external collectors consume the tracing events.
    pub fn recent_comparison_logs(&self) -> Vec<ComparisonLog> {
        self.logs.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

impl RuleStore for SnapshotStore {
    fn active_rules(&self, path: &str, method: HttpMethod) -> Vec<RoutingRule> {
        let snapshot = self.snapshot.load();
        snapshot
            .rules
            .iter()
            .filter(|r| r.active && r.method == method && r.path == path)
            .cloned()
            .collect()
    }

    fn orchestration(&self, routing_rule_id: RuleId) -> Option<OrchestrationRule> {
        let snapshot = self.snapshot.load();
        snapshot
            .orchestrations
            .get(&routing_rule_id)
            .filter(|o| o.active)
            .cloned()
    }

    fn endpoint(&self, id: EndpointId) -> Option<Endpoint> {
        self.snapshot.load().endpoints.get(&id).cloned()
    }

    fn append_comparison_log(&self, entry: ComparisonLog) -> Result<(), StoreError> {
        tracing::info!(
            routing_rule_id = entry.routing_rule_id,
            request_id = %entry.request_id,
            matched = entry.matched,
            differences = entry.difference_details.len(),
            "comparison log appended"
        );
        let mut logs = self.logs.lock().map_err(|_| StoreError::LogUnavailable)?;
        if logs.len() >= self.log_capacity {
            logs.remove(0);
        }
        logs.push(entry);
        Ok(())
    }
}

fn read_rules_file(path: &Path) -> Result<RulesFile, StoreError> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::model::SideOutcome;

    fn store_with_rules(rules: Vec<RoutingRule>) -> SnapshotStore {
        let endpoints = vec![crate::store::model::Endpoint {
            id: 1,
            name: "ep".into(),
            base_url: "http://127.0.0.1:9000".into(),
            path: None,
            method: HttpMethod::Get,
            timeout_ms: 1_000,
            retry_count: 0,
            headers: Default::default(),
            active: true,
        }];
        SnapshotStore::from_rules(RulesFile {
            endpoints,
            routing_rules: rules,
            orchestration_rules: vec![],
        })
        .expect("valid rules")
    }

    fn rule(id: i64, path: &str, active: bool) -> RoutingRule {
        RoutingRule {
            id,
            endpoint_id: 1,
            path: path.into(),
            method: HttpMethod::Get,
            strategy: Strategy::Direct,
            priority: 0,
            active,
            shadow_endpoint_id: None,
            ab_split_percent: None,
        }
    }

    #[test]
    fn active_rules_filters_path_method_and_active_flag() {
        let store = store_with_rules(vec![
            rule(1, "/users", true),
            rule(2, "/users", false),
            rule(3, "/orders", true),
        ]);

        let matched = store.active_rules("/users", HttpMethod::Get);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].id, 1);

        assert!(store.active_rules("/users", HttpMethod::Post).is_empty());
    }

    #[test]
    fn appended_logs_are_readable_and_ordered() {
        let store = store_with_rules(vec![rule(1, "/users", true)]);
        for i in 0..3 {
            let entry = ComparisonLog::new(
                1,
                &format!("req-{i}"),
                SideOutcome { status: Some(200), body: Some("{}".into()), error: None },
                SideOutcome { status: Some(200), body: Some("{}".into()), error: None },
                true,
                vec![],
            );
            store.append_comparison_log(entry).expect("append succeeds");
        }
        let logs = store.recent_comparison_logs();
        assert_eq!(logs.len(), 3);
        assert_eq!(logs[0].request_id, "req-0");
        assert_eq!(logs[2].request_id, "req-2");
    }
}
