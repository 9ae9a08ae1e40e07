//! Gateway configuration schema.
//!
//! All types derive Serde traits for deserialization from the TOML config
//! file; every field has a default so a minimal config works.

use serde::{Deserialize, Serialize};

/// Root configuration for the gateway process.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address, connection cap).
    pub listener: ListenerConfig,

    /// Rule storage configuration.
    pub rules: RulesConfig,

    /// Inbound request timeout.
    pub timeouts: TimeoutConfig,

    /// Outbound call settings shared by all endpoints.
    pub upstream: UpstreamConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Maximum concurrent inbound connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            max_connections: 10_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RulesConfig {
    /// Path to the rules file (endpoints, routing rules, orchestrations).
    pub path: String,

    /// Reload the snapshot when the rules file changes on disk.
    pub watch: bool,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            path: "rules.toml".to_string(),
            watch: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Whole-request deadline on the inbound side.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 60 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Concurrent in-flight calls allowed per endpoint.
    pub pool_size_per_endpoint: usize,

    /// First retry delay; doubles per attempt.
    pub retry_base_delay_ms: u64,

    /// Backoff cap.
    pub retry_max_delay_ms: u64,

    /// Largest request or response body the gateway will buffer.
    pub max_body_bytes: usize,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            pool_size_per_endpoint: 64,
            retry_base_delay_ms: 100,
            retry_max_delay_ms: 2_000,
            max_body_bytes: 2 * 1024 * 1024,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default tracing filter when RUST_LOG is unset.
    pub log_filter: String,

    pub metrics_enabled: bool,

    /// Prometheus scrape listener.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "routing_gateway=info,tower_http=info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
