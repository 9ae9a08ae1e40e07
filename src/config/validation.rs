//! Semantic validation of the gateway configuration.
//!
//! Serde handles the syntactic shape; this checks value ranges before the
//! config is accepted. All problems are reported, not just the first.

use crate::config::schema::GatewayConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub detail: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.detail)
    }
}

pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(error("listener.bind_address", "not a valid socket address"));
    }
    if config.listener.max_connections == 0 {
        errors.push(error("listener.max_connections", "must be at least 1"));
    }
    if config.rules.path.is_empty() {
        errors.push(error("rules.path", "must not be empty"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(error("timeouts.request_secs", "must be at least 1"));
    }
    if config.upstream.pool_size_per_endpoint == 0 {
        errors.push(error("upstream.pool_size_per_endpoint", "must be at least 1"));
    }
    if config.upstream.max_body_bytes == 0 {
        errors.push(error("upstream.max_body_bytes", "must be at least 1"));
    }
    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<std::net::SocketAddr>()
            .is_err()
    {
        errors.push(error(
            "observability.metrics_address",
            "not a valid socket address",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn error(field: &str, detail: &str) -> ValidationError {
    ValidationError {
        field: field.to_string(),
        detail: detail.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(validate_config(&GatewayConfig::default()).is_ok());
    }

    #[test]
    fn all_problems_are_reported_together() {
        let mut config = GatewayConfig::default();
        config.listener.bind_address = "not-an-address".into();
        config.rules.path = String::new();
        config.upstream.pool_size_per_endpoint = 0;

        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
