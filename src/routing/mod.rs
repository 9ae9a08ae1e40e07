//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request (path, method, headers, body)
//!     → matcher.rs (pick the winning active rule)
//!     → engine.rs (exhaustive strategy dispatch)
//!         direct        → upstream caller
//!         orchestration → orchestration executor
//!         comparison    → comparison engine
//!         ab_test       → comparison engine (split primary)
//!     → response, or a RoutingError mapped to exactly one status code
//! ```
//!
//! # Design Decisions
//! - Matching is deterministic: highest priority wins, ties break to the
//!   lowest rule id; a routing flap is a bug, not a tolerance
//! - Strategy dispatch is an exhaustive match over the enum; adding a
//!   strategy fails compilation until every site handles it
//! - Every internal error kind maps to exactly one caller-visible outcome

pub mod engine;
pub mod matcher;

use axum::http::StatusCode;

use crate::orchestration::ExecutionError;
use crate::upstream::CallError;

pub use engine::{RoutedResponse, RoutingEngine};

/// Terminal routing failures, each with a single caller-visible mapping.
#[derive(Debug, thiserror::Error)]
pub enum RoutingError {
    #[error("no active rule matches the request")]
    NoMatchingRule,

    #[error(transparent)]
    Call(#[from] CallError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("rule {rule_id} is miswired: {detail}")]
    InvalidRule { rule_id: i64, detail: String },
}

impl RoutingError {
    /// Total mapping to response status. Backend error bodies pass through
    /// at the HTTP layer; everything else gets a terse text body.
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NoMatchingRule => StatusCode::NOT_FOUND,
            Self::Call(CallError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
            Self::Call(CallError::ConnectionFailed(_)) => StatusCode::BAD_GATEWAY,
            Self::Call(CallError::BackendError { status, .. }) => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            Self::Execution(ExecutionError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
            Self::Execution(ExecutionError::StepFailed {
                source: CallError::Timeout,
                ..
            }) => StatusCode::GATEWAY_TIMEOUT,
            Self::Execution(ExecutionError::StepFailed { .. }) => StatusCode::BAD_GATEWAY,
            Self::Execution(ExecutionError::UnknownEndpoint { .. })
            | Self::Execution(ExecutionError::MappingFailed { .. })
            | Self::InvalidRule { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Bytes;

    #[test]
    fn every_error_kind_maps_to_one_status() {
        assert_eq!(RoutingError::NoMatchingRule.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            RoutingError::Call(CallError::Timeout).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            RoutingError::Call(CallError::ConnectionFailed("refused".into())).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            RoutingError::Call(CallError::BackendError {
                status: 404,
                body: Bytes::new()
            })
            .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            RoutingError::Execution(ExecutionError::Timeout).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            RoutingError::Execution(ExecutionError::StepFailed {
                index: 1,
                name: "charge".into(),
                source: CallError::ConnectionFailed("refused".into()),
            })
            .status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            RoutingError::InvalidRule {
                rule_id: 1,
                detail: "missing shadow".into()
            }
            .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
