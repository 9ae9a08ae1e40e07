//! Multi-step orchestration subsystem.
//!
//! # Data Flow
//! ```text
//! Matched rule (strategy = orchestration)
//!     → executor.rs (sequential or parallel plan execution)
//!     → mapping.rs (resolve step inputs from the running context)
//!     → upstream caller per step
//!     → AggregateResponse keyed by step name, in declaration order
//! ```
//!
//! # Design Decisions
//! - Sequential steps observe a strict happens-before order; a required
//!   step's failure stops the plan before later steps dispatch
//! - Parallel steps fan out together and are always allowed to finish;
//!   a failed aggregate drops their results rather than cancelling them
//! - The overall plan deadline is independent of per-endpoint timeouts;
//!   when it expires, in-flight calls are cancelled by dropping them
//! - Input mappings are a declarative table, not code: safe to persist,
//!   cheap to resolve

pub mod executor;
pub mod mapping;

use crate::upstream::CallError;

pub use executor::OrchestrationExecutor;

/// Combined output of an orchestration plan: one entry per step, keyed by
/// step name, ordered by declaration order regardless of completion order.
#[derive(Debug)]
pub struct AggregateResponse {
    pub body: serde_json::Value,
}

/// Orchestration-level failures. Terminal for the request unless the step
/// was declared non-required.
#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("step {index} ({name}) failed: {source}")]
    StepFailed {
        index: usize,
        name: String,
        #[source]
        source: CallError,
    },

    #[error("orchestration timed out")]
    Timeout,

    #[error("step {index} ({name}) references unknown endpoint {endpoint_id}")]
    UnknownEndpoint {
        index: usize,
        name: String,
        endpoint_id: i64,
    },

    #[error("step {index} ({name}) input mapping failed: {detail}")]
    MappingFailed {
        index: usize,
        name: String,
        detail: String,
    },
}
