//! Resilience policies for outbound calls.
//!
//! # Data Flow
//! ```text
//! Endpoint call attempt:
//!     → per-attempt deadline (endpoint timeout)
//!     → On failure: retries.rs decides retryability
//!     → backoff.rs computes the jittered delay before the next attempt
//! ```
//!
//! # Design Decisions
//! - Every outbound attempt has a hard deadline; no unbounded waits
//! - Retry count is bounded per endpoint configuration, never exceeded
//! - Jittered exponential backoff prevents synchronized retry storms
//! - Cancellation (future drop) never triggers a retry

pub mod backoff;
pub mod retries;
