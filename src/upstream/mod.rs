//! Outbound call subsystem.
//!
//! # Data Flow
//! ```text
//! Strategy handler needs a backend response:
//!     → pool.rs (acquire bounded per-endpoint permit)
//!     → caller.rs (build request, enforce deadline, retry with backoff)
//!     → CallResponse (status, headers, body, duration)
//!       or CallError (Timeout | ConnectionFailed | BackendError)
//! ```
//!
//! # Design Decisions
//! - One shared hyper client; connection reuse is the client's concern
//! - Per-endpoint semaphores bound concurrency toward each backend so a
//!   slow backend produces queueing backpressure, not unbounded fan-out
//! - The error taxonomy is part of the contract: orchestration and
//!   comparison apply different policies per variant

pub mod caller;
pub mod pool;

pub use caller::{CallError, CallRequest, CallResponse, EndpointCaller};
