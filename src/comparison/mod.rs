//! Dual-dispatch comparison subsystem.
//!
//! # Data Flow
//! ```text
//! Matched rule (strategy = comparison | ab_test)
//!     → engine.rs (primary awaited inline, shadow on a detached task)
//!     → primary outcome returned to the caller
//!     → detached task: await shadow
//!         → diff.rs (status + structural body comparison)
//!         → ComparisonLog appended (fire-and-forget)
//! ```
//!
//! # Design Decisions
//! - The shadow side is never caller-visible: its latency, failure or
//!   payload cannot change the primary response; the caller only ever
//!   waits on the primary call
//! - comparison: the old backend is always primary; ab_test: the new
//!   backend is primary for a configured percentage of requests
//! - Exactly one log entry per dispatch; a failed append is traced and
//!   counted but never fails the request

pub mod diff;
pub mod engine;

pub use engine::ComparisonEngine;
