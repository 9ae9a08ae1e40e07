//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured tracing events, request_id correlated)
//!     → metrics.rs (counters and histograms, Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured fields over formatted strings; request_id flows through
//!   every subsystem
//! - Metric updates are cheap atomic operations on the hot path
//! - Comparison logs are mirrored as tracing events so an external
//!   collector can consume them without polling the store

pub mod logging;
pub mod metrics;
