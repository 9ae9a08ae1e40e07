//! Rule-driven API routing gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!                         ┌──────────────────────────────────────────────┐
//!                         │               ROUTING GATEWAY                 │
//!                         │                                               │
//!   Client Request        │  ┌────────┐   ┌──────────┐   ┌────────────┐  │
//!   ──────────────────────┼─▶│  http  │──▶│ routing  │──▶│  strategy  │  │
//!                         │  │ server │   │ matcher  │   │  dispatch  │  │
//!                         │  └────────┘   └──────────┘   └─────┬──────┘  │
//!                         │                                     │         │
//!                         │              direct ────────────────┤         │
//!                         │              orchestration ─────────┤         │     Backend
//!                         │              comparison/ab_test ────┤         │     Servers
//!                         │                                     ▼         │
//!   Client Response       │                              ┌────────────┐  │
//!   ◀─────────────────────┼──────────────────────────────│  upstream  │◀─┼────▶
//!                         │                              │   caller   │  │
//!                         │                              └────────────┘  │
//!                         │  ┌─────────────────────────────────────────┐ │
//!                         │  │           Cross-Cutting Concerns         │ │
//!                         │  │  config · store (rules, hot reload)      │ │
//!                         │  │  resilience · observability · lifecycle  │ │
//!                         │  └─────────────────────────────────────────┘ │
//!                         └──────────────────────────────────────────────┘
//! ```
//!
//! Inbound requests match against persisted routing rules; the winning
//! rule's strategy decides the path: a direct forward, a multi-step
//! orchestration, or a dual dispatch that shadows a second backend and
//! diffs the responses.

// Core subsystems
pub mod comparison;
pub mod config;
pub mod http;
pub mod orchestration;
pub mod routing;
pub mod store;
pub mod upstream;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::GatewayConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use routing::RoutingEngine;
pub use store::{RuleStore, SnapshotStore};
