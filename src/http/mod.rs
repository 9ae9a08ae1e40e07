//! Inbound HTTP subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware, body buffering)
//!     → routing engine (rule match, strategy dispatch)
//!     → response to client
//! ```

pub mod server;

pub use server::HttpServer;
