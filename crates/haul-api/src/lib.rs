//! Axum HTTP API server.
//!
//! This crate provides:
//! - Download submission backed by the Redis job queue
//! - Live progress streaming over Server-Sent Events
//! - Single-serve artifact delivery
//! - Metadata lookups for the submission form
//! - Rate limiting, security headers, and Prometheus metrics

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod security;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
