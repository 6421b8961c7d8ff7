//! HTTP server for the Airlift OTA update server.
//!
//! This crate provides the HTTP surface:
//! - The Expo manifest negotiation endpoint
//! - The content-addressed asset endpoint with download accounting
//! - The update ingestion pipeline
//! - Admin endpoints (projects, updates, keys, stats, rollbacks)
//! - Health reporting

pub mod auth;
pub mod cors;
pub mod error;
pub mod handlers;
pub mod multipart;
pub mod routes;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
