//! vrgate Server - Axum-based HTTP API
//!
//! This crate exposes session issuance and redemption over HTTP.

pub mod http;
pub mod state;

pub use http::create_router;
pub use state::AppState;
