//! vrgate Core - Shared configuration and error types
//!
//! This crate provides the foundational types used across all vrgate components.

pub mod config;
pub mod error;

pub use config::{Config, MAX_CODE_WIDTH, MAX_SESSION_TTL_SECS};
pub use error::{Error, Result};
