//! Session error types

use thiserror::Error;

/// Errors surfaced to callers of issuance and redemption
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("Missing or invalid payload")]
    InvalidPayload,
    #[error("TTL must be positive and within the representable time range")]
    InvalidTtl,
    #[error("Invalid code format, must be {width} digits")]
    InvalidFormat { width: usize },
    #[error("Code not found or expired")]
    NotFound,
    #[error("Code has expired")]
    Expired,
    #[error("Code has already been used")]
    AlreadyUsed,
    #[error("Could not find a free code after {attempts} attempts")]
    IssuanceExhausted { attempts: u32 },
}

pub type SessionResult<T> = Result<T, SessionError>;

/// Store errors, never surfaced past the issuer
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Code {0} is already taken")]
    Collision(String),
}

pub type StoreResult<T> = Result<T, StoreError>;
