//! Access token records
//!
//! A token binds a short code to a caller-supplied payload for a fixed window.

use crate::error::{SessionError, SessionResult};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A one-time access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessToken {
    /// Fixed-width numeric code, the lookup key
    pub code: String,
    /// Opaque payload (e.g. a destination identifier)
    pub payload: String,
    /// When this token was issued
    pub issued_at: DateTime<Utc>,
    /// When this token stops being redeemable
    pub expires_at: DateTime<Utc>,
    /// Whether the token has been consumed
    pub redeemed: bool,
    /// When the token was consumed
    pub redeemed_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    /// Create an unredeemed token valid for `ttl` from `issued_at`.
    ///
    /// Fails with [`SessionError::InvalidTtl`] if the expiry is not representable.
    pub fn new(
        code: String,
        payload: String,
        issued_at: DateTime<Utc>,
        ttl: Duration,
    ) -> SessionResult<Self> {
        let expires_at = issued_at
            .checked_add_signed(ttl)
            .ok_or(SessionError::InvalidTtl)?;

        Ok(Self {
            code,
            payload,
            issued_at,
            expires_at,
            redeemed: false,
            redeemed_at: None,
        })
    }

    /// A token is expired from `expires_at` onwards
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Unexpired, whether or not it has been redeemed
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        !self.is_expired(now)
    }

    /// Current lifecycle state as observed at `now`
    pub fn state(&self, now: DateTime<Utc>) -> TokenState {
        if self.redeemed {
            TokenState::Redeemed
        } else if self.is_expired(now) {
            TokenState::Expired
        } else {
            TokenState::Issued
        }
    }

    /// Flip to redeemed. Returns false if it already was.
    pub(crate) fn mark_redeemed(&mut self, now: DateTime<Utc>) -> bool {
        if self.redeemed {
            return false;
        }
        self.redeemed = true;
        self.redeemed_at = Some(now);
        true
    }
}

/// Observable lifecycle of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenState {
    /// Redeemable
    Issued,
    /// Consumed once
    Redeemed,
    /// Past its expiry without being consumed
    Expired,
}
