//! Concurrent storage for live access tokens
//!
//! [`SessionStore`] is the seam between the services and the backing map. The
//! in-memory implementation keeps tokens in a sharded [`DashMap`]; every
//! per-code operation runs under that code's shard lock, which makes insert
//! and redeem atomic per key without serializing unrelated codes.

use crate::error::{StoreError, StoreResult};
use crate::token::AccessToken;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::debug;

/// Result of an atomic redeem attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RedeemOutcome {
    /// First redemption; carries the bound payload
    Success(String),
    /// Redeemed before
    AlreadyRedeemed,
    /// Past expiry. The entry has been deleted.
    Expired,
    /// No such code
    NotFound,
}

/// Keyed token storage with atomic per-code transitions.
///
/// Implementations backed by an external store need the same guarantees:
/// `insert` is check-and-set, and `try_redeem` runs its whole decision as one
/// indivisible step per code.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert a token under its code. Fails if the code is present, expired or not.
    async fn insert(&self, token: AccessToken) -> StoreResult<()>;

    /// Point lookup, no mutation
    async fn get(&self, code: &str) -> Option<AccessToken>;

    /// Look up, expire, or redeem `code` as a single atomic step
    async fn try_redeem(&self, code: &str, now: DateTime<Utc>) -> RedeemOutcome;

    /// Unconditional removal. Returns whether an entry existed.
    async fn delete(&self, code: &str) -> bool;

    /// Remove `code` only if it is expired at `now`
    async fn remove_expired(&self, code: &str, now: DateTime<Utc>) -> bool;

    /// Codes with their expiry, for sweeping
    async fn snapshot_keys(&self) -> Vec<(String, DateTime<Utc>)>;

    /// Number of stored entries, including expired ones not yet reaped
    async fn len(&self) -> usize;

    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

/// Process-local token store
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    tokens: DashMap<String, AccessToken>,
}

impl InMemorySessionStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store sized for `capacity` tokens
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            tokens: DashMap::with_capacity(capacity),
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn insert(&self, token: AccessToken) -> StoreResult<()> {
        match self.tokens.entry(token.code.clone()) {
            Entry::Occupied(_) => Err(StoreError::Collision(token.code)),
            Entry::Vacant(slot) => {
                slot.insert(token);
                Ok(())
            }
        }
    }

    async fn get(&self, code: &str) -> Option<AccessToken> {
        self.tokens.get(code).map(|t| t.value().clone())
    }

    async fn try_redeem(&self, code: &str, now: DateTime<Utc>) -> RedeemOutcome {
        // Probe first so unknown codes never allocate a key
        if !self.tokens.contains_key(code) {
            return RedeemOutcome::NotFound;
        }

        match self.tokens.entry(code.to_string()) {
            Entry::Vacant(_) => RedeemOutcome::NotFound,
            Entry::Occupied(mut entry) => {
                if entry.get().is_expired(now) {
                    entry.remove();
                    debug!("Dropped expired code {} on redeem", code);
                    RedeemOutcome::Expired
                } else if entry.get_mut().mark_redeemed(now) {
                    RedeemOutcome::Success(entry.get().payload.clone())
                } else {
                    RedeemOutcome::AlreadyRedeemed
                }
            }
        }
    }

    async fn delete(&self, code: &str) -> bool {
        self.tokens.remove(code).is_some()
    }

    async fn remove_expired(&self, code: &str, now: DateTime<Utc>) -> bool {
        self.tokens
            .remove_if(code, |_, token| token.is_expired(now))
            .is_some()
    }

    async fn snapshot_keys(&self) -> Vec<(String, DateTime<Utc>)> {
        self.tokens
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().expires_at))
            .collect()
    }

    async fn len(&self) -> usize {
        self.tokens.len()
    }
}
