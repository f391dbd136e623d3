//! Code issuance
//!
//! Draws candidates until one inserts cleanly. Repeated collisions trigger a
//! synchronous sweep, since expired-but-unreaped entries inflate apparent
//! saturation. A hard attempt budget bounds the worst case.

use crate::error::{SessionError, SessionResult, StoreError};
use crate::generator::CodeGenerator;
use crate::reaper::ExpiryReaper;
use crate::store::SessionStore;
use crate::token::AccessToken;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default consecutive collisions before a synchronous sweep
pub const DEFAULT_COLLISION_THRESHOLD: u32 = 100;

/// Default attempt budget per issuance
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5000;

/// Retry limits for issuance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuancePolicy {
    /// Consecutive collisions before sweeping
    pub collision_threshold: u32,
    /// Attempts before giving up
    pub max_attempts: u32,
}

impl Default for IssuancePolicy {
    fn default() -> Self {
        Self {
            collision_threshold: DEFAULT_COLLISION_THRESHOLD,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

/// A freshly minted code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCode {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

/// Mints unique codes bound to payloads
pub struct IssuanceService {
    generator: Arc<dyn CodeGenerator>,
    store: Arc<dyn SessionStore>,
    reaper: ExpiryReaper,
    policy: IssuancePolicy,
}

impl IssuanceService {
    /// Create an issuer over `store`
    pub fn new(
        generator: Arc<dyn CodeGenerator>,
        store: Arc<dyn SessionStore>,
        reaper: ExpiryReaper,
        policy: IssuancePolicy,
    ) -> Self {
        Self {
            generator,
            store,
            reaper,
            policy,
        }
    }

    /// Issue a code for `payload` valid for `ttl` from `now`
    pub async fn issue(
        &self,
        payload: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> SessionResult<IssuedCode> {
        if payload.trim().is_empty() {
            return Err(SessionError::InvalidPayload);
        }
        if ttl <= Duration::zero() || now.checked_add_signed(ttl).is_none() {
            return Err(SessionError::InvalidTtl);
        }

        let mut collisions = 0u32;

        for attempt in 1..=self.policy.max_attempts {
            let code = self.generator.generate();
            let token = AccessToken::new(code.clone(), payload.to_string(), now, ttl)?;
            let expires_at = token.expires_at;

            match self.store.insert(token).await {
                Ok(()) => {
                    if attempt > 1 {
                        debug!("Issued code after {} attempts", attempt);
                    }
                    info!("Session created: code {} -> {}", code, payload);
                    return Ok(IssuedCode { code, expires_at });
                }
                Err(StoreError::Collision(_)) => {
                    collisions += 1;
                    if collisions >= self.policy.collision_threshold {
                        let removed = self.reaper.sweep(now).await;
                        warn!(
                            "{} consecutive code collisions, swept {} expired session(s)",
                            collisions, removed
                        );
                        collisions = 0;
                    }
                }
            }
        }

        warn!(
            "Code space saturated: no free code after {} attempts",
            self.policy.max_attempts
        );
        Err(SessionError::IssuanceExhausted {
            attempts: self.policy.max_attempts,
        })
    }
}
