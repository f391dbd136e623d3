//! Session manager
//!
//! Composes the store, issuer, redeemer and reaper behind the programmatic
//! surface the HTTP layer consumes. Each manager owns its own store, so tests
//! can build isolated instances with a [`ManualClock`](crate::ManualClock).

use crate::clock::{Clock, SystemClock};
use crate::error::{SessionError, SessionResult};
use crate::generator::{CodeGenerator, RandomCodeGenerator};
use crate::issuance::{IssuancePolicy, IssuanceService, IssuedCode};
use crate::reaper::{ExpiryReaper, ReaperHandle};
use crate::redemption::RedemptionService;
use crate::store::{InMemorySessionStore, SessionStore};
use crate::token::AccessToken;
use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, info};
use vrgate_core::{Config, MAX_SESSION_TTL_SECS};

/// Issues, redeems and reaps one-time access codes
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    issuer: IssuanceService,
    redeemer: RedemptionService,
    reaper: ExpiryReaper,
    default_ttl: Duration,
    reap_interval: std::time::Duration,
}

impl SessionManager {
    /// Create a manager with an in-memory store and the system clock
    pub fn new(config: &Config) -> Self {
        Self::with_parts(
            config,
            Arc::new(InMemorySessionStore::new()),
            Arc::new(SystemClock),
            Arc::new(RandomCodeGenerator::new(config.code_width)),
        )
    }

    /// Create a manager from explicit collaborators
    pub fn with_parts(
        config: &Config,
        store: Arc<dyn SessionStore>,
        clock: Arc<dyn Clock>,
        generator: Arc<dyn CodeGenerator>,
    ) -> Self {
        let reaper = ExpiryReaper::new(store.clone());
        let policy = IssuancePolicy {
            collision_threshold: config.collision_threshold,
            max_attempts: config.max_issue_attempts,
        };
        let code_width = generator.width();
        debug!(
            "Session manager: {}-digit codes ({} total), TTL {}s",
            code_width,
            config.code_space(),
            config.session_ttl_secs
        );

        Self {
            issuer: IssuanceService::new(generator, store.clone(), reaper.clone(), policy),
            redeemer: RedemptionService::new(store.clone(), code_width),
            reaper,
            store,
            clock,
            // Config may not have been validated
            default_ttl: Duration::seconds(config.session_ttl_secs.clamp(1, MAX_SESSION_TTL_SECS)),
            reap_interval: std::time::Duration::from_secs(config.reap_interval_secs),
        }
    }

    /// TTL applied by [`issue_default`](Self::issue_default)
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    /// Issue a code for `payload` valid for `ttl`
    pub async fn issue(&self, payload: &str, ttl: Duration) -> SessionResult<IssuedCode> {
        self.issuer.issue(payload, ttl, self.clock.now()).await
    }

    /// Issue a code with the configured TTL
    pub async fn issue_default(&self, payload: &str) -> SessionResult<IssuedCode> {
        self.issue(payload, self.default_ttl).await
    }

    /// Redeem a code, returning its payload
    pub async fn redeem(&self, code: &str) -> SessionResult<String> {
        self.redeemer.redeem(code, self.clock.now()).await
    }

    /// Remove expired entries now
    pub async fn sweep(&self) -> usize {
        self.reaper.sweep(self.clock.now()).await
    }

    /// Look up a redeemable token without consuming it
    pub async fn peek(&self, code: &str) -> SessionResult<AccessToken> {
        self.redeemer.validate_format(code)?;

        let token = self
            .store
            .get(code)
            .await
            .ok_or(SessionError::NotFound)?;
        if !token.is_live(self.clock.now()) {
            return Err(SessionError::Expired);
        }
        if token.redeemed {
            return Err(SessionError::AlreadyUsed);
        }
        Ok(token)
    }

    /// Withdraw a code regardless of its state
    pub async fn revoke(&self, code: &str) -> SessionResult<()> {
        self.redeemer.validate_format(code)?;

        if self.store.delete(code).await {
            info!("Session revoked: code {}", code);
            Ok(())
        } else {
            Err(SessionError::NotFound)
        }
    }

    /// Number of stored sessions, including expired ones awaiting a sweep
    pub async fn session_count(&self) -> usize {
        self.store.len().await
    }

    /// Number of stored sessions that have not yet expired
    pub async fn live_session_count(&self) -> usize {
        let now = self.clock.now();
        self.store
            .snapshot_keys()
            .await
            .into_iter()
            .filter(|(_, expires_at)| *expires_at > now)
            .count()
    }

    /// Start the background reaper at the configured interval
    pub fn start_reaper(&self) -> ReaperHandle {
        self.reaper.spawn(self.clock.clone(), self.reap_interval)
    }
}
