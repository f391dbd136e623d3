//! Code redemption
//!
//! Precedence is fixed: format, then the store's atomic redeem. Every outcome
//! is terminal for the call.

use crate::error::{SessionError, SessionResult};
use crate::generator::is_valid_code;
use crate::store::{RedeemOutcome, SessionStore};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

/// Consumes codes exactly once
pub struct RedemptionService {
    store: Arc<dyn SessionStore>,
    code_width: usize,
}

impl RedemptionService {
    /// Create a redeemer for `code_width`-digit codes
    pub fn new(store: Arc<dyn SessionStore>, code_width: usize) -> Self {
        Self { store, code_width }
    }

    /// Check the shape of `code` without touching the store
    pub fn validate_format(&self, code: &str) -> SessionResult<()> {
        if is_valid_code(code, self.code_width) {
            Ok(())
        } else {
            Err(SessionError::InvalidFormat {
                width: self.code_width,
            })
        }
    }

    /// Redeem `code` at `now`, returning its payload
    pub async fn redeem(&self, code: &str, now: DateTime<Utc>) -> SessionResult<String> {
        self.validate_format(code)?;

        match self.store.try_redeem(code, now).await {
            RedeemOutcome::Success(payload) => {
                info!("Session validated: code {} -> {}", code, payload);
                Ok(payload)
            }
            RedeemOutcome::NotFound => {
                debug!("Unknown code {}", code);
                Err(SessionError::NotFound)
            }
            RedeemOutcome::Expired => {
                debug!("Expired code {}", code);
                Err(SessionError::Expired)
            }
            RedeemOutcome::AlreadyRedeemed => {
                debug!("Reused code {}", code);
                Err(SessionError::AlreadyUsed)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemorySessionStore;
    use crate::token::AccessToken;
    use chrono::Duration;

    async fn setup(code: &str, issued_at: DateTime<Utc>) -> (RedemptionService, Arc<InMemorySessionStore>) {
        let store = Arc::new(InMemorySessionStore::new());
        store
            .insert(AccessToken::new(
                code.to_string(),
                "barcelona".to_string(),
                issued_at,
                Duration::minutes(10),
            )
            .unwrap())
            .await
            .unwrap();
        (RedemptionService::new(store.clone(), 6), store)
    }

    #[tokio::test]
    async fn test_redeem_once() {
        let now = Utc::now();
        let (service, _store) = setup("123456", now).await;

        let within = now + Duration::minutes(10) - Duration::milliseconds(1);
        assert_eq!(service.redeem("123456", within).await.unwrap(), "barcelona");
        assert_eq!(
            service.redeem("123456", within).await,
            Err(SessionError::AlreadyUsed)
        );
    }

    #[tokio::test]
    async fn test_redeem_expired_then_not_found() {
        let now = Utc::now();
        // expires_at = now - 1000ms
        let (service, store) =
            setup("123456", now - Duration::minutes(10) - Duration::milliseconds(1000)).await;

        assert_eq!(service.redeem("123456", now).await, Err(SessionError::Expired));
        assert!(store.is_empty().await);
        assert_eq!(service.redeem("123456", now).await, Err(SessionError::NotFound));
    }

    #[tokio::test]
    async fn test_redeem_at_exact_expiry_is_expired() {
        let now = Utc::now();
        let (service, _store) = setup("123456", now).await;

        assert_eq!(
            service.redeem("123456", now + Duration::minutes(10)).await,
            Err(SessionError::Expired)
        );
    }

    #[tokio::test]
    async fn test_redeem_unknown_code() {
        let now = Utc::now();
        let (service, _store) = setup("123456", now).await;

        assert_eq!(service.redeem("999999", now).await, Err(SessionError::NotFound));
    }

    #[tokio::test]
    async fn test_bad_format_leaves_store_untouched() {
        let now = Utc::now();
        let (service, store) = setup("123456", now).await;

        for code in ["abc", "1234567", "12345", "", "12 456"] {
            assert_eq!(
                service.redeem(code, now).await,
                Err(SessionError::InvalidFormat { width: 6 })
            );
        }

        let token = store.get("123456").await.unwrap();
        assert!(!token.redeemed);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn test_format_checked_before_expiry() {
        let now = Utc::now();
        let (service, store) = setup("123456", now - Duration::hours(1)).await;

        assert!(matches!(
            service.redeem("12345x", now).await,
            Err(SessionError::InvalidFormat { .. })
        ));
        // Expired entry is not opportunistically removed by a rejected call
        assert_eq!(store.len().await, 1);
    }
}
