//! vrgate Session - One-time access codes for kiosk devices
//!
//! Lets a device without a camera (e.g. a VR headset) reach a destination by
//! typing a short numeric code instead of scanning a QR code.
//!
//! # Flow
//!
//! 1. A companion device calls [`SessionManager::issue`] with a payload
//!    (typically a destination identifier) and gets a 6-digit code back
//! 2. The code is shown to the user, who types it on the headset
//! 3. The headset calls [`SessionManager::redeem`]; the first call returns the
//!    payload, every later call fails
//! 4. Codes expire after their TTL and are swept by [`ExpiryReaper`]
//!
//! # Example
//!
//! ```no_run
//! use vrgate_core::Config;
//! use vrgate_session::SessionManager;
//!
//! async fn example() {
//!     let manager = SessionManager::new(&Config::default());
//!     let reaper = manager.start_reaper();
//!
//!     let issued = manager.issue_default("barcelona").await.unwrap();
//!     println!("Enter code on headset: {}", issued.code);
//!
//!     let destination = manager.redeem(&issued.code).await.unwrap();
//!     assert_eq!(destination, "barcelona");
//!
//!     reaper.stop().await;
//! }
//! ```

pub mod clock;
pub mod error;
pub mod generator;
pub mod issuance;
pub mod manager;
pub mod reaper;
pub mod redemption;
pub mod store;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{SessionError, SessionResult, StoreError, StoreResult};
pub use generator::{is_valid_code, CodeGenerator, RandomCodeGenerator};
pub use issuance::{IssuancePolicy, IssuanceService, IssuedCode};
pub use manager::SessionManager;
pub use reaper::{ExpiryReaper, ReaperHandle, DEFAULT_REAP_INTERVAL};
pub use redemption::RedemptionService;
pub use store::{InMemorySessionStore, RedeemOutcome, SessionStore};
pub use token::{AccessToken, TokenState};
