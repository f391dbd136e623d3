//! Shared application state

use std::sync::Arc;
use vrgate_core::Config;
use vrgate_session::SessionManager;

/// Shared application state
pub struct AppState {
    /// Configuration
    pub config: Config,
    /// Session manager for code issuance and redemption
    pub session_manager: Arc<SessionManager>,
}

impl AppState {
    /// Create a new application state
    pub fn new(config: Config, session_manager: Arc<SessionManager>) -> Self {
        Self {
            config,
            session_manager,
        }
    }

    /// Deep link embedded in QR codes for `pin`
    pub fn viewer_link(&self, pin: &str) -> String {
        let separator = if self.config.viewer_url.contains('?') {
            '&'
        } else {
            '?'
        };
        format!(
            "{}{}pin={}&autoVR=true",
            self.config.viewer_url, separator, pin
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_viewer_link() {
        let config = Config::new().with_viewer_url("https://vr.example.com/panorama");
        let manager = Arc::new(SessionManager::new(&config));
        let state = AppState::new(config, manager);
        assert_eq!(
            state.viewer_link("123456"),
            "https://vr.example.com/panorama?pin=123456&autoVR=true"
        );
    }

    #[test]
    fn test_viewer_link_with_query() {
        let config = Config::new().with_viewer_url("https://vr.example.com/?lang=fr");
        let manager = Arc::new(SessionManager::new(&config));
        let state = AppState::new(config, manager);
        assert_eq!(
            state.viewer_link("000042"),
            "https://vr.example.com/?lang=fr&pin=000042&autoVR=true"
        );
    }
}
