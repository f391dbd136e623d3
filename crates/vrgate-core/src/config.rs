//! Configuration types for vrgate

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Largest code width whose code space still fits in a `u32`
pub const MAX_CODE_WIDTH: usize = 9;

/// Longest session TTL accepted, one year
pub const MAX_SESSION_TTL_SECS: i64 = 365 * 24 * 60 * 60;

/// Main configuration for vrgate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Server port
    pub port: u16,
    /// Number of digits in an access code
    pub code_width: usize,
    /// Seconds an issued code stays redeemable
    pub session_ttl_secs: i64,
    /// Seconds between background sweeps of expired codes
    pub reap_interval_secs: u64,
    /// Consecutive collisions tolerated before a synchronous sweep
    pub collision_threshold: u32,
    /// Issuance attempts allowed before giving up
    pub max_issue_attempts: u32,
    /// Viewer URL embedded in QR deep links
    pub viewer_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            code_width: 6,
            session_ttl_secs: 10 * 60,
            reap_interval_secs: 2 * 60,
            collision_threshold: 100,
            max_issue_attempts: 5000,
            viewer_url: "http://localhost:3000/panorama".to_string(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a configuration from a JSON file. Missing fields keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Builder pattern: set port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Builder pattern: set code width
    pub fn with_code_width(mut self, width: usize) -> Self {
        self.code_width = width;
        self
    }

    /// Builder pattern: set session TTL in seconds
    pub fn with_session_ttl_secs(mut self, secs: i64) -> Self {
        self.session_ttl_secs = secs;
        self
    }

    /// Builder pattern: set reap interval in seconds
    pub fn with_reap_interval_secs(mut self, secs: u64) -> Self {
        self.reap_interval_secs = secs;
        self
    }

    /// Builder pattern: set collision threshold
    pub fn with_collision_threshold(mut self, threshold: u32) -> Self {
        self.collision_threshold = threshold;
        self
    }

    /// Builder pattern: set issuance attempt budget
    pub fn with_max_issue_attempts(mut self, attempts: u32) -> Self {
        self.max_issue_attempts = attempts;
        self
    }

    /// Builder pattern: set viewer URL
    pub fn with_viewer_url(mut self, url: impl Into<String>) -> Self {
        self.viewer_url = url.into();
        self
    }

    /// Total number of distinct codes for the configured width
    pub fn code_space(&self) -> u64 {
        10u64.saturating_pow(self.code_width as u32)
    }

    /// Check that every field is usable
    pub fn validate(&self) -> Result<()> {
        if self.code_width == 0 || self.code_width > MAX_CODE_WIDTH {
            return Err(Error::config(format!(
                "code width must be between 1 and {}, got {}",
                MAX_CODE_WIDTH, self.code_width
            )));
        }
        if self.session_ttl_secs <= 0 || self.session_ttl_secs > MAX_SESSION_TTL_SECS {
            return Err(Error::config(format!(
                "session TTL must be between 1 and {} seconds, got {}",
                MAX_SESSION_TTL_SECS, self.session_ttl_secs
            )));
        }
        if self.reap_interval_secs == 0 {
            return Err(Error::config("reap interval must be positive"));
        }
        if self.collision_threshold == 0 {
            return Err(Error::config("collision threshold must be positive"));
        }
        if self.max_issue_attempts == 0 {
            return Err(Error::config("issuance attempt budget must be positive"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.code_width, 6);
        assert_eq!(config.session_ttl_secs, 600);
        assert_eq!(config.reap_interval_secs, 120);
        assert_eq!(config.code_space(), 1_000_000);
    }

    #[test]
    fn test_builder() {
        let config = Config::new()
            .with_port(8080)
            .with_code_width(4)
            .with_session_ttl_secs(30)
            .with_collision_threshold(10)
            .with_max_issue_attempts(50);
        assert_eq!(config.port, 8080);
        assert_eq!(config.code_space(), 10_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_width_rejected() {
        assert!(Config::new().with_code_width(0).validate().is_err());
        assert!(Config::new().with_code_width(10).validate().is_err());
        assert_eq!(Config::new().with_code_width(usize::MAX).code_space(), u64::MAX);
    }

    #[test]
    fn test_invalid_durations_rejected() {
        assert!(Config::new().with_session_ttl_secs(0).validate().is_err());
        assert!(Config::new().with_session_ttl_secs(i64::MAX).validate().is_err());
        assert!(Config::new()
            .with_session_ttl_secs(MAX_SESSION_TTL_SECS + 1)
            .validate()
            .is_err());
        assert!(Config::new()
            .with_session_ttl_secs(MAX_SESSION_TTL_SECS)
            .validate()
            .is_ok());
        assert!(Config::new().with_reap_interval_secs(0).validate().is_err());
        assert!(Config::new().with_max_issue_attempts(0).validate().is_err());
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: Config = serde_json::from_str(r#"{"port": 4000}"#).unwrap();
        assert_eq!(config.port, 4000);
        assert_eq!(config.code_width, 6);
    }
}
