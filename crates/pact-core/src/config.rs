//! Validator configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for a [`HandoffValidator`](crate::validator::HandoffValidator).
///
/// Use [`ValidatorConfig::default`] and chain the setters (builder-style).
#[derive(Debug, Clone)]
pub struct ValidatorConfig {
    /// Per-condition and per-rollback execution timeout.
    pub timeout: Duration,
    /// Destination of the append-only audit log.
    pub log_file: PathBuf,
    /// Reserved retry policy hook. Accepted and surfaced in reports but not
    /// consulted by the control flow: the validator never retries
    /// automatically; retry decisions belong to the calling orchestrator.
    pub max_retries: u32,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(30_000),
            log_file: std::env::temp_dir().join("pact-validator.log"),
            max_retries: 3,
        }
    }
}

impl ValidatorConfig {
    /// Set the per-condition timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the audit log path.
    pub fn log_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.log_file = path.into();
        self
    }

    /// Set the reserved retry limit.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = ValidatorConfig::default();
        assert_eq!(config.timeout, Duration::from_millis(30_000));
        assert_eq!(config.max_retries, 3);
        assert!(config.log_file.ends_with("pact-validator.log"));
    }

    #[test]
    fn builder_setters() {
        let config = ValidatorConfig::default()
            .timeout(Duration::from_secs(1))
            .log_file("/tmp/custom.log")
            .max_retries(0);
        assert_eq!(config.timeout, Duration::from_secs(1));
        assert_eq!(config.log_file, PathBuf::from("/tmp/custom.log"));
        assert_eq!(config.max_retries, 0);
    }
}
