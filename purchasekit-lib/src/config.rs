//! Configuration types for the purchase manager.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{PurchaseKitError, Result};

/// How repeated finalize requests for the same transaction are handled.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalizePolicy {
    /// Track finalized transaction ids and skip repeats.
    #[default]
    OncePerTransaction,
    /// Forward every finalize to the provider and let it dedupe.
    Always,
}

/// Configuration for a purchase manager.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Start the update listener as soon as the manager is built.
    #[serde(default = "default_start_listener")]
    pub start_listener: bool,

    /// Finalize deduplication policy.
    #[serde(default)]
    pub finalize_policy: FinalizePolicy,

    /// Number of finalized transaction ids remembered; oldest are evicted first.
    #[serde(default = "default_finalized_capacity")]
    pub finalized_capacity: usize,

    /// Timeout applied to each provider call. `None` waits for the provider.
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

fn default_start_listener() -> bool {
    true
}

fn default_finalized_capacity() -> usize {
    1024
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            start_listener: default_start_listener(),
            finalize_policy: FinalizePolicy::default(),
            finalized_capacity: default_finalized_capacity(),
            request_timeout_secs: None,
        }
    }
}

impl ManagerConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a JSON configuration document; missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Set whether the listener starts on build.
    pub fn with_start_listener(mut self, start: bool) -> Self {
        self.start_listener = start;
        self
    }

    /// Set the finalize policy.
    pub fn with_finalize_policy(mut self, policy: FinalizePolicy) -> Self {
        self.finalize_policy = policy;
        self
    }

    /// Set the finalized-id ledger capacity.
    pub fn with_finalized_capacity(mut self, capacity: usize) -> Self {
        self.finalized_capacity = capacity;
        self
    }

    /// Set the provider request timeout.
    pub fn with_request_timeout(mut self, secs: u64) -> Self {
        self.request_timeout_secs = Some(secs);
        self
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Check the configuration for values the manager cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.finalized_capacity == 0 {
            return Err(PurchaseKitError::InvalidConfig(
                "finalized_capacity must be greater than zero".into(),
            ));
        }
        if self.request_timeout_secs == Some(0) {
            return Err(PurchaseKitError::InvalidConfig(
                "request_timeout_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_json() {
        let config = ManagerConfig::from_json_str("{}").unwrap();
        assert_eq!(config, ManagerConfig::default());
        assert!(config.start_listener);
        assert_eq!(config.finalize_policy, FinalizePolicy::OncePerTransaction);
        assert_eq!(config.request_timeout(), None);
    }

    #[test]
    fn test_partial_json() {
        let config = ManagerConfig::from_json_str(
            r#"{"finalize_policy": "always", "request_timeout_secs": 30}"#,
        )
        .unwrap();
        assert_eq!(config.finalize_policy, FinalizePolicy::Always);
        assert_eq!(config.request_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.finalized_capacity, 1024);
    }

    #[test]
    fn test_validation() {
        assert!(ManagerConfig::new()
            .with_finalized_capacity(0)
            .validate()
            .is_err());
        assert!(ManagerConfig::from_json_str(r#"{"request_timeout_secs": 0}"#).is_err());
        assert!(ManagerConfig::from_json_str("not json").is_err());
    }
}
