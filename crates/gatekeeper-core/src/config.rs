//! Workflow configuration
//!
//! Every section defaults to the canonical values, so an empty TOML document
//! is a valid configuration:
//!
//! ```toml
//! [risk.weights]
//! complexity = 0.4
//! security = 0.3
//! files_changed = 0.2
//! test_coverage_gap = 0.1
//!
//! [quorum]
//! high = 2
//!
//! [sla]
//! critical_hours = 8
//! ```

use crate::comment::DEFAULT_MAX_BODY_LEN;
use crate::error::ReviewError;
use crate::escalation::SlaPolicy;
use crate::quorum::QuorumPolicy;
use crate::risk::{RiskScorer, RiskWeights, TierThresholds};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Risk scoring section
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskConfig {
    /// Factor weights
    pub weights: RiskWeights,
    /// Tier thresholds
    pub thresholds: TierThresholds,
}

/// Comment section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentConfig {
    /// Maximum body length in characters
    pub max_body_len: usize,
}

impl Default for CommentConfig {
    fn default() -> Self {
        Self {
            max_body_len: DEFAULT_MAX_BODY_LEN,
        }
    }
}

/// Escalation loop section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Seconds between escalation ticks
    pub tick_interval_secs: u64,
}

impl SchedulerConfig {
    /// Tick interval
    #[inline]
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_interval_secs: 60,
        }
    }
}

/// Environment provisioning section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvironmentConfig {
    /// Seconds to wait for the provisioning port before giving up
    pub provision_timeout_secs: u64,
}

impl EnvironmentConfig {
    /// Provisioning timeout
    #[inline]
    #[must_use]
    pub fn provision_timeout(&self) -> Duration {
        Duration::from_secs(self.provision_timeout_secs)
    }
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            provision_timeout_secs: 120,
        }
    }
}

/// Complete workflow configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Risk scoring
    pub risk: RiskConfig,
    /// Approval quorum per tier
    pub quorum: QuorumPolicy,
    /// SLA thresholds per tier
    pub sla: SlaPolicy,
    /// Comment limits
    pub comments: CommentConfig,
    /// Escalation loop
    pub scheduler: SchedulerConfig,
    /// Environment provisioning
    pub environment: EnvironmentConfig,
}

impl WorkflowConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With risk weights
    #[inline]
    #[must_use]
    pub fn with_weights(mut self, weights: RiskWeights) -> Self {
        self.risk.weights = weights;
        self
    }

    /// With quorum policy
    #[inline]
    #[must_use]
    pub fn with_quorum(mut self, quorum: QuorumPolicy) -> Self {
        self.quorum = quorum;
        self
    }

    /// With SLA policy
    #[inline]
    #[must_use]
    pub fn with_sla(mut self, sla: SlaPolicy) -> Self {
        self.sla = sla;
        self
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(source: &str) -> Result<Self, ReviewError> {
        let config: Self =
            toml::from_str(source).map_err(|e| ReviewError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ReviewError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)
            .map_err(|e| ReviewError::Config(format!("reading {}: {e}", path.display())))?;
        tracing::debug!("Loading workflow configuration from {}", path.display());
        Self::from_toml_str(&source)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String, ReviewError> {
        toml::to_string_pretty(self).map_err(|e| ReviewError::Config(e.to_string()))
    }

    /// Check cross-field consistency
    pub fn validate(&self) -> Result<(), ReviewError> {
        self.risk.weights.validate()?;
        self.risk.thresholds.validate()?;
        self.quorum.validate()?;
        if self.comments.max_body_len == 0 {
            return Err(ReviewError::Config(
                "comments.max_body_len must be positive".to_string(),
            ));
        }
        if self.scheduler.tick_interval_secs == 0 {
            return Err(ReviewError::Config(
                "scheduler.tick_interval_secs must be positive".to_string(),
            ));
        }
        if self.environment.provision_timeout_secs == 0 {
            return Err(ReviewError::Config(
                "environment.provision_timeout_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Scorer for the configured weights and thresholds
    pub fn scorer(&self) -> Result<RiskScorer, ReviewError> {
        RiskScorer::new(self.risk.weights, self.risk.thresholds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn empty_document_yields_defaults() {
        let config = WorkflowConfig::from_toml_str("").unwrap();
        assert_eq!(config, WorkflowConfig::default());
        assert_eq!(config.quorum.critical, 3);
        assert_eq!(config.sla.low_hours, 72);
        assert_eq!(config.scheduler.tick_interval(), Duration::from_secs(60));
    }

    #[test]
    fn partial_override() {
        let config = WorkflowConfig::from_toml_str(
            r#"
            [quorum]
            high = 3
            critical = 4

            [sla]
            critical_hours = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.quorum.high, 3);
        assert_eq!(config.quorum.medium, 1);
        assert_eq!(config.sla.critical_hours, 2);
        assert_eq!(config.sla.high_hours, 24);
    }

    #[test]
    fn invalid_weights_rejected_on_load() {
        let err = WorkflowConfig::from_toml_str(
            r#"
            [risk.weights]
            complexity = 0.5
            security = 0.5
            files_changed = 0.5
            test_coverage_gap = 0.0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ReviewError::InvalidWeightConfiguration(_)));
    }

    #[test]
    fn unparsable_document_is_config_error() {
        let err = WorkflowConfig::from_toml_str("[quorum\nhigh = ").unwrap_err();
        assert!(matches!(err, ReviewError::Config(_)));
    }

    #[test]
    fn load_from_file_round_trip() {
        let config = WorkflowConfig::new().with_quorum(QuorumPolicy {
            low: 1,
            medium: 2,
            high: 2,
            critical: 5,
        });
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(config.to_toml_string().unwrap().as_bytes()).unwrap();

        let loaded = WorkflowConfig::load(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = WorkflowConfig::load("/nonexistent/gatekeeper.toml").unwrap_err();
        assert!(matches!(err, ReviewError::Config(_)));
    }
}
