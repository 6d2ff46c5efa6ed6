//! Approval quorum by risk tier

use crate::error::ReviewError;
use crate::risk::RiskTier;
use serde::{Deserialize, Serialize};

/// Minimum distinct approvals per tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuorumPolicy {
    /// Approvals for `Low`
    pub low: usize,
    /// Approvals for `Medium`
    pub medium: usize,
    /// Approvals for `High`
    pub high: usize,
    /// Approvals for `Critical`
    pub critical: usize,
}

impl QuorumPolicy {
    /// Approvals required for `tier`
    #[inline]
    #[must_use]
    pub fn required(&self, tier: RiskTier) -> usize {
        match tier {
            RiskTier::Low => self.low,
            RiskTier::Medium => self.medium,
            RiskTier::High => self.high,
            RiskTier::Critical => self.critical,
        }
    }

    /// Every tier needs at least one approval, and riskier tiers never need fewer
    pub fn validate(&self) -> Result<(), ReviewError> {
        let counts = [self.low, self.medium, self.high, self.critical];
        if counts.contains(&0) {
            return Err(ReviewError::Config(
                "quorum must require at least one approval per tier".to_string(),
            ));
        }
        if counts.windows(2).any(|w| w[0] > w[1]) {
            return Err(ReviewError::Config(format!(
                "quorum must not decrease with risk: {counts:?}"
            )));
        }
        Ok(())
    }
}

impl Default for QuorumPolicy {
    fn default() -> Self {
        Self {
            low: 1,
            medium: 1,
            high: 2,
            critical: 3,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_quorum_by_tier() {
        let q = QuorumPolicy::default();
        assert_eq!(q.required(RiskTier::Low), 1);
        assert_eq!(q.required(RiskTier::Medium), 1);
        assert_eq!(q.required(RiskTier::High), 2);
        assert_eq!(q.required(RiskTier::Critical), 3);
        assert!(q.validate().is_ok());
    }

    #[test]
    fn zero_or_decreasing_quorum_rejected() {
        let zero = QuorumPolicy {
            low: 0,
            ..QuorumPolicy::default()
        };
        assert!(zero.validate().is_err());

        let decreasing = QuorumPolicy {
            high: 4,
            ..QuorumPolicy::default()
        };
        assert!(decreasing.validate().is_err());
    }
}
