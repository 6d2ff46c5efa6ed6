//! Multi-factor risk scoring
//!
//! Turns four externally supplied factors into a weighted composite score
//! and a discrete [`RiskTier`]. Scoring is pure and deterministic.

use crate::error::ReviewError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Allowed deviation of the weight sum from 1.0
pub const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Raw risk factors, each in `[0.0, 1.0]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskFactors {
    /// Structural complexity of the change
    pub complexity: f64,
    /// Security sensitivity of the touched code
    pub security: f64,
    /// Breadth of the change (normalized file count)
    pub files_changed: f64,
    /// Share of the change not covered by tests
    pub test_coverage_gap: f64,
}

impl RiskFactors {
    /// Create factors
    #[inline]
    #[must_use]
    pub fn new(complexity: f64, security: f64, files_changed: f64, test_coverage_gap: f64) -> Self {
        Self {
            complexity,
            security,
            files_changed,
            test_coverage_gap,
        }
    }

    /// Factors in weight order
    #[inline]
    #[must_use]
    pub fn as_array(&self) -> [f64; 4] {
        [
            self.complexity,
            self.security,
            self.files_changed,
            self.test_coverage_gap,
        ]
    }

    /// Fail unless every factor lies in `[0.0, 1.0]`
    pub fn validate(&self) -> Result<(), ReviewError> {
        for (name, value) in FACTOR_NAMES.iter().zip(self.as_array()) {
            if !(0.0..=1.0).contains(&value) {
                return Err(ReviewError::InvalidWeightConfiguration(format!(
                    "factor {name} = {value} is outside [0, 1]"
                )));
            }
        }
        Ok(())
    }
}

const FACTOR_NAMES: [&str; 4] = ["complexity", "security", "files_changed", "test_coverage_gap"];

/// Weight per factor. Non-negative, summing to 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    /// Weight of `complexity`
    pub complexity: f64,
    /// Weight of `security`
    pub security: f64,
    /// Weight of `files_changed`
    pub files_changed: f64,
    /// Weight of `test_coverage_gap`
    pub test_coverage_gap: f64,
}

impl RiskWeights {
    /// Create weights
    #[inline]
    #[must_use]
    pub fn new(complexity: f64, security: f64, files_changed: f64, test_coverage_gap: f64) -> Self {
        Self {
            complexity,
            security,
            files_changed,
            test_coverage_gap,
        }
    }

    /// Weights in factor order
    #[inline]
    #[must_use]
    pub fn as_array(&self) -> [f64; 4] {
        [
            self.complexity,
            self.security,
            self.files_changed,
            self.test_coverage_gap,
        ]
    }

    /// Fail unless weights are finite, non-negative and sum to 1.0
    pub fn validate(&self) -> Result<(), ReviewError> {
        let weights = self.as_array();
        if let Some((name, w)) = FACTOR_NAMES
            .iter()
            .zip(weights)
            .find(|(_, w)| !w.is_finite() || *w < 0.0)
        {
            return Err(ReviewError::InvalidWeightConfiguration(format!(
                "weight {name} = {w} must be a non-negative number"
            )));
        }

        let sum: f64 = weights.iter().sum();
        if (sum - 1.0).abs() > WEIGHT_TOLERANCE {
            return Err(ReviewError::InvalidWeightConfiguration(format!(
                "weights sum to {sum}, expected 1.0"
            )));
        }
        Ok(())
    }
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self::new(0.4, 0.3, 0.2, 0.1)
    }
}

/// Discrete risk classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTier {
    /// Composite below the medium threshold
    Low,
    /// Medium
    Medium,
    /// High
    High,
    /// At or above the critical threshold
    Critical,
}

impl RiskTier {
    /// All tiers, lowest first
    pub const ALL: [RiskTier; 4] = [
        RiskTier::Low,
        RiskTier::Medium,
        RiskTier::High,
        RiskTier::Critical,
    ];
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RiskTier::Low => "low",
            RiskTier::Medium => "medium",
            RiskTier::High => "high",
            RiskTier::Critical => "critical",
        };
        f.write_str(name)
    }
}

/// Inclusive lower bounds of the upper three tiers
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierThresholds {
    /// Lower bound of `Medium`
    pub medium: f64,
    /// Lower bound of `High`
    pub high: f64,
    /// Lower bound of `Critical`
    pub critical: f64,
}

impl TierThresholds {
    /// Fail unless `0 < medium < high < critical <= 1`
    pub fn validate(&self) -> Result<(), ReviewError> {
        let ordered = 0.0 < self.medium
            && self.medium < self.high
            && self.high < self.critical
            && self.critical <= 1.0;
        if ordered {
            Ok(())
        } else {
            Err(ReviewError::Config(format!(
                "tier thresholds must increase within (0, 1]: medium={}, high={}, critical={}",
                self.medium, self.high, self.critical
            )))
        }
    }

    /// Map a composite score to its tier
    #[must_use]
    pub fn classify(&self, composite: f64) -> RiskTier {
        if composite >= self.critical {
            RiskTier::Critical
        } else if composite >= self.high {
            RiskTier::High
        } else if composite >= self.medium {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            medium: 0.3,
            high: 0.55,
            critical: 0.8,
        }
    }
}

/// Result of scoring one version of a review's content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    /// Input factors
    pub factors: RiskFactors,
    /// Weights used
    pub weights: RiskWeights,
    /// Weighted sum, in `[0.0, 1.0]`
    pub composite: f64,
    /// Derived tier
    pub tier: RiskTier,
}

/// Score `factors` with `weights`, classifying with `thresholds`.
///
/// # Errors
/// `InvalidWeightConfiguration` if the weights are invalid or a factor is
/// out of range.
pub fn score(
    factors: &RiskFactors,
    weights: &RiskWeights,
    thresholds: &TierThresholds,
) -> Result<RiskScore, ReviewError> {
    weights.validate()?;
    factors.validate()?;

    let composite: f64 = factors
        .as_array()
        .iter()
        .zip(weights.as_array())
        .map(|(f, w)| f * w)
        .sum();
    // Weight tolerance can push the sum a hair past 1.0
    let composite = composite.clamp(0.0, 1.0);

    Ok(RiskScore {
        factors: *factors,
        weights: *weights,
        composite,
        tier: thresholds.classify(composite),
    })
}

/// Scorer bound to a validated weight and threshold configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskScorer {
    weights: RiskWeights,
    thresholds: TierThresholds,
}

impl RiskScorer {
    /// Create a scorer, validating the configuration up front
    pub fn new(weights: RiskWeights, thresholds: TierThresholds) -> Result<Self, ReviewError> {
        weights.validate()?;
        thresholds.validate()?;
        Ok(Self {
            weights,
            thresholds,
        })
    }

    /// Score with the configured weights
    pub fn score(&self, factors: &RiskFactors) -> Result<RiskScore, ReviewError> {
        score(factors, &self.weights, &self.thresholds)
    }

    /// Score with explicit weights, keeping the configured thresholds
    pub fn score_with(
        &self,
        factors: &RiskFactors,
        weights: &RiskWeights,
    ) -> Result<RiskScore, ReviewError> {
        score(factors, weights, &self.thresholds)
    }

    /// Configured weights
    #[inline]
    #[must_use]
    pub fn weights(&self) -> &RiskWeights {
        &self.weights
    }

    /// Configured thresholds
    #[inline]
    #[must_use]
    pub fn thresholds(&self) -> &TierThresholds {
        &self.thresholds
    }
}

impl Default for RiskScorer {
    fn default() -> Self {
        Self {
            weights: RiskWeights::default(),
            thresholds: TierThresholds::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn reference_factors_score_high() {
        let factors = RiskFactors::new(0.8, 0.9, 0.5, 0.6);
        let weights = RiskWeights::new(0.4, 0.3, 0.2, 0.1);

        let result = score(&factors, &weights, &TierThresholds::default()).unwrap();

        assert!((result.composite - 0.75).abs() < 1e-9);
        assert_eq!(result.tier, RiskTier::High);
    }

    #[test]
    fn tier_boundaries_are_inclusive_lower_bounds() {
        let t = TierThresholds::default();
        assert_eq!(t.classify(0.0), RiskTier::Low);
        assert_eq!(t.classify(0.299), RiskTier::Low);
        assert_eq!(t.classify(0.3), RiskTier::Medium);
        assert_eq!(t.classify(0.549), RiskTier::Medium);
        assert_eq!(t.classify(0.55), RiskTier::High);
        assert_eq!(t.classify(0.799), RiskTier::High);
        assert_eq!(t.classify(0.8), RiskTier::Critical);
        assert_eq!(t.classify(1.0), RiskTier::Critical);
    }

    #[test]
    fn weights_must_sum_to_one() {
        let factors = RiskFactors::new(0.1, 0.1, 0.1, 0.1);
        let weights = RiskWeights::new(0.4, 0.3, 0.2, 0.2);

        let err = score(&factors, &weights, &TierThresholds::default()).unwrap_err();
        assert!(matches!(err, ReviewError::InvalidWeightConfiguration(_)));
    }

    #[test]
    fn weights_within_tolerance_are_accepted() {
        let weights = RiskWeights::new(0.4, 0.3, 0.2, 0.1 + 5e-7);
        assert!(weights.validate().is_ok());
    }

    #[test]
    fn negative_weight_rejected() {
        let weights = RiskWeights::new(0.6, 0.6, -0.2, 0.0);
        assert!(matches!(
            weights.validate(),
            Err(ReviewError::InvalidWeightConfiguration(_))
        ));
    }

    #[test]
    fn out_of_range_factor_rejected() {
        let factors = RiskFactors::new(1.2, 0.0, 0.0, 0.0);
        let err = score(&factors, &RiskWeights::default(), &TierThresholds::default())
            .unwrap_err();
        assert!(err.to_string().contains("complexity"));
    }

    #[test]
    fn thresholds_must_increase() {
        let bad = TierThresholds {
            medium: 0.5,
            high: 0.4,
            critical: 0.9,
        };
        assert!(matches!(bad.validate(), Err(ReviewError::Config(_))));
        assert!(RiskScorer::new(RiskWeights::default(), bad).is_err());
    }

    #[test]
    fn custom_thresholds_shift_tiers() {
        let thresholds = TierThresholds {
            medium: 0.1,
            high: 0.2,
            critical: 0.3,
        };
        let scorer = RiskScorer::new(RiskWeights::default(), thresholds).unwrap();
        let result = scorer.score(&RiskFactors::new(0.5, 0.5, 0.5, 0.5)).unwrap();
        assert_eq!(result.tier, RiskTier::Critical);
    }

    fn unit() -> impl Strategy<Value = f64> {
        0.0..=1.0f64
    }

    fn weights() -> impl Strategy<Value = RiskWeights> {
        (0.0..1.0f64, 0.0..1.0f64, 0.0..1.0f64, 0.01..1.0f64).prop_map(|(a, b, c, d)| {
            let sum = a + b + c + d;
            RiskWeights::new(a / sum, b / sum, c / sum, 1.0 - (a + b + c) / sum)
        })
    }

    proptest! {
        #[test]
        fn prop_score_is_deterministic_and_bounded(
            c in unit(), s in unit(), f in unit(), t in unit(),
            w in weights(),
        ) {
            let factors = RiskFactors::new(c, s, f, t);
            let thresholds = TierThresholds::default();

            let first = score(&factors, &w, &thresholds).unwrap();
            let second = score(&factors, &w, &thresholds).unwrap();

            prop_assert_eq!(&first, &second);
            prop_assert!((0.0..=1.0).contains(&first.composite));
            prop_assert_eq!(first.tier, thresholds.classify(first.composite));
        }

        #[test]
        fn prop_bad_weight_sum_always_rejected(
            c in unit(), s in unit(), f in unit(), t in unit(),
            w in weights(),
            skew in 0.01..2.0f64,
        ) {
            let factors = RiskFactors::new(c, s, f, t);
            let skewed = RiskWeights::new(
                w.complexity + skew,
                w.security,
                w.files_changed,
                w.test_coverage_gap,
            );

            let result = score(&factors, &skewed, &TierThresholds::default());
            prop_assert!(matches!(result, Err(ReviewError::InvalidWeightConfiguration(_))));
        }
    }
}
