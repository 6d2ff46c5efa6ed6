//! SLA escalation
//!
//! The scheduler inspects how long each open review has sat in its current
//! state and emits one [`EscalationEvent`] per (review, state, tier) once the
//! tier's threshold is exceeded. It never changes a review; the only state
//! it writes is its own idempotency markers.

use crate::review::CodeReview;
use crate::risk::RiskTier;
use crate::state_machine::ReviewStatus;
use crate::types::ReviewId;
use chrono::{DateTime, Duration, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Per-tier SLA thresholds, in hours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlaPolicy {
    /// Threshold for `Low`
    pub low_hours: u32,
    /// Threshold for `Medium`
    pub medium_hours: u32,
    /// Threshold for `High`
    pub high_hours: u32,
    /// Threshold for `Critical`
    pub critical_hours: u32,
    /// Window before the threshold in which a review counts as at risk
    pub at_risk_hours: u32,
}

impl SlaPolicy {
    /// Threshold for `tier`
    #[must_use]
    pub fn threshold(&self, tier: RiskTier) -> Duration {
        let hours = match tier {
            RiskTier::Low => self.low_hours,
            RiskTier::Medium => self.medium_hours,
            RiskTier::High => self.high_hours,
            RiskTier::Critical => self.critical_hours,
        };
        Duration::hours(i64::from(hours))
    }

    /// At-risk window
    #[inline]
    #[must_use]
    pub fn at_risk_window(&self) -> Duration {
        Duration::hours(i64::from(self.at_risk_hours))
    }
}

impl Default for SlaPolicy {
    fn default() -> Self {
        Self {
            low_hours: 72,
            medium_hours: 48,
            high_hours: 24,
            critical_hours: 8,
            at_risk_hours: 4,
        }
    }
}

/// Raised when a review exceeds its SLA in its current state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscalationEvent {
    /// Breaching review
    pub review_id: ReviewId,
    /// State the review is stuck in
    pub status: ReviewStatus,
    /// Tier whose threshold was exceeded
    pub tier: RiskTier,
    /// Time spent in `status`
    pub age: Duration,
}

/// Idempotency key: one escalation per review, state and tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EscalationKey {
    /// Review
    pub review_id: ReviewId,
    /// State at escalation time
    pub status: ReviewStatus,
    /// Tier at escalation time
    pub tier: RiskTier,
}

/// SLA standing of a set of open reviews
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlaSummary {
    /// Well inside the threshold
    pub on_track: usize,
    /// Within the at-risk window of the threshold
    pub at_risk: usize,
    /// Past the threshold
    pub breached: usize,
    /// Breached and already escalated in the current state
    pub escalated: usize,
}

/// Scans open reviews for SLA breaches
#[derive(Debug, Default)]
pub struct EscalationScheduler {
    policy: SlaPolicy,
    /// Marker -> time it was recorded
    recorded: DashMap<EscalationKey, DateTime<Utc>>,
}

impl EscalationScheduler {
    /// Create scheduler with `policy`
    #[inline]
    #[must_use]
    pub fn new(policy: SlaPolicy) -> Self {
        Self {
            policy,
            recorded: DashMap::new(),
        }
    }

    /// Emit one event per newly breaching (review, state, tier).
    ///
    /// Safe to call concurrently: marker insertion is atomic per key, so two
    /// overlapping ticks never emit the same escalation twice.
    pub fn tick(&self, now: DateTime<Utc>, reviews: &[CodeReview]) -> Vec<EscalationEvent> {
        let mut events = Vec::new();

        for review in reviews.iter().filter(|r| !r.is_terminal()) {
            let tier = Self::tier_of(review);
            let age = review.age_in_state(now);
            if age <= self.policy.threshold(tier) {
                continue;
            }

            let key = EscalationKey {
                review_id: review.id(),
                status: review.status(),
                tier,
            };
            match self.recorded.entry(key) {
                Entry::Occupied(_) => {}
                Entry::Vacant(slot) => {
                    slot.insert(now);
                    tracing::info!(
                        review_id = %key.review_id,
                        status = %key.status,
                        %tier,
                        age_hours = age.num_hours(),
                        "SLA breached, escalating"
                    );
                    events.push(EscalationEvent {
                        review_id: key.review_id,
                        status: key.status,
                        tier,
                        age,
                    });
                }
            }
        }

        tracing::debug!("Escalation tick over {} reviews: {} events", reviews.len(), events.len());
        events
    }

    /// Classify open reviews against their SLA
    #[must_use]
    pub fn summary(&self, now: DateTime<Utc>, reviews: &[CodeReview]) -> SlaSummary {
        let mut summary = SlaSummary::default();
        for review in reviews.iter().filter(|r| !r.is_terminal()) {
            let tier = Self::tier_of(review);
            let threshold = self.policy.threshold(tier);
            let age = review.age_in_state(now);

            if age > threshold {
                summary.breached += 1;
                if self.is_recorded(&EscalationKey {
                    review_id: review.id(),
                    status: review.status(),
                    tier,
                }) {
                    summary.escalated += 1;
                }
            } else if threshold - age <= self.policy.at_risk_window() {
                summary.at_risk += 1;
            } else {
                summary.on_track += 1;
            }
        }
        summary
    }

    /// Whether `key` has already been escalated
    #[inline]
    #[must_use]
    pub fn is_recorded(&self, key: &EscalationKey) -> bool {
        self.recorded.contains_key(key)
    }

    /// Drop every marker of `review_id`; returns how many were dropped.
    ///
    /// Called once a review is terminal and can never breach again.
    pub fn forget(&self, review_id: ReviewId) -> usize {
        let before = self.recorded.len();
        self.recorded.retain(|key, _| key.review_id != review_id);
        before - self.recorded.len()
    }

    /// Number of recorded markers
    #[inline]
    #[must_use]
    pub fn recorded_count(&self) -> usize {
        self.recorded.len()
    }

    /// Active policy
    #[inline]
    #[must_use]
    pub fn policy(&self) -> &SlaPolicy {
        &self.policy
    }

    // Unscored drafts are held to the strictest SLA
    fn tier_of(review: &CodeReview) -> RiskTier {
        review.tier().unwrap_or(RiskTier::Critical)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::risk::{score, RiskFactors, RiskWeights, TierThresholds};
    use crate::types::{DiffReference, User};

    fn pending_at(level: f64, at: DateTime<Utc>) -> (User, CodeReview) {
        let author = User::author("alice");
        let risk = score(
            &RiskFactors::new(level, level, level, level),
            &RiskWeights::default(),
            &TierThresholds::default(),
        )
        .unwrap();
        let review = CodeReview::draft(ReviewId::new(), &author, DiffReference::new("d"), at)
            .with_risk(risk, at)
            .submit(&author, at)
            .unwrap();
        (author, review)
    }

    #[test]
    fn repeated_tick_emits_once() {
        let t0 = Utc::now();
        let (_, review) = pending_at(0.9, t0);
        let scheduler = EscalationScheduler::default();
        let now = t0 + Duration::hours(9);

        let first = scheduler.tick(now, std::slice::from_ref(&review));
        let second = scheduler.tick(now, std::slice::from_ref(&review));

        assert_eq!(first.len(), 1);
        assert_eq!(first[0].tier, RiskTier::Critical);
        assert_eq!(first[0].age, Duration::hours(9));
        assert!(second.is_empty());
    }

    #[test]
    fn threshold_is_exclusive() {
        let t0 = Utc::now();
        let (_, review) = pending_at(0.1, t0);
        let scheduler = EscalationScheduler::default();

        assert!(scheduler.tick(t0 + Duration::hours(72), &[review.clone()]).is_empty());
        assert_eq!(
            scheduler
                .tick(t0 + Duration::hours(72) + Duration::seconds(1), &[review])
                .len(),
            1
        );
    }

    #[test]
    fn new_state_escalates_again() {
        let t0 = Utc::now();
        let (_, review) = pending_at(0.9, t0);
        let scheduler = EscalationScheduler::default();
        assert_eq!(scheduler.tick(t0 + Duration::hours(9), &[review.clone()]).len(), 1);

        let t1 = t0 + Duration::hours(10);
        let changed = review.request_changes(&User::reviewer("bob"), t1).unwrap();
        assert!(scheduler.tick(t1 + Duration::hours(1), &[changed.clone()]).is_empty());
        assert_eq!(scheduler.tick(t1 + Duration::hours(9), &[changed]).len(), 1);
        assert_eq!(scheduler.recorded_count(), 2);
    }

    #[test]
    fn forget_drops_only_that_review() {
        let t0 = Utc::now();
        let (_, first) = pending_at(0.9, t0);
        let (_, second) = pending_at(0.9, t0);
        let scheduler = EscalationScheduler::default();
        assert_eq!(scheduler.tick(t0 + Duration::hours(9), &[first.clone(), second]).len(), 2);

        assert_eq!(scheduler.forget(first.id()), 1);
        assert_eq!(scheduler.forget(first.id()), 0);
        assert_eq!(scheduler.recorded_count(), 1);
    }

    #[test]
    fn terminal_reviews_ignored() {
        let t0 = Utc::now();
        let (author, review) = pending_at(0.9, t0);
        let closed = review.close(&author, t0).unwrap();
        let scheduler = EscalationScheduler::default();
        assert!(scheduler.tick(t0 + Duration::days(30), &[closed]).is_empty());
    }

    #[test]
    fn escalation_never_mutates_review() {
        let t0 = Utc::now();
        let (_, review) = pending_at(0.9, t0);
        let before = review.clone();
        EscalationScheduler::default().tick(t0 + Duration::days(2), std::slice::from_ref(&review));
        assert_eq!(review, before);
    }

    #[test]
    fn summary_buckets() {
        let t0 = Utc::now();
        let now = t0 + Duration::hours(30);
        let scheduler = EscalationScheduler::default();

        // low: 72h threshold, 30h old -> on track
        let (_, low) = pending_at(0.1, t0);
        // high: 24h threshold, submitted 3h later -> 27h old, breached
        let (_, high) = pending_at(0.7, t0 + Duration::hours(3));
        // critical: 8h threshold, 5h old -> inside 4h window
        let (_, critical) = pending_at(0.9, now - Duration::hours(5));

        let reviews = vec![low, high, critical];
        scheduler.tick(now, &reviews);
        let summary = scheduler.summary(now, &reviews);

        assert_eq!(
            summary,
            SlaSummary {
                on_track: 1,
                at_risk: 1,
                breached: 1,
                escalated: 1,
            }
        );
    }
}
