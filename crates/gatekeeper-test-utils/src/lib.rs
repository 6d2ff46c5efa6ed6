//! Testing utilities for the Gatekeeper workspace
//!
//! Shared fixtures and a harness wiring the workflow service to in-memory
//! adapters and a manual clock.

#![allow(missing_docs)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use gatekeeper_core::{
    CodeReview, ReviewId, RiskFactors, RiskTier, User, UserId, WorkflowConfig,
};
use gatekeeper_workflow::bootstrap::InMemoryRuntime;
use gatekeeper_workflow::{
    CreateReviewRequest, ManualClock, RecordingNotifier, ReviewActionRequest,
    ReviewWorkflowService, SimulatedProvisioner,
};
use std::sync::Arc;
use ulid::Ulid;

/// Factors whose composite lands in `tier` under the default weights
pub fn factors_for(tier: RiskTier) -> RiskFactors {
    let level = match tier {
        RiskTier::Low => 0.1,
        RiskTier::Medium => 0.4,
        RiskTier::High => 0.7,
        RiskTier::Critical => 0.9,
    };
    RiskFactors::new(level, level, level, level)
}

/// The worked example: composite 0.75, `High`
pub fn reference_factors() -> RiskFactors {
    RiskFactors::new(0.8, 0.9, 0.5, 0.6)
}

/// Diff name used by [`TestHarness::open`] for `tier`
pub fn diff_for(tier: RiskTier) -> String {
    format!("diff/{tier}")
}

/// Fixed start time so test output is stable
pub fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 8, 9, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Fixed identifier so every call names the same person
fn known(user: User, seq: u128) -> User {
    user.with_id(UserId(Ulid::from_parts(0, seq)))
}

pub fn alice() -> User {
    known(User::author("alice"), 1)
}

pub fn bob() -> User {
    known(User::reviewer("bob"), 2)
}

pub fn carol() -> User {
    known(User::reviewer("carol"), 3)
}

pub fn dave() -> User {
    known(User::reviewer("dave"), 4)
}

pub fn root() -> User {
    known(User::admin("root"), 5)
}

/// Author-role user distinct from [`alice`]
pub fn erin() -> User {
    known(User::author("erin"), 6)
}

/// Service over in-memory adapters with handles to each of them
pub struct TestHarness {
    pub runtime: InMemoryRuntime,
    pub notifier: Arc<RecordingNotifier>,
    pub clock: Arc<ManualClock>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(WorkflowConfig::default())
    }

    pub fn with_config(config: WorkflowConfig) -> Self {
        Self::build(config, SimulatedProvisioner::default())
    }

    pub fn with_provisioner(provisioner: SimulatedProvisioner) -> Self {
        Self::build(WorkflowConfig::default(), provisioner)
    }

    fn build(config: WorkflowConfig, provisioner: SimulatedProvisioner) -> Self {
        let clock = Arc::new(ManualClock::new(epoch()));
        let notifier = Arc::new(RecordingNotifier::new());
        let runtime =
            InMemoryRuntime::with_provisioner(config, provisioner, notifier.clone(), clock.clone())
                .unwrap();

        for tier in RiskTier::ALL {
            runtime.risk.set_factors(diff_for(tier), factors_for(tier));
        }

        Self {
            runtime,
            notifier,
            clock,
        }
    }

    pub fn service(&self) -> &Arc<ReviewWorkflowService> {
        &self.runtime.service
    }

    pub fn advance(&self, by: Duration) -> DateTime<Utc> {
        self.clock.advance(by)
    }

    /// Open a review of `tier` authored by `author`, expecting success
    pub async fn open(&self, author: &User, tier: RiskTier) -> CodeReview {
        self.service()
            .create_review(CreateReviewRequest::new(author.clone(), diff_for(tier)))
            .await
            .unwrap()
    }

    /// Approve as each of `reviewers` in turn, expecting success
    pub async fn approve_all(&self, review_id: ReviewId, reviewers: &[User]) -> CodeReview {
        let mut last = None;
        for reviewer in reviewers {
            last = Some(
                self.service()
                    .approve_review(ReviewActionRequest::new(review_id, reviewer.clone()))
                    .await
                    .unwrap(),
            );
        }
        last.unwrap()
    }

    pub async fn stored(&self, review_id: ReviewId) -> CodeReview {
        self.service().get_review(review_id).await.unwrap()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_users_are_stable() {
        assert_eq!(alice(), alice());
        assert_eq!(bob().id, bob().id);
        assert_ne!(alice().id, erin().id);
        assert_ne!(bob().id, carol().id);
    }
}
