//! Ports to the outside world
//!
//! The workflow service depends only on these traits:
//! - [`RiskAnalysisPort`] turns a diff into raw risk factors
//! - [`EnvironmentProvisioningPort`] creates and destroys review environments
//! - [`NotificationPort`] delivers workflow events
//! - [`ReviewRepositoryPort`] / [`CommentRepositoryPort`] persist aggregates
//! - [`Clock`] supplies the current time
//!
//! Adapters report failures as [`ReviewError::ExternalService`] (or
//! [`ReviewError::NotFound`] for a missing review).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use gatekeeper_core::{
    CodeReview, Comment, DiffReference, Environment, EnvironmentId, EscalationEvent, ReviewError,
    ReviewId, RiskFactors, RiskTier, UserId,
};
use std::fmt;

/// Analyzes a diff for risk factors
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RiskAnalysisPort: Send + Sync {
    /// Raw factors for `diff`, each in `[0, 1]`
    async fn analyze(&self, diff: &DiffReference) -> Result<RiskFactors, ReviewError>;
}

/// Creates and destroys per-review environments
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EnvironmentProvisioningPort: Send + Sync {
    /// Start provisioning for `review_id`. The returned environment may
    /// still be `Provisioning`; readiness can be reported later.
    async fn provision(&self, review_id: ReviewId) -> Result<Environment, ReviewError>;

    /// Destroy an environment
    async fn teardown(&self, environment_id: EnvironmentId) -> Result<(), ReviewError>;
}

/// Delivers workflow events
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationPort: Send + Sync {
    /// Deliver `event`. Errors are logged by the caller and never fail the
    /// operation that produced the event.
    async fn notify(&self, event: NotificationEvent) -> Result<(), ReviewError>;
}

/// Review persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReviewRepositoryPort: Send + Sync {
    /// Load a review; `NotFound` if absent
    async fn load(&self, id: ReviewId) -> Result<CodeReview, ReviewError>;

    /// Insert or replace a review
    async fn save(&self, review: &CodeReview) -> Result<(), ReviewError>;

    /// Every stored review, oldest first
    async fn list(&self) -> Result<Vec<CodeReview>, ReviewError>;
}

/// Comment persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommentRepositoryPort: Send + Sync {
    /// Comments attached to `review_id`, any order
    async fn comments_for(&self, review_id: ReviewId) -> Result<Vec<Comment>, ReviewError>;

    /// Store a comment
    async fn save(&self, comment: &Comment) -> Result<(), ReviewError>;

    /// Drop a stored comment; a no-op if it is absent
    async fn remove(&self, comment: &Comment) -> Result<(), ReviewError>;
}

/// Time source
pub trait Clock: Send + Sync {
    /// Current instant
    fn now(&self) -> DateTime<Utc>;
}

/// Events emitted by the workflow
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    /// A review entered `PendingReview`
    ReviewSubmitted {
        /// Review
        review_id: ReviewId,
        /// Risk tier
        tier: RiskTier,
    },
    /// Quorum reached
    ReviewApproved {
        /// Review
        review_id: ReviewId,
        /// Approvals at the time of the event
        approvals: usize,
    },
    /// A reviewer asked for changes
    ChangesRequested {
        /// Review
        review_id: ReviewId,
        /// Reviewer
        by: UserId,
    },
    /// Merged
    ReviewMerged {
        /// Review
        review_id: ReviewId,
        /// Merging user
        by: UserId,
    },
    /// Closed without merging
    ReviewClosed {
        /// Review
        review_id: ReviewId,
        /// Closing user
        by: UserId,
    },
    /// SLA breach
    Escalation(EscalationEvent),
}

impl NotificationEvent {
    /// Review the event concerns
    #[must_use]
    pub fn review_id(&self) -> ReviewId {
        match self {
            NotificationEvent::ReviewSubmitted { review_id, .. }
            | NotificationEvent::ReviewApproved { review_id, .. }
            | NotificationEvent::ChangesRequested { review_id, .. }
            | NotificationEvent::ReviewMerged { review_id, .. }
            | NotificationEvent::ReviewClosed { review_id, .. } => *review_id,
            NotificationEvent::Escalation(event) => event.review_id,
        }
    }

    /// Whether this is an escalation
    #[inline]
    #[must_use]
    pub fn is_escalation(&self) -> bool {
        matches!(self, NotificationEvent::Escalation(_))
    }
}

impl fmt::Display for NotificationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationEvent::ReviewSubmitted { review_id, tier } => {
                write!(f, "review {review_id} submitted ({tier} risk)")
            }
            NotificationEvent::ReviewApproved { review_id, approvals } => {
                write!(f, "review {review_id} approved with {approvals} approvals")
            }
            NotificationEvent::ChangesRequested { review_id, by } => {
                write!(f, "changes requested on review {review_id} by {by}")
            }
            NotificationEvent::ReviewMerged { review_id, by } => {
                write!(f, "review {review_id} merged by {by}")
            }
            NotificationEvent::ReviewClosed { review_id, by } => {
                write!(f, "review {review_id} closed by {by}")
            }
            NotificationEvent::Escalation(e) => write!(
                f,
                "review {} escalated: {} hours in {} ({} risk)",
                e.review_id,
                e.age.num_hours(),
                e.status,
                e.tier
            ),
        }
    }
}
