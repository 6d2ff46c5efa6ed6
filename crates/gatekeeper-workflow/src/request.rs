//! Request and result records for the workflow service

use chrono::{DateTime, Utc};
use gatekeeper_core::{
    CodeReview, DiffReference, Environment, EnvironmentStatus, EscalationEvent, NewComment,
    QuorumPolicy, ReviewId, ReviewStatus, RiskTier, SlaSummary, User,
};
use serde::Serialize;
use std::fmt;

/// Open a review for a diff
#[derive(Debug, Clone)]
pub struct CreateReviewRequest {
    /// Submitting author
    pub author: User,
    /// Diff under review
    pub diff: DiffReference,
}

impl CreateReviewRequest {
    /// Create request
    #[inline]
    #[must_use]
    pub fn new(author: User, diff: impl Into<String>) -> Self {
        Self {
            author,
            diff: DiffReference::new(diff),
        }
    }
}

/// A user acting on an existing review (approve, request changes, merge, close)
#[derive(Debug, Clone)]
pub struct ReviewActionRequest {
    /// Target review
    pub review_id: ReviewId,
    /// Acting user
    pub actor: User,
}

impl ReviewActionRequest {
    /// Create request
    #[inline]
    #[must_use]
    pub fn new(review_id: ReviewId, actor: User) -> Self {
        Self { review_id, actor }
    }
}

/// Send a review back for another round
#[derive(Debug, Clone)]
pub struct ResubmitRequest {
    /// Target review
    pub review_id: ReviewId,
    /// Acting user
    pub actor: User,
    /// New diff; `None` keeps the current content and score
    pub diff: Option<DiffReference>,
}

impl ResubmitRequest {
    /// Resubmit unchanged content
    #[inline]
    #[must_use]
    pub fn unchanged(review_id: ReviewId, actor: User) -> Self {
        Self {
            review_id,
            actor,
            diff: None,
        }
    }

    /// Resubmit with a new diff
    #[inline]
    #[must_use]
    pub fn with_diff(review_id: ReviewId, actor: User, diff: impl Into<String>) -> Self {
        Self {
            review_id,
            actor,
            diff: Some(DiffReference::new(diff)),
        }
    }
}

/// Post a comment
#[derive(Debug, Clone)]
pub struct CommentRequest {
    /// Target review
    pub review_id: ReviewId,
    /// Commenting user
    pub author: User,
    /// Comment content
    pub comment: NewComment,
}

/// Provisioning status reported for a review's environment
#[derive(Debug, Clone)]
pub struct EnvironmentReport {
    /// Target review
    pub review_id: ReviewId,
    /// Latest environment state
    pub environment: Environment,
}

/// Flat view of a review for display
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewSummary {
    /// Review
    pub id: ReviewId,
    /// Current state
    pub status: ReviewStatus,
    /// Risk tier, once scored
    pub tier: Option<RiskTier>,
    /// Composite score, once scored
    pub composite: Option<f64>,
    /// Distinct approvals
    pub approvals: usize,
    /// Approvals needed for the current tier
    pub required_approvals: usize,
    /// Environment status, once provisioning started
    pub environment: Option<EnvironmentStatus>,
    /// Comment count
    pub comments: usize,
    /// Content version
    pub content_version: u32,
}

impl ReviewSummary {
    /// Summarize `review` under `quorum`
    #[must_use]
    pub fn of(review: &CodeReview, quorum: &QuorumPolicy) -> Self {
        Self {
            id: review.id(),
            status: review.status(),
            tier: review.tier(),
            composite: review.risk().map(|r| r.composite),
            approvals: review.approval_count(),
            required_approvals: review.required_approvals(quorum),
            environment: review.environment().map(|e| e.status),
            comments: review.comments().len(),
            content_version: review.content_version(),
        }
    }
}

impl fmt::Display for ReviewSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}]", self.id, self.status)?;
        if let (Some(tier), Some(composite)) = (self.tier, self.composite) {
            write!(f, " {tier} risk ({composite:.2})")?;
        }
        write!(
            f,
            " approvals {}/{}",
            self.approvals, self.required_approvals
        )?;
        if let Some(env) = self.environment {
            write!(f, " env {env}")?;
        }
        write!(f, " comments {} v{}", self.comments, self.content_version)
    }
}

/// Outcome of one escalation pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    /// Evaluation time
    pub at: DateTime<Utc>,
    /// Escalations raised by this pass
    pub events: Vec<EscalationEvent>,
    /// SLA standing after the pass
    pub summary: SlaSummary,
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatekeeper_core::{RiskFactors, RiskScorer};

    #[test]
    fn summary_reflects_review() {
        let author = User::author("alice");
        let now = Utc::now();
        let risk = RiskScorer::default()
            .score(&RiskFactors::new(0.8, 0.9, 0.5, 0.6))
            .unwrap();
        let review = CodeReview::draft(ReviewId::new(), &author, DiffReference::new("d"), now)
            .with_risk(risk, now)
            .submit(&author, now)
            .unwrap();

        let summary = ReviewSummary::of(&review, &QuorumPolicy::default());
        assert_eq!(summary.status, ReviewStatus::PendingReview);
        assert_eq!(summary.tier, Some(RiskTier::High));
        assert_eq!(summary.required_approvals, 2);
        assert!(summary.to_string().contains("approvals 0/2"));
    }
}
