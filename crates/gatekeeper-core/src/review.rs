//! Code review aggregate
//!
//! A [`CodeReview`] together with its approval set and comment references is
//! the unit of consistency. Every transition takes the current value and
//! returns a new one; a failed guard leaves the original untouched.

use crate::authz::authorize;
use crate::error::ReviewError;
use crate::quorum::QuorumPolicy;
use crate::risk::{RiskScore, RiskTier};
use crate::state_machine::{check_action, validate_transition, ReviewAction, ReviewStatus};
use crate::types::{
    CommentId, DiffReference, Environment, EnvironmentStatus, ReviewId, User, UserId,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A single code review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeReview {
    id: ReviewId,
    author: UserId,
    diff: DiffReference,
    status: ReviewStatus,
    /// Distinct approvers, in acceptance order
    approvals: Vec<UserId>,
    risk: Option<RiskScore>,
    environment: Option<Environment>,
    comments: Vec<CommentId>,
    /// Bumped whenever the diff is replaced
    content_version: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    last_transition_at: DateTime<Utc>,
}

impl CodeReview {
    /// New, unscored draft
    #[must_use]
    pub fn draft(id: ReviewId, author: &User, diff: DiffReference, now: DateTime<Utc>) -> Self {
        Self {
            id,
            author: author.id,
            diff,
            status: ReviewStatus::Draft,
            approvals: Vec::new(),
            risk: None,
            environment: None,
            comments: Vec::new(),
            content_version: 1,
            created_at: now,
            updated_at: now,
            last_transition_at: now,
        }
    }

    /// Review ID
    #[inline]
    #[must_use]
    pub fn id(&self) -> ReviewId {
        self.id
    }

    /// Owning author
    #[inline]
    #[must_use]
    pub fn author(&self) -> UserId {
        self.author
    }

    /// Diff under review
    #[inline]
    #[must_use]
    pub fn diff(&self) -> &DiffReference {
        &self.diff
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn status(&self) -> ReviewStatus {
        self.status
    }

    /// Approvers, in acceptance order
    #[inline]
    #[must_use]
    pub fn approvals(&self) -> &[UserId] {
        &self.approvals
    }

    /// Number of distinct approvals
    #[inline]
    #[must_use]
    pub fn approval_count(&self) -> usize {
        self.approvals.len()
    }

    /// Whether `user` has approved
    #[inline]
    #[must_use]
    pub fn has_approved(&self, user: &UserId) -> bool {
        self.approvals.contains(user)
    }

    /// Risk score of the current content version
    #[inline]
    #[must_use]
    pub fn risk(&self) -> Option<&RiskScore> {
        self.risk.as_ref()
    }

    /// Risk tier, if scored
    #[inline]
    #[must_use]
    pub fn tier(&self) -> Option<RiskTier> {
        self.risk.as_ref().map(|r| r.tier)
    }

    /// Attached environment
    #[inline]
    #[must_use]
    pub fn environment(&self) -> Option<&Environment> {
        self.environment.as_ref()
    }

    /// Comment references, in attachment order
    #[inline]
    #[must_use]
    pub fn comments(&self) -> &[CommentId] {
        &self.comments
    }

    /// Content version
    #[inline]
    #[must_use]
    pub fn content_version(&self) -> u32 {
        self.content_version
    }

    /// Creation time
    #[inline]
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Last modification time
    #[inline]
    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Time of the last status change
    #[inline]
    #[must_use]
    pub fn last_transition_at(&self) -> DateTime<Utc> {
        self.last_transition_at
    }

    /// Time spent in the current state
    #[inline]
    #[must_use]
    pub fn age_in_state(&self, now: DateTime<Utc>) -> Duration {
        now - self.last_transition_at
    }

    /// Whether the review is merged or closed
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Approvals required by the current tier. Unscored reviews need the
    /// strictest quorum.
    #[must_use]
    pub fn required_approvals(&self, quorum: &QuorumPolicy) -> usize {
        quorum.required(self.tier().unwrap_or(RiskTier::Critical))
    }

    /// Same review carrying `risk` as its score
    #[must_use]
    pub fn with_risk(&self, risk: RiskScore, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.risk = Some(risk);
        next.updated_at = now;
        next
    }

    /// Same review with `environment` attached or replaced
    #[must_use]
    pub fn with_environment(&self, environment: Environment, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.environment = Some(environment);
        next.updated_at = now;
        next
    }

    /// Same review referencing one more comment
    #[must_use]
    pub fn with_comment(&self, comment: CommentId, now: DateTime<Utc>) -> Self {
        let mut next = self.clone();
        next.comments.push(comment);
        next.updated_at = now;
        next
    }

    /// `Draft -> PendingReview`. Requires a computed risk score.
    pub fn submit(&self, actor: &User, now: DateTime<Utc>) -> Result<Self, ReviewError> {
        let action = ReviewAction::Submit;
        check_action(self.status, action)?;
        authorize(action, actor, &self.author, self.status)?;
        if self.risk.is_none() {
            return Err(ReviewError::invalid_transition(self.status, action));
        }
        self.transition(ReviewStatus::PendingReview, action, now)
    }

    /// Record an approval; moves to `Approved` once quorum is reached
    pub fn approve(
        &self,
        actor: &User,
        quorum: &QuorumPolicy,
        now: DateTime<Utc>,
    ) -> Result<Self, ReviewError> {
        let action = ReviewAction::Approve;
        check_action(self.status, action)?;
        authorize(action, actor, &self.author, self.status)?;
        if self.has_approved(&actor.id) {
            return Err(ReviewError::DuplicateApproval {
                review: self.id,
                reviewer: actor.id,
            });
        }

        let mut next = self.clone();
        next.approvals.push(actor.id);
        next.updated_at = now;

        if next.approval_count() >= next.required_approvals(quorum) {
            next.transition(ReviewStatus::Approved, action, now)
        } else {
            Ok(next)
        }
    }

    /// `PendingReview | Approved -> ChangesRequested`, clearing approvals
    pub fn request_changes(&self, actor: &User, now: DateTime<Utc>) -> Result<Self, ReviewError> {
        let action = ReviewAction::RequestChanges;
        check_action(self.status, action)?;
        authorize(action, actor, &self.author, self.status)?;

        let mut next = self.transition(ReviewStatus::ChangesRequested, action, now)?;
        next.approvals.clear();
        Ok(next)
    }

    /// `ChangesRequested -> PendingReview`.
    ///
    /// When the diff changed, `rescored` carries the new diff and its fresh
    /// risk score; the content version is bumped.
    pub fn resubmit(
        &self,
        actor: &User,
        rescored: Option<(DiffReference, RiskScore)>,
        now: DateTime<Utc>,
    ) -> Result<Self, ReviewError> {
        let action = ReviewAction::Resubmit;
        check_action(self.status, action)?;
        authorize(action, actor, &self.author, self.status)?;

        let mut next = self.transition(ReviewStatus::PendingReview, action, now)?;
        next.approvals.clear();
        if let Some((diff, risk)) = rescored {
            next.diff = diff;
            next.risk = Some(risk);
            next.content_version += 1;
        }
        Ok(next)
    }

    /// `Approved -> Merged`.
    ///
    /// # Errors
    /// - `InvalidTransition` unless pending or approved
    /// - `UnauthorizedAction` unless admin or author
    /// - `QuorumNotMet` unless approved with enough approvals
    /// - `EnvironmentNotReady` unless the environment is `Ready`
    pub fn merge(
        &self,
        actor: &User,
        quorum: &QuorumPolicy,
        now: DateTime<Utc>,
    ) -> Result<Self, ReviewError> {
        let action = ReviewAction::Merge;
        check_action(self.status, action)?;
        authorize(action, actor, &self.author, self.status)?;

        let required = self.required_approvals(quorum);
        if self.status != ReviewStatus::Approved || self.approval_count() < required {
            return Err(ReviewError::QuorumNotMet {
                required,
                current: self.approval_count(),
            });
        }

        match &self.environment {
            Some(env) if env.is_ready() => {}
            other => {
                return Err(ReviewError::EnvironmentNotReady {
                    review: self.id,
                    status: other.as_ref().map(|e| e.status),
                })
            }
        }

        self.transition(ReviewStatus::Merged, action, now)
    }

    /// Any open state `-> Closed`
    pub fn close(&self, actor: &User, now: DateTime<Utc>) -> Result<Self, ReviewError> {
        let action = ReviewAction::Close;
        check_action(self.status, action)?;
        authorize(action, actor, &self.author, self.status)?;
        self.transition(ReviewStatus::Closed, action, now)
    }

    /// Same review with its environment marked destroyed
    #[must_use]
    pub fn with_environment_destroyed(&self, now: DateTime<Utc>) -> Self {
        match &self.environment {
            Some(env) if env.status != EnvironmentStatus::Destroyed => {
                self.with_environment(env.clone().destroyed(), now)
            }
            _ => self.clone(),
        }
    }

    /// Same review carrying a newer report for its environment.
    ///
    /// Terminal reviews keep the environment they ended with, and a report
    /// must name the environment already attached, if any.
    pub fn report_environment(
        &self,
        environment: Environment,
        now: DateTime<Utc>,
    ) -> Result<Self, ReviewError> {
        check_action(self.status, ReviewAction::UpdateEnvironment)?;
        if let Some(attached) = &self.environment {
            if attached.id != environment.id {
                return Err(ReviewError::external(
                    "environment_provisioning",
                    format!(
                        "review {} runs environment {}, not {}",
                        self.id, attached.id, environment.id
                    ),
                ));
            }
        }
        Ok(self.with_environment(environment, now))
    }

    fn transition(
        &self,
        to: ReviewStatus,
        action: ReviewAction,
        now: DateTime<Utc>,
    ) -> Result<Self, ReviewError> {
        validate_transition(self.status, to, action)?;
        let mut next = self.clone();
        next.status = to;
        next.updated_at = now;
        if to != self.status {
            next.last_transition_at = now;
        }
        Ok(next)
    }
}
