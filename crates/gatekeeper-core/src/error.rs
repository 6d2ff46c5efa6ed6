//! Error types for Gatekeeper Core
//!
//! Every domain-rule violation has its own variant and is surfaced unchanged
//! to the caller:
//! - State machine and authorization failures
//! - Approval and merge gate failures
//! - Risk weight configuration errors
//! - Comment threading errors
//! - External port failures

use crate::state_machine::{ReviewAction, ReviewStatus};
use crate::types::{CommentId, EnvironmentStatus, ReviewId, Role, UserId};

/// Main domain error type
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReviewError {
    /// No edge for this action from the current state
    #[error("cannot {action} a review in {from} state")]
    InvalidTransition {
        /// State the review was in
        from: ReviewStatus,
        /// Attempted action
        action: ReviewAction,
    },

    /// Actor lacks permission for the action
    #[error("user {actor} ({role}) is not allowed to {action}")]
    UnauthorizedAction {
        /// Acting user
        actor: UserId,
        /// Role of the acting user
        role: Role,
        /// Attempted action
        action: ReviewAction,
    },

    /// Same reviewer approved twice
    #[error("user {reviewer} already approved review {review}")]
    DuplicateApproval {
        /// Review
        review: ReviewId,
        /// Reviewer who already approved
        reviewer: UserId,
    },

    /// Not enough distinct approvals for the review's tier
    #[error("quorum not met: {current} of {required} approvals")]
    QuorumNotMet {
        /// Approvals required by the tier
        required: usize,
        /// Approvals recorded
        current: usize,
    },

    /// Environment missing or not ready
    #[error("environment for review {review} is not ready ({})", display_status(.status))]
    EnvironmentNotReady {
        /// Review
        review: ReviewId,
        /// Environment status, if one exists
        status: Option<EnvironmentStatus>,
    },

    /// Risk weights or factors out of range
    #[error("invalid weight configuration: {0}")]
    InvalidWeightConfiguration(String),

    /// Reply target does not exist in the review
    #[error("parent comment {parent} not found in review {review}")]
    CommentParentNotFound {
        /// Review
        review: ReviewId,
        /// Missing parent
        parent: CommentId,
    },

    /// A port call failed
    #[error("{port} failed: {message}")]
    ExternalService {
        /// Port name
        port: &'static str,
        /// Failure description
        message: String,
    },

    /// Review does not exist
    #[error("review not found: {0}")]
    NotFound(ReviewId),

    /// Comment body or location rejected
    #[error("invalid comment: {0}")]
    InvalidComment(String),

    /// Configuration could not be loaded or is inconsistent
    #[error("configuration error: {0}")]
    Config(String),
}

fn display_status(status: &Option<EnvironmentStatus>) -> String {
    status.map_or_else(|| "none".to_string(), |s| s.to_string())
}

impl ReviewError {
    /// Create external service error
    #[inline]
    pub fn external(port: &'static str, message: impl Into<String>) -> Self {
        Self::ExternalService {
            port,
            message: message.into(),
        }
    }

    /// Create invalid transition error
    #[inline]
    #[must_use]
    pub fn invalid_transition(from: ReviewStatus, action: ReviewAction) -> Self {
        Self::InvalidTransition { from, action }
    }

    /// Check if retrying the same request may succeed
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::ExternalService { .. })
    }

    /// Check if the error is an authorization denial
    #[inline]
    #[must_use]
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::UnauthorizedAction { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_error_display() {
        let err = ReviewError::invalid_transition(ReviewStatus::Merged, ReviewAction::Approve);
        assert_eq!(err.to_string(), "cannot approve a review in merged state");

        let err = ReviewError::QuorumNotMet {
            required: 2,
            current: 1,
        };
        assert!(err.to_string().contains("1 of 2"));
    }

    #[test]
    fn environment_not_ready_display() {
        let review = ReviewId::new();
        let missing = ReviewError::EnvironmentNotReady {
            review,
            status: None,
        };
        assert!(missing.to_string().ends_with("(none)"));

        let provisioning = ReviewError::EnvironmentNotReady {
            review,
            status: Some(EnvironmentStatus::Provisioning),
        };
        assert!(provisioning.to_string().ends_with("(provisioning)"));
    }

    #[test]
    fn only_external_errors_are_retryable() {
        assert!(ReviewError::external("risk_analysis", "timeout").is_retryable());
        assert!(!ReviewError::InvalidWeightConfiguration("x".into()).is_retryable());
        assert!(!ReviewError::NotFound(ReviewId::new()).is_retryable());
    }
}
