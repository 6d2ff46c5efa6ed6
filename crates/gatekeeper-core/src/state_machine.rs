//! Review state machine
//!
//! Legal states and edges for a single review. Guards that depend on the
//! actor or the aggregate (quorum, environment) live in [`crate::review`];
//! this module only answers "is there an edge".

use crate::error::ReviewError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a code review
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    /// Created, not yet submitted
    Draft,
    /// Waiting for approvals
    PendingReview,
    /// A reviewer asked for changes
    ChangesRequested,
    /// Quorum reached
    Approved,
    /// Merged (terminal)
    Merged,
    /// Closed without merge (terminal)
    Closed,
}

impl ReviewStatus {
    /// All states, in lifecycle order
    pub const ALL: [ReviewStatus; 6] = [
        ReviewStatus::Draft,
        ReviewStatus::PendingReview,
        ReviewStatus::ChangesRequested,
        ReviewStatus::Approved,
        ReviewStatus::Merged,
        ReviewStatus::Closed,
    ];

    /// Whether no further transition is possible
    #[inline]
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, ReviewStatus::Merged | ReviewStatus::Closed)
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReviewStatus::Draft => "draft",
            ReviewStatus::PendingReview => "pending_review",
            ReviewStatus::ChangesRequested => "changes_requested",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Merged => "merged",
            ReviewStatus::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Workflow actions that may move a review between states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    /// Draft to pending review
    Submit,
    /// Record an approval
    Approve,
    /// Send back to the author
    RequestChanges,
    /// Author answers a change request
    Resubmit,
    /// Merge an approved review
    Merge,
    /// Close without merging
    Close,
    /// Post to the discussion
    Comment,
    /// Record a provisioning status report
    UpdateEnvironment,
}

impl fmt::Display for ReviewAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReviewAction::Submit => "submit",
            ReviewAction::Approve => "approve",
            ReviewAction::RequestChanges => "request changes on",
            ReviewAction::Resubmit => "resubmit",
            ReviewAction::Merge => "merge",
            ReviewAction::Close => "close",
            ReviewAction::Comment => "comment on",
            ReviewAction::UpdateEnvironment => "update the environment of",
        };
        f.write_str(name)
    }
}

/// States reachable from `from` in one step.
///
/// `PendingReview -> PendingReview` is the edge taken by an approval that
/// does not yet reach quorum.
#[must_use]
pub fn allowed_transitions(from: ReviewStatus) -> Vec<ReviewStatus> {
    use ReviewStatus::*;
    match from {
        Draft => vec![PendingReview, Closed],
        PendingReview => vec![PendingReview, Approved, ChangesRequested, Closed],
        ChangesRequested => vec![PendingReview, Closed],
        Approved => vec![ChangesRequested, Merged, Closed],
        Merged | Closed => vec![],
    }
}

/// Validates a state transition.
pub fn validate_transition(
    from: ReviewStatus,
    to: ReviewStatus,
    action: ReviewAction,
) -> Result<(), ReviewError> {
    if allowed_transitions(from).contains(&to) {
        Ok(())
    } else {
        Err(ReviewError::invalid_transition(from, action))
    }
}

/// States from which `action` has an outgoing edge
#[must_use]
pub fn permits(from: ReviewStatus, action: ReviewAction) -> bool {
    use ReviewAction::*;
    use ReviewStatus::*;
    match action {
        Submit => from == Draft,
        Approve => from == PendingReview,
        RequestChanges => matches!(from, PendingReview | Approved),
        Resubmit => from == ChangesRequested,
        // A pending review may still be asked to merge; the quorum gate
        // reports why it cannot.
        Merge => matches!(from, PendingReview | Approved),
        Close | Comment | UpdateEnvironment => !from.is_terminal(),
    }
}

/// Fail with `InvalidTransition` unless `action` is possible from `from`
pub fn check_action(from: ReviewStatus, action: ReviewAction) -> Result<(), ReviewError> {
    if permits(from, action) {
        Ok(())
    } else {
        Err(ReviewError::invalid_transition(from, action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn draft_transitions() {
        let a = ReviewAction::Submit;
        assert!(validate_transition(ReviewStatus::Draft, ReviewStatus::PendingReview, a).is_ok());
        assert!(validate_transition(ReviewStatus::Draft, ReviewStatus::Approved, a).is_err());
        assert!(validate_transition(ReviewStatus::Draft, ReviewStatus::Merged, a).is_err());
    }

    #[test]
    fn terminal_states_have_no_edges() {
        assert!(allowed_transitions(ReviewStatus::Merged).is_empty());
        assert!(allowed_transitions(ReviewStatus::Closed).is_empty());
        assert!(!permits(ReviewStatus::Merged, ReviewAction::Close));
        assert!(!permits(ReviewStatus::Closed, ReviewAction::Comment));
    }

    #[test]
    fn closed_reachable_from_every_open_state() {
        for from in ReviewStatus::ALL.into_iter().filter(|s| !s.is_terminal()) {
            assert!(allowed_transitions(from).contains(&ReviewStatus::Closed));
            assert!(permits(from, ReviewAction::Close));
        }
    }

    #[test]
    fn check_action_reports_state_and_action() {
        let err = check_action(ReviewStatus::Draft, ReviewAction::Approve).unwrap_err();
        assert_eq!(
            err,
            ReviewError::InvalidTransition {
                from: ReviewStatus::Draft,
                action: ReviewAction::Approve,
            }
        );
    }
}
