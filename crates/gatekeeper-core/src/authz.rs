//! Role-based authorization
//!
//! One pure predicate per workflow action. Checked before any state change
//! so a denied request never touches the aggregate.

use crate::error::ReviewError;
use crate::state_machine::{ReviewAction, ReviewStatus};
use crate::types::{User, UserId};

/// Whether `actor` may perform `action` on a review owned by `author` in `status`
#[must_use]
pub fn is_permitted(
    action: ReviewAction,
    actor: &User,
    author: &UserId,
    status: ReviewStatus,
) -> bool {
    let is_author = actor.id == *author;
    let is_admin = actor.role.is_admin();

    match action {
        ReviewAction::Submit | ReviewAction::Resubmit | ReviewAction::Merge => {
            is_author || is_admin
        }
        // Self-approval is never allowed, not even for admins
        ReviewAction::Approve => actor.role.can_review() && !is_author,
        ReviewAction::RequestChanges => actor.role.can_review(),
        ReviewAction::Close => {
            is_admin
                || (is_author
                    && matches!(status, ReviewStatus::Draft | ReviewStatus::PendingReview))
        }
        ReviewAction::Comment | ReviewAction::UpdateEnvironment => true,
    }
}

/// Fail with `UnauthorizedAction` unless [`is_permitted`]
pub fn authorize(
    action: ReviewAction,
    actor: &User,
    author: &UserId,
    status: ReviewStatus,
) -> Result<(), ReviewError> {
    if is_permitted(action, actor, author, status) {
        Ok(())
    } else {
        tracing::warn!(
            actor = %actor.id,
            role = %actor.role,
            %action,
            %status,
            "authorization denied"
        );
        Err(ReviewError::UnauthorizedAction {
            actor: actor.id,
            role: actor.role,
            action,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    #[test]
    fn author_cannot_approve_own_review_even_as_admin() {
        let admin_author = User::admin("root");
        let id = admin_author.id;
        let status = ReviewStatus::PendingReview;
        assert!(!is_permitted(ReviewAction::Approve, &admin_author, &id, status));
    }

    #[test]
    fn only_reviewers_and_admins_approve() {
        let author = UserId::new();
        let status = ReviewStatus::PendingReview;
        assert!(!is_permitted(ReviewAction::Approve, &User::author("a"), &author, status));
        assert!(is_permitted(ReviewAction::Approve, &User::reviewer("r"), &author, status));
        assert!(is_permitted(ReviewAction::Approve, &User::admin("x"), &author, status));
    }

    #[test]
    fn author_closes_only_early_states() {
        let author = User::author("a");
        let id = author.id;
        assert!(is_permitted(ReviewAction::Close, &author, &id, ReviewStatus::Draft));
        assert!(is_permitted(ReviewAction::Close, &author, &id, ReviewStatus::PendingReview));
        assert!(!is_permitted(ReviewAction::Close, &author, &id, ReviewStatus::Approved));
        assert!(!is_permitted(ReviewAction::Close, &author, &id, ReviewStatus::ChangesRequested));
        assert!(is_permitted(ReviewAction::Close, &User::admin("x"), &id, ReviewStatus::Approved));
    }

    #[test]
    fn merge_limited_to_author_and_admin() {
        let author = UserId::new();
        let reviewer = User::new("r", Role::Reviewer);
        let status = ReviewStatus::Approved;
        let err = authorize(ReviewAction::Merge, &reviewer, &author, status).unwrap_err();
        assert!(err.is_unauthorized());
        assert!(authorize(ReviewAction::Merge, &User::admin("x"), &author, status).is_ok());
    }
}
