use chrono::{Duration, Utc};
use gatekeeper_core::state_machine::{allowed_transitions, validate_transition};
use gatekeeper_core::{
    CodeReview, DiffReference, Environment, QuorumPolicy, ReviewAction, ReviewError, ReviewId,
    ReviewStatus, RiskFactors, RiskScorer, User,
};
use proptest::prelude::*;

#[test]
fn test_pending_review_transitions() {
    let a = ReviewAction::Approve;
    let from = ReviewStatus::PendingReview;
    assert!(validate_transition(from, ReviewStatus::Approved, a).is_ok());
    assert!(validate_transition(from, ReviewStatus::PendingReview, a).is_ok());
    assert!(validate_transition(from, ReviewStatus::Merged, a).is_err());
}

#[test]
fn test_changes_requested_only_returns_to_pending() {
    let a = ReviewAction::Resubmit;
    let from = ReviewStatus::ChangesRequested;
    assert!(validate_transition(from, ReviewStatus::PendingReview, a).is_ok());
    assert!(validate_transition(from, ReviewStatus::Approved, a).is_err());
}

fn any_status() -> impl Strategy<Value = ReviewStatus> {
    prop_oneof![
        Just(ReviewStatus::Draft),
        Just(ReviewStatus::PendingReview),
        Just(ReviewStatus::ChangesRequested),
        Just(ReviewStatus::Approved),
        Just(ReviewStatus::Merged),
        Just(ReviewStatus::Closed),
    ]
}

#[derive(Debug, Clone, Copy)]
enum Step {
    Approve(usize),
    RequestChanges(usize),
    Resubmit,
    Merge,
    EnvReady,
    Close,
}

fn any_step() -> impl Strategy<Value = Step> {
    prop_oneof![
        (0..4usize).prop_map(Step::Approve),
        (0..4usize).prop_map(Step::RequestChanges),
        Just(Step::Resubmit),
        Just(Step::Merge),
        Just(Step::EnvReady),
        Just(Step::Close),
    ]
}

proptest! {
    #[test]
    fn prop_validate_matches_allowed(from in any_status(), to in any_status()) {
        let res = validate_transition(from, to, ReviewAction::Submit);
        prop_assert_eq!(res.is_ok(), allowed_transitions(from).contains(&to));
    }

    #[test]
    fn prop_random_workflows_keep_invariants(
        level in 0.0..=1.0f64,
        steps in prop::collection::vec(any_step(), 1..30),
    ) {
        let author = User::author("alice");
        // index 3 is the author acting as a would-be reviewer
        let reviewers = [
            User::reviewer("r0"),
            User::reviewer("r1"),
            User::admin("r2"),
            author.clone(),
        ];
        let quorum = QuorumPolicy::default();
        let mut now = Utc::now();

        let risk = RiskScorer::default()
            .score(&RiskFactors::new(level, level, level, level))
            .unwrap();
        let mut review = CodeReview::draft(ReviewId::new(), &author, DiffReference::new("d"), now)
            .with_risk(risk, now)
            .submit(&author, now)
            .unwrap();

        for step in steps {
            now += Duration::minutes(1);
            let before = review.clone();
            let result = match step {
                Step::Approve(i) => review.approve(&reviewers[i], &quorum, now),
                Step::RequestChanges(i) => review.request_changes(&reviewers[i], now),
                Step::Resubmit => review.resubmit(&author, None, now),
                Step::Merge => review.merge(&author, &quorum, now),
                Step::EnvReady => {
                    let env = Environment::provisioning(review.id()).ready("https://env");
                    Ok(review.with_environment(env, now))
                }
                Step::Close => review.close(&author, now),
            };

            match result {
                Ok(next) => {
                    if next.status() != before.status() {
                        prop_assert!(allowed_transitions(before.status()).contains(&next.status()));
                    }
                    review = next;
                }
                Err(_) => {
                    prop_assert_eq!(&review, &before);
                }
            }

            prop_assert!(!review.has_approved(&author.id));
            let mut ids = review.approvals().to_vec();
            ids.sort();
            ids.dedup();
            prop_assert_eq!(ids.len(), review.approval_count());
            if review.status() == ReviewStatus::Merged {
                prop_assert!(review.environment().is_some_and(Environment::is_ready));
                prop_assert!(review.approval_count() >= review.required_approvals(&quorum));
            }
        }
    }
}

#[test]
fn test_self_approval_rejected_for_every_role() {
    let now = Utc::now();
    for author in [User::author("a"), User::reviewer("b"), User::admin("c")] {
        let risk = RiskScorer::default().score(&RiskFactors::new(0.1, 0.1, 0.1, 0.1)).unwrap();
        let review = CodeReview::draft(ReviewId::new(), &author, DiffReference::new("d"), now)
            .with_risk(risk, now)
            .submit(&author, now)
            .unwrap();

        let err = review.approve(&author, &QuorumPolicy::default(), now).unwrap_err();
        assert!(matches!(err, ReviewError::UnauthorizedAction { .. }));
        assert_eq!(review.approval_count(), 0);
    }
}
