//! Review workflow orchestration
//!
//! [`ReviewWorkflowService`] runs every use case the same way:
//! - take the review's lock
//! - load the aggregate and apply a pure transition
//! - call external ports where the use case needs them
//! - persist, append to the audit trail, then notify
//!
//! Operations on one review are serialized by a per-review async mutex;
//! different reviews proceed in parallel. A failed operation persists
//! nothing past the last successful step and emits no notification.

use crate::ports::{
    Clock, CommentRepositoryPort, EnvironmentProvisioningPort, NotificationEvent,
    NotificationPort, ReviewRepositoryPort, RiskAnalysisPort,
};
use crate::request::{
    CommentRequest, CreateReviewRequest, EnvironmentReport, ResubmitRequest, ReviewActionRequest,
    ReviewSummary, TickReport,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use gatekeeper_core::authz::authorize;
use gatekeeper_core::state_machine::check_action;
use gatekeeper_core::{
    AuditAction, AuditRecord, AuditTrail, CodeReview, Comment, CommentThread, Environment,
    EnvironmentStatus, EscalationScheduler, ReviewAction, ReviewError, ReviewId, ReviewStatus,
    RiskScorer, SlaSummary, User, UserId, WorkflowConfig,
};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Adapters the service drives
#[derive(Clone)]
pub struct WorkflowPorts {
    /// Risk analysis
    pub risk: Arc<dyn RiskAnalysisPort>,
    /// Environment provisioning
    pub environments: Arc<dyn EnvironmentProvisioningPort>,
    /// Notifications
    pub notifier: Arc<dyn NotificationPort>,
    /// Review storage
    pub reviews: Arc<dyn ReviewRepositoryPort>,
    /// Comment storage
    pub comments: Arc<dyn CommentRepositoryPort>,
    /// Time source
    pub clock: Arc<dyn Clock>,
}

impl fmt::Debug for WorkflowPorts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowPorts").finish_non_exhaustive()
    }
}

/// The review workflow application service
#[derive(Debug)]
pub struct ReviewWorkflowService {
    config: WorkflowConfig,
    scorer: RiskScorer,
    ports: WorkflowPorts,
    escalation: EscalationScheduler,
    audit: AuditTrail,
    /// One async lock per open review
    locks: DashMap<ReviewId, Arc<Mutex<()>>>,
}

impl ReviewWorkflowService {
    /// Create service, validating `config`
    pub fn new(config: WorkflowConfig, ports: WorkflowPorts) -> Result<Self, ReviewError> {
        config.validate()?;
        let scorer = config.scorer()?;
        Ok(Self {
            escalation: EscalationScheduler::new(config.sla),
            scorer,
            config,
            ports,
            audit: AuditTrail::new(),
            locks: DashMap::new(),
        })
    }

    /// Active configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Audit trail of accepted actions
    #[inline]
    #[must_use]
    pub fn audit_trail(&self) -> &AuditTrail {
        &self.audit
    }

    /// Escalation scheduler and its markers
    #[inline]
    #[must_use]
    pub fn escalation(&self) -> &EscalationScheduler {
        &self.escalation
    }

    /// Number of reviews with a live lock
    #[inline]
    #[must_use]
    pub fn tracked_reviews(&self) -> usize {
        self.locks.len()
    }

    /// Analyze, score and open a review.
    ///
    /// The draft is persisted before provisioning starts. If provisioning
    /// fails the draft stays in `Draft` and the error is returned; if risk
    /// analysis fails nothing is persisted.
    #[tracing::instrument(skip_all, fields(author = %request.author.id, diff = %request.diff))]
    pub async fn create_review(
        &self,
        request: CreateReviewRequest,
    ) -> Result<CodeReview, ReviewError> {
        let CreateReviewRequest { author, diff } = request;

        let factors = self.ports.risk.analyze(&diff).await.map_err(|e| {
            tracing::warn!("Risk analysis failed for {}: {}", diff, e);
            e
        })?;
        let risk = self.scorer.score(&factors)?;
        let tier = risk.tier;

        let review_id = ReviewId::new();
        let lock = self.lock_for(review_id);
        let _guard = lock.lock().await;

        let now = self.ports.clock.now();
        let draft = CodeReview::draft(review_id, &author, diff, now).with_risk(risk, now);
        self.ports.reviews.save(&draft).await?;
        self.record(&draft, Some(author.id), AuditAction::Create, None);

        let environment = self.provision(review_id).await.map_err(|e| {
            tracing::warn!("Review {} left in draft: {}", review_id, e);
            e
        })?;

        let now = self.ports.clock.now();
        let submitted = draft
            .with_environment(environment, now)
            .submit(&author, now)?;
        self.ports.reviews.save(&submitted).await?;
        self.record(
            &submitted,
            Some(author.id),
            AuditAction::Submit,
            Some(ReviewStatus::Draft),
        );

        tracing::info!(
            "Review {} opened: {} risk, {} approvals required",
            review_id,
            tier,
            submitted.required_approvals(&self.config.quorum)
        );
        self.announce(NotificationEvent::ReviewSubmitted { review_id, tier })
            .await;
        Ok(submitted)
    }

    /// Record an approval; the review becomes `Approved` at quorum
    #[tracing::instrument(
        skip_all,
        fields(review_id = %request.review_id, actor = %request.actor.id)
    )]
    pub async fn approve_review(
        &self,
        request: ReviewActionRequest,
    ) -> Result<CodeReview, ReviewError> {
        let ReviewActionRequest { review_id, actor } = request;
        let (from, review) = self
            .apply(review_id, &actor, AuditAction::Approve, |current, now| {
                current.approve(&actor, &self.config.quorum, now)
            })
            .await?;

        tracing::info!(
            "Review {} approved by {} ({}/{})",
            review_id,
            actor.name,
            review.approval_count(),
            review.required_approvals(&self.config.quorum)
        );
        if from != ReviewStatus::Approved && review.status() == ReviewStatus::Approved {
            self.announce(NotificationEvent::ReviewApproved {
                review_id,
                approvals: review.approval_count(),
            })
            .await;
        }
        Ok(review)
    }

    /// Send a review back to its author, clearing approvals
    #[tracing::instrument(
        skip_all,
        fields(review_id = %request.review_id, actor = %request.actor.id)
    )]
    pub async fn request_changes(
        &self,
        request: ReviewActionRequest,
    ) -> Result<CodeReview, ReviewError> {
        let ReviewActionRequest { review_id, actor } = request;
        let (_, review) = self
            .apply(review_id, &actor, AuditAction::RequestChanges, |current, now| {
                current.request_changes(&actor, now)
            })
            .await?;

        tracing::info!("Changes requested on review {} by {}", review_id, actor.name);
        self.announce(NotificationEvent::ChangesRequested {
            review_id,
            by: actor.id,
        })
        .await;
        Ok(review)
    }

    /// Return a review to `PendingReview`, re-scoring when the diff changed
    #[tracing::instrument(
        skip_all,
        fields(review_id = %request.review_id, actor = %request.actor.id)
    )]
    pub async fn resubmit_review(
        &self,
        request: ResubmitRequest,
    ) -> Result<CodeReview, ReviewError> {
        let ResubmitRequest {
            review_id,
            actor,
            diff,
        } = request;

        let lock = self.lock_for(review_id);
        let _guard = lock.lock().await;
        let current = self.ports.reviews.load(review_id).await?;

        let rescored = match diff {
            Some(diff) => {
                // Guards first so a rejected request never reaches the analyzer
                current.resubmit(&actor, None, self.ports.clock.now())?;
                let factors = self.ports.risk.analyze(&diff).await?;
                Some((diff, self.scorer.score(&factors)?))
            }
            None => None,
        };

        let review = current.resubmit(&actor, rescored, self.ports.clock.now())?;
        self.ports.reviews.save(&review).await?;
        self.record(
            &review,
            Some(actor.id),
            AuditAction::Resubmit,
            Some(current.status()),
        );

        tracing::info!(
            "Review {} resubmitted at version {}",
            review_id,
            review.content_version()
        );
        if let Some(tier) = review.tier() {
            self.announce(NotificationEvent::ReviewSubmitted { review_id, tier })
                .await;
        }
        Ok(review)
    }

    /// Merge an approved review and tear down its environment.
    ///
    /// Teardown happens before the merge is persisted; if it fails the
    /// review is left as it was. If the merge then cannot be saved, the
    /// review is stored unmerged with its environment destroyed, and a
    /// retry fails with `EnvironmentNotReady`.
    #[tracing::instrument(
        skip_all,
        fields(review_id = %request.review_id, actor = %request.actor.id)
    )]
    pub async fn merge_review(
        &self,
        request: ReviewActionRequest,
    ) -> Result<CodeReview, ReviewError> {
        let ReviewActionRequest { review_id, actor } = request;

        let lock = self.lock_for(review_id);
        let _guard = lock.lock().await;
        let current = self.ports.reviews.load(review_id).await?;

        let now = self.ports.clock.now();
        let merged = current
            .merge(&actor, &self.config.quorum, now)
            .map_err(|e| {
                tracing::debug!("Merge of review {} rejected: {}", review_id, e);
                e
            })?;

        if let Some(environment_id) = merged.environment().map(|e| e.id) {
            self.ports
                .environments
                .teardown(environment_id)
                .await
                .map_err(|e| {
                    tracing::warn!("Merge of review {} aborted: {}", review_id, e);
                    e
                })?;
        }
        let merged = merged.with_environment_destroyed(now);

        if let Err(e) = self.ports.reviews.save(&merged).await {
            // The environment is gone; keep the stored review truthful about it
            let unmerged = current.with_environment_destroyed(now);
            if let Err(compensation) = self.ports.reviews.save(&unmerged).await {
                tracing::error!(
                    "Review {} still records a live environment: {}",
                    review_id,
                    compensation
                );
            }
            tracing::warn!("Merge of review {} not persisted: {}", review_id, e);
            return Err(e);
        }
        self.record(
            &merged,
            Some(actor.id),
            AuditAction::Merge,
            Some(current.status()),
        );

        self.retire(review_id);

        tracing::info!("Review {} merged by {}", review_id, actor.name);
        self.announce(NotificationEvent::ReviewMerged {
            review_id,
            by: actor.id,
        })
        .await;
        Ok(merged)
    }

    /// Close a review without merging.
    ///
    /// The environment is torn down on a best-effort basis; a teardown
    /// failure is logged and leaves the environment recorded as it was.
    #[tracing::instrument(
        skip_all,
        fields(review_id = %request.review_id, actor = %request.actor.id)
    )]
    pub async fn close_review(
        &self,
        request: ReviewActionRequest,
    ) -> Result<CodeReview, ReviewError> {
        let ReviewActionRequest { review_id, actor } = request;

        let lock = self.lock_for(review_id);
        let _guard = lock.lock().await;
        let current = self.ports.reviews.load(review_id).await?;

        let now = self.ports.clock.now();
        let mut closed = current.close(&actor, now)?;

        let live = closed
            .environment()
            .filter(|e| e.status != EnvironmentStatus::Destroyed)
            .map(|e| e.id);
        if let Some(environment_id) = live {
            match self.ports.environments.teardown(environment_id).await {
                Ok(()) => closed = closed.with_environment_destroyed(now),
                Err(e) => tracing::warn!(
                    "Environment {} of closed review {} not torn down: {}",
                    environment_id,
                    review_id,
                    e
                ),
            }
        }

        self.ports.reviews.save(&closed).await?;
        self.record(
            &closed,
            Some(actor.id),
            AuditAction::Close,
            Some(current.status()),
        );

        self.retire(review_id);

        tracing::info!("Review {} closed by {}", review_id, actor.name);
        self.announce(NotificationEvent::ReviewClosed {
            review_id,
            by: actor.id,
        })
        .await;
        Ok(closed)
    }

    /// Post a comment or reply on an open review.
    ///
    /// The comment is stored first; if the review cannot be updated to
    /// reference it, the comment is removed again.
    #[tracing::instrument(
        skip_all,
        fields(review_id = %request.review_id, author = %request.author.id)
    )]
    pub async fn add_comment(&self, request: CommentRequest) -> Result<Comment, ReviewError> {
        let CommentRequest {
            review_id,
            author,
            comment,
        } = request;

        let lock = self.lock_for(review_id);
        let _guard = lock.lock().await;
        let review = self.ports.reviews.load(review_id).await?;

        check_action(review.status(), ReviewAction::Comment)?;
        authorize(
            ReviewAction::Comment,
            &author,
            &review.author(),
            review.status(),
        )?;

        let existing = self.ports.comments.comments_for(review_id).await?;
        let mut thread = CommentThread::new(review_id, existing)
            .with_max_body_len(self.config.comments.max_body_len);

        let now = self.ports.clock.now();
        let posted = thread.add(author.id, comment, now)?;
        self.ports.comments.save(&posted).await?;

        let updated = review.with_comment(posted.id, now);
        if let Err(e) = self.ports.reviews.save(&updated).await {
            if let Err(cleanup) = self.ports.comments.remove(&posted).await {
                tracing::error!("Comment {} left orphaned: {}", posted.id, cleanup);
            }
            return Err(e);
        }
        self.record(
            &updated,
            Some(author.id),
            AuditAction::Comment,
            Some(review.status()),
        );

        tracing::debug!(
            "Comment {} posted on review {} at depth {}",
            posted.id,
            review_id,
            thread.depth(posted.id)
        );
        Ok(posted)
    }

    /// Attach the latest provisioning status reported for a review.
    ///
    /// Reports for merged or closed reviews, or for an environment other
    /// than the one attached, are rejected.
    #[tracing::instrument(
        skip_all,
        fields(review_id = %report.review_id, status = %report.environment.status)
    )]
    pub async fn record_environment(
        &self,
        report: EnvironmentReport,
    ) -> Result<CodeReview, ReviewError> {
        let EnvironmentReport {
            review_id,
            environment,
        } = report;
        if environment.review_id != review_id {
            return Err(ReviewError::external(
                "environment_provisioning",
                format!(
                    "environment {} belongs to review {}, not {}",
                    environment.id, environment.review_id, review_id
                ),
            ));
        }

        let lock = self.lock_for(review_id);
        let _guard = lock.lock().await;
        let current = self.ports.reviews.load(review_id).await?;

        let status = environment.status;
        let updated = current
            .report_environment(environment, self.ports.clock.now())
            .map_err(|e| {
                tracing::debug!("Environment report for review {} rejected: {}", review_id, e);
                e
            })?;
        self.ports.reviews.save(&updated).await?;
        self.record(
            &updated,
            None,
            AuditAction::EnvironmentUpdate,
            Some(current.status()),
        );

        tracing::info!("Environment of review {} is {}", review_id, status);
        Ok(updated)
    }

    /// Run one escalation pass over every stored review
    #[tracing::instrument(skip(self))]
    pub async fn run_escalation_tick(&self) -> Result<TickReport, ReviewError> {
        let now = self.ports.clock.now();
        let reviews = self.ports.reviews.list().await?;

        let events = self.escalation.tick(now, &reviews);
        futures::future::join_all(
            events
                .iter()
                .cloned()
                .map(|e| self.announce(NotificationEvent::Escalation(e))),
        )
        .await;

        let summary = self.escalation.summary(now, &reviews);
        Ok(TickReport {
            at: now,
            events,
            summary,
        })
    }

    /// Load one review
    pub async fn get_review(&self, review_id: ReviewId) -> Result<CodeReview, ReviewError> {
        self.ports.reviews.load(review_id).await
    }

    /// Display summary of one review
    pub async fn review_summary(&self, review_id: ReviewId) -> Result<ReviewSummary, ReviewError> {
        let review = self.get_review(review_id).await?;
        Ok(ReviewSummary::of(&review, &self.config.quorum))
    }

    /// Every review, oldest first
    pub async fn list_reviews(&self) -> Result<Vec<CodeReview>, ReviewError> {
        self.ports.reviews.list().await
    }

    /// Comments on a review in display order
    pub async fn comments(&self, review_id: ReviewId) -> Result<Vec<Comment>, ReviewError> {
        self.ports.reviews.load(review_id).await?;
        let stored = self.ports.comments.comments_for(review_id).await?;
        Ok(CommentThread::new(review_id, stored).ordered().to_vec())
    }

    /// SLA standing of open reviews right now
    pub async fn sla_summary(&self) -> Result<SlaSummary, ReviewError> {
        let reviews = self.ports.reviews.list().await?;
        Ok(self.escalation.summary(self.ports.clock.now(), &reviews))
    }

    /// Load, transform and persist under the review's lock.
    /// Returns the state before the transition and the new review.
    async fn apply<F>(
        &self,
        review_id: ReviewId,
        actor: &User,
        action: AuditAction,
        transition: F,
    ) -> Result<(ReviewStatus, CodeReview), ReviewError>
    where
        F: FnOnce(&CodeReview, DateTime<Utc>) -> Result<CodeReview, ReviewError>,
    {
        let lock = self.lock_for(review_id);
        let _guard = lock.lock().await;
        let current = self.ports.reviews.load(review_id).await?;

        let next = transition(&current, self.ports.clock.now()).map_err(|e| {
            tracing::debug!("{} on review {} rejected: {}", action, review_id, e);
            e
        })?;
        self.ports.reviews.save(&next).await?;
        self.record(&next, Some(actor.id), action, Some(current.status()));
        Ok((current.status(), next))
    }

    async fn provision(&self, review_id: ReviewId) -> Result<Environment, ReviewError> {
        let timeout = self.config.environment.provision_timeout();
        let environment =
            tokio::time::timeout(timeout, self.ports.environments.provision(review_id))
                .await
                .map_err(|_| {
                    ReviewError::external(
                        "environment_provisioning",
                        format!("no answer within {}s", timeout.as_secs()),
                    )
                })??;

        if environment.status == EnvironmentStatus::Failed {
            return Err(ReviewError::external(
                "environment_provisioning",
                format!("environment {} failed to start", environment.id),
            ));
        }
        Ok(environment)
    }

    fn lock_for(&self, review_id: ReviewId) -> Arc<Mutex<()>> {
        Arc::clone(self.locks.entry(review_id).or_default().value())
    }

    // Terminal reviews reject every write, so their lock and markers can go.
    // Callers still hold their own handle to the lock.
    fn retire(&self, review_id: ReviewId) {
        let dropped = self.escalation.forget(review_id);
        self.locks.remove(&review_id);
        tracing::debug!("Review {} retired, {} escalation markers dropped", review_id, dropped);
    }

    fn record(
        &self,
        review: &CodeReview,
        actor: Option<UserId>,
        action: AuditAction,
        from: Option<ReviewStatus>,
    ) {
        self.audit.append(AuditRecord {
            review_id: review.id(),
            actor,
            action,
            from,
            to: review.status(),
            timestamp: review.updated_at(),
        });
    }

    async fn announce(&self, event: NotificationEvent) {
        let review_id = event.review_id();
        if let Err(e) = self.ports.notifier.notify(event).await {
            tracing::warn!("Notification for review {} not delivered: {}", review_id, e);
        }
    }
}
