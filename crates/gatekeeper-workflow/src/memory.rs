//! In-memory adapters
//!
//! Used by the CLI demo and the test harness. Each adapter can be told to
//! fail so callers can exercise the service's error paths.

use crate::ports::{
    CommentRepositoryPort, EnvironmentProvisioningPort, NotificationEvent, NotificationPort,
    ReviewRepositoryPort, RiskAnalysisPort,
};
use async_trait::async_trait;
use dashmap::DashMap;
use gatekeeper_core::{
    CodeReview, Comment, DiffReference, Environment, EnvironmentId, ReviewError, ReviewId,
    RiskFactors,
};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Review store backed by a concurrent map
#[derive(Debug, Default)]
pub struct InMemoryReviewRepository {
    reviews: DashMap<ReviewId, CodeReview>,
}

impl InMemoryReviewRepository {
    /// Empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of one review without going through the port
    #[must_use]
    pub fn get(&self, id: ReviewId) -> Option<CodeReview> {
        self.reviews.get(&id).map(|r| r.value().clone())
    }

    /// Number of stored reviews
    #[must_use]
    pub fn len(&self) -> usize {
        self.reviews.len()
    }

    /// Whether nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reviews.is_empty()
    }
}

#[async_trait]
impl ReviewRepositoryPort for InMemoryReviewRepository {
    async fn load(&self, id: ReviewId) -> Result<CodeReview, ReviewError> {
        self.get(id).ok_or(ReviewError::NotFound(id))
    }

    async fn save(&self, review: &CodeReview) -> Result<(), ReviewError> {
        self.reviews.insert(review.id(), review.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<CodeReview>, ReviewError> {
        let mut all: Vec<CodeReview> = self.reviews.iter().map(|r| r.value().clone()).collect();
        all.sort_by_key(|r| (r.created_at(), r.id()));
        Ok(all)
    }
}

/// Comment store keyed by review
#[derive(Debug, Default)]
pub struct InMemoryCommentRepository {
    comments: DashMap<ReviewId, Vec<Comment>>,
}

impl InMemoryCommentRepository {
    /// Empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total comments across reviews
    #[must_use]
    pub fn len(&self) -> usize {
        self.comments.iter().map(|c| c.value().len()).sum()
    }

    /// Whether nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CommentRepositoryPort for InMemoryCommentRepository {
    async fn comments_for(&self, review_id: ReviewId) -> Result<Vec<Comment>, ReviewError> {
        Ok(self
            .comments
            .get(&review_id)
            .map(|c| c.value().clone())
            .unwrap_or_default())
    }

    async fn save(&self, comment: &Comment) -> Result<(), ReviewError> {
        self.comments
            .entry(comment.review_id)
            .or_default()
            .push(comment.clone());
        Ok(())
    }

    async fn remove(&self, comment: &Comment) -> Result<(), ReviewError> {
        if let Some(mut stored) = self.comments.get_mut(&comment.review_id) {
            stored.retain(|c| c.id != comment.id);
        }
        Ok(())
    }
}

/// Risk analyzer returning configured factors
///
/// Diffs without an override get the default factors.
#[derive(Debug)]
pub struct StaticRiskAnalyzer {
    default: RwLock<RiskFactors>,
    overrides: DashMap<String, RiskFactors>,
    failing: AtomicBool,
}

impl StaticRiskAnalyzer {
    /// Analyzer answering `default` for every diff
    #[must_use]
    pub fn new(default: RiskFactors) -> Self {
        Self {
            default: RwLock::new(default),
            overrides: DashMap::new(),
            failing: AtomicBool::new(false),
        }
    }

    /// Replace the default factors
    pub fn set_default(&self, factors: RiskFactors) {
        *self.default.write() = factors;
    }

    /// Answer `factors` for `diff`
    pub fn set_factors(&self, diff: impl Into<String>, factors: RiskFactors) {
        self.overrides.insert(diff.into(), factors);
    }

    /// Make every call fail (or stop failing)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Default for StaticRiskAnalyzer {
    fn default() -> Self {
        Self::new(RiskFactors::new(0.2, 0.2, 0.2, 0.2))
    }
}

#[async_trait]
impl RiskAnalysisPort for StaticRiskAnalyzer {
    async fn analyze(&self, diff: &DiffReference) -> Result<RiskFactors, ReviewError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ReviewError::external(
                "risk_analysis",
                format!("analyzer unavailable for {diff}"),
            ));
        }
        Ok(self
            .overrides
            .get(diff.as_str())
            .map_or_else(|| *self.default.read(), |f| *f.value()))
    }
}

/// How [`SimulatedProvisioner`] answers `provision`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProvisionMode {
    /// Environment is ready immediately
    #[default]
    Ready,
    /// Environment stays `Provisioning` until reported ready
    Pending,
    /// Provisioning fails
    Fail,
}

/// Provisioner that fabricates environments locally
#[derive(Debug)]
pub struct SimulatedProvisioner {
    base_url: String,
    mode: RwLock<ProvisionMode>,
    latency: Option<Duration>,
    teardown_failing: AtomicBool,
    provisioned: DashMap<EnvironmentId, ReviewId>,
    torn_down: Mutex<Vec<EnvironmentId>>,
}

impl SimulatedProvisioner {
    /// Provisioner serving environments under `base_url`
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            mode: RwLock::new(ProvisionMode::Ready),
            latency: None,
            teardown_failing: AtomicBool::new(false),
            provisioned: DashMap::new(),
            torn_down: Mutex::new(Vec::new()),
        }
    }

    /// Delay every provisioning call by `latency`
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Change how later calls behave
    pub fn set_mode(&self, mode: ProvisionMode) {
        *self.mode.write() = mode;
    }

    /// Make teardown fail (or stop failing)
    pub fn set_teardown_failing(&self, failing: bool) {
        self.teardown_failing.store(failing, Ordering::SeqCst);
    }

    /// Environments handed out and not yet destroyed
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.provisioned.len()
    }

    /// Environments destroyed so far, in order
    #[must_use]
    pub fn torn_down(&self) -> Vec<EnvironmentId> {
        self.torn_down.lock().clone()
    }
}

impl Default for SimulatedProvisioner {
    fn default() -> Self {
        Self::new("https://preview.gatekeeper.local")
    }
}

#[async_trait]
impl EnvironmentProvisioningPort for SimulatedProvisioner {
    async fn provision(&self, review_id: ReviewId) -> Result<Environment, ReviewError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let mode = *self.mode.read();
        let environment = match mode {
            ProvisionMode::Ready => {
                let env = Environment::provisioning(review_id);
                let url = format!("{}/{}", self.base_url, env.id);
                env.ready(url)
            }
            ProvisionMode::Pending => Environment::provisioning(review_id),
            ProvisionMode::Fail => {
                return Err(ReviewError::external(
                    "environment_provisioning",
                    format!("no capacity for review {review_id}"),
                ));
            }
        };
        self.provisioned.insert(environment.id, review_id);
        tracing::debug!("Provisioned environment {} for review {}", environment.id, review_id);
        Ok(environment)
    }

    async fn teardown(&self, environment_id: EnvironmentId) -> Result<(), ReviewError> {
        if self.teardown_failing.load(Ordering::SeqCst) {
            return Err(ReviewError::external(
                "environment_provisioning",
                format!("teardown of {environment_id} failed"),
            ));
        }
        self.provisioned.remove(&environment_id);
        self.torn_down.lock().push(environment_id);
        tracing::debug!("Tore down environment {}", environment_id);
        Ok(())
    }
}

/// Notifier that keeps every delivered event
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<NotificationEvent>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    /// Empty recorder
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Delivered events, in order
    #[must_use]
    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().clone()
    }

    /// Delivered escalations
    #[must_use]
    pub fn escalations(&self) -> Vec<NotificationEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.is_escalation())
            .cloned()
            .collect()
    }

    /// Forget delivered events
    pub fn clear(&self) {
        self.events.lock().clear();
    }

    /// Reject deliveries (or stop rejecting)
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl NotificationPort for RecordingNotifier {
    async fn notify(&self, event: NotificationEvent) -> Result<(), ReviewError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ReviewError::external("notification", "recipient unreachable"));
        }
        self.events.lock().push(event);
        Ok(())
    }
}

/// Notifier that writes events to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl NotificationPort for LoggingNotifier {
    async fn notify(&self, event: NotificationEvent) -> Result<(), ReviewError> {
        if event.is_escalation() {
            tracing::warn!("{}", event);
        } else {
            tracing::info!("{}", event);
        }
        Ok(())
    }
}
