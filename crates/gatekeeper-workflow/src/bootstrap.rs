//! Composition root
//!
//! Wires the service to the in-memory adapters. Callers keep typed handles
//! to every adapter so they can steer or inspect them.

use crate::memory::{
    InMemoryCommentRepository, InMemoryReviewRepository, SimulatedProvisioner,
    StaticRiskAnalyzer,
};
use crate::ports::{Clock, NotificationPort};
use crate::service::{ReviewWorkflowService, WorkflowPorts};
use gatekeeper_core::{ReviewError, WorkflowConfig};
use std::sync::Arc;

/// Service plus the in-memory adapters behind it
#[derive(Debug, Clone)]
pub struct InMemoryRuntime {
    /// The service
    pub service: Arc<ReviewWorkflowService>,
    /// Review store
    pub reviews: Arc<InMemoryReviewRepository>,
    /// Comment store
    pub comments: Arc<InMemoryCommentRepository>,
    /// Risk analyzer
    pub risk: Arc<StaticRiskAnalyzer>,
    /// Environment provisioner
    pub environments: Arc<SimulatedProvisioner>,
}

impl InMemoryRuntime {
    /// Build with `notifier` and `clock`
    pub fn new(
        config: WorkflowConfig,
        notifier: Arc<dyn NotificationPort>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ReviewError> {
        Self::with_provisioner(config, SimulatedProvisioner::default(), notifier, clock)
    }

    /// Build with a preconfigured provisioner
    pub fn with_provisioner(
        config: WorkflowConfig,
        provisioner: SimulatedProvisioner,
        notifier: Arc<dyn NotificationPort>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ReviewError> {
        let reviews = Arc::new(InMemoryReviewRepository::new());
        let comments = Arc::new(InMemoryCommentRepository::new());
        let risk = Arc::new(StaticRiskAnalyzer::default());
        let environments = Arc::new(provisioner);

        let ports = WorkflowPorts {
            risk: risk.clone(),
            environments: environments.clone(),
            notifier,
            reviews: reviews.clone(),
            comments: comments.clone(),
            clock,
        };
        let service = Arc::new(ReviewWorkflowService::new(config, ports)?);
        tracing::debug!("In-memory runtime ready");

        Ok(Self {
            service,
            reviews,
            comments,
            risk,
            environments,
        })
    }
}
