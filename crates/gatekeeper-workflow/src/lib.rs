//! Gatekeeper Workflow - review orchestration over ports
//!
//! Drives the pure review domain from `gatekeeper-core` against external
//! systems:
//! - Port traits for risk analysis, environments, notifications, storage, time
//! - In-memory adapters for demos and tests
//! - [`ReviewWorkflowService`] with per-review locking
//! - A background escalation loop

#![warn(unreachable_pub)]

pub mod bootstrap;
pub mod clock;
pub mod escalator;
pub mod memory;
pub mod ports;
pub mod request;
pub mod service;

pub use bootstrap::InMemoryRuntime;
pub use clock::{ManualClock, SystemClock};
pub use escalator::EscalationLoop;
pub use memory::{
    InMemoryCommentRepository, InMemoryReviewRepository, LoggingNotifier, ProvisionMode,
    RecordingNotifier, SimulatedProvisioner, StaticRiskAnalyzer,
};
pub use ports::{
    Clock, CommentRepositoryPort, EnvironmentProvisioningPort, NotificationEvent,
    NotificationPort, ReviewRepositoryPort, RiskAnalysisPort,
};
pub use request::{
    CommentRequest, CreateReviewRequest, EnvironmentReport, ResubmitRequest, ReviewActionRequest,
    ReviewSummary, TickReport,
};
pub use service::{ReviewWorkflowService, WorkflowPorts};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
