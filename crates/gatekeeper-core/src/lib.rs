//! Gatekeeper Core - code review workflow domain
//!
//! The pure, synchronous half of the review engine:
//! - Risk scoring from externally supplied factors
//! - The review state machine and its transition guards
//! - Role-based authorization predicates
//! - Threaded comments
//! - SLA escalation with idempotent markers
//! - A hash-chained audit trail
//!
//! # Example
//!
//! ```rust
//! use chrono::Utc;
//! use gatekeeper_core::prelude::*;
//!
//! let author = User::author("alice");
//! let reviewer = User::reviewer("bob");
//! let now = Utc::now();
//!
//! let risk = RiskScorer::default()
//!     .score(&RiskFactors::new(0.2, 0.1, 0.1, 0.3))
//!     .unwrap();
//! let review = CodeReview::draft(ReviewId::new(), &author, DiffReference::new("main..topic"), now)
//!     .with_risk(risk, now)
//!     .submit(&author, now)
//!     .unwrap();
//!
//! let approved = review.approve(&reviewer, &QuorumPolicy::default(), now).unwrap();
//! assert_eq!(approved.status(), ReviewStatus::Approved);
//! ```

#![warn(unreachable_pub)]

pub mod audit;
pub mod authz;
pub mod comment;
pub mod config;
pub mod error;
pub mod escalation;
pub mod quorum;
pub mod review;
pub mod risk;
pub mod state_machine;
pub mod types;

// Re-exports for convenience
pub use audit::{AuditAction, AuditEntry, AuditError, AuditRecord, AuditTrail};
pub use comment::{Comment, CommentThread, NewComment};
pub use config::{CommentConfig, EnvironmentConfig, RiskConfig, SchedulerConfig, WorkflowConfig};
pub use error::ReviewError;
pub use escalation::{EscalationEvent, EscalationKey, EscalationScheduler, SlaPolicy, SlaSummary};
pub use quorum::QuorumPolicy;
pub use review::CodeReview;
pub use risk::{RiskFactors, RiskScore, RiskScorer, RiskTier, RiskWeights, TierThresholds};
pub use state_machine::{ReviewAction, ReviewStatus};
pub use types::{
    CommentId, DiffReference, Environment, EnvironmentId, EnvironmentStatus, ReviewId, Role, User,
    UserId,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for working with Gatekeeper Core
    pub use crate::{
        CodeReview, CommentThread, DiffReference, Environment, EscalationScheduler, NewComment,
        QuorumPolicy, ReviewError, ReviewId, ReviewStatus, RiskFactors, RiskScorer, RiskTier,
        RiskWeights, User, WorkflowConfig,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
