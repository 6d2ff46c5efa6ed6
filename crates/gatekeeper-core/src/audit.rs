//! Hash-chained audit trail
//!
//! Every accepted workflow action appends one entry. Each entry commits to
//! its predecessor's hash, so any later edit to the log is detectable with
//! [`AuditTrail::verify_integrity`].

use crate::state_machine::ReviewStatus;
use crate::types::{ReviewId, UserId};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Audited action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// Review created
    Create,
    /// Draft submitted
    Submit,
    /// Approval recorded
    Approve,
    /// Changes requested
    RequestChanges,
    /// Resubmitted after changes
    Resubmit,
    /// Merged
    Merge,
    /// Closed
    Close,
    /// Comment posted
    Comment,
    /// Environment status reported
    EnvironmentUpdate,
}

impl AuditAction {
    fn as_str(self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Submit => "submit",
            AuditAction::Approve => "approve",
            AuditAction::RequestChanges => "request_changes",
            AuditAction::Resubmit => "resubmit",
            AuditAction::Merge => "merge",
            AuditAction::Close => "close",
            AuditAction::Comment => "comment",
            AuditAction::EnvironmentUpdate => "environment_update",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened, before it is chained
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    /// Review concerned
    pub review_id: ReviewId,
    /// Acting user; `None` for system-driven updates
    pub actor: Option<UserId>,
    /// Action
    pub action: AuditAction,
    /// State before
    pub from: Option<ReviewStatus>,
    /// State after
    pub to: ReviewStatus,
    /// When
    pub timestamp: DateTime<Utc>,
}

/// A chained audit entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Position in the log, from 0
    pub sequence: u64,
    /// Review concerned
    pub review_id: ReviewId,
    /// Acting user
    pub actor: Option<UserId>,
    /// Action
    pub action: AuditAction,
    /// State before
    pub from: Option<ReviewStatus>,
    /// State after
    pub to: ReviewStatus,
    /// When
    pub timestamp: DateTime<Utc>,
    /// Hash of the previous entry (zero for the first)
    pub prev_hash: [u8; 32],
    /// Hash of this entry
    pub hash: [u8; 32],
}

/// Audit trail errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuditError {
    /// An entry does not match its recorded hash or predecessor
    #[error("audit chain broken at entry {sequence}")]
    IntegrityViolation {
        /// First bad entry
        sequence: u64,
    },
}

/// Append-only, hash-chained log
#[derive(Debug, Default)]
pub struct AuditTrail {
    inner: Mutex<Vec<AuditEntry>>,
}

impl AuditTrail {
    /// Empty trail
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record, returning its sequence number
    pub fn append(&self, record: AuditRecord) -> u64 {
        let mut guard = self.inner.lock();
        let prev_hash = guard.last().map_or([0u8; 32], |e| e.hash);
        let mut entry = AuditEntry {
            sequence: guard.len() as u64,
            review_id: record.review_id,
            actor: record.actor,
            action: record.action,
            from: record.from,
            to: record.to,
            timestamp: record.timestamp,
            prev_hash,
            hash: [0u8; 32],
        };
        entry.hash = compute_hash(&entry);
        let sequence = entry.sequence;
        guard.push(entry);
        sequence
    }

    /// Snapshot of all entries
    #[must_use]
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.inner.lock().clone()
    }

    /// Entries for one review, in order
    #[must_use]
    pub fn entries_for(&self, review_id: ReviewId) -> Vec<AuditEntry> {
        self.inner
            .lock()
            .iter()
            .filter(|e| e.review_id == review_id)
            .cloned()
            .collect()
    }

    /// Number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether the trail is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Hex hash of the latest entry
    #[must_use]
    pub fn head(&self) -> Option<String> {
        self.inner.lock().last().map(|e| hex::encode(e.hash))
    }

    /// Recompute the chain and report the first broken link
    pub fn verify_integrity(&self) -> Result<(), AuditError> {
        let guard = self.inner.lock();
        verify_chain(&guard)
    }
}

/// Verify an exported chain
pub fn verify_chain(entries: &[AuditEntry]) -> Result<(), AuditError> {
    let mut prev = [0u8; 32];
    for e in entries {
        if e.prev_hash != prev || e.hash != compute_hash(e) {
            return Err(AuditError::IntegrityViolation {
                sequence: e.sequence,
            });
        }
        prev = e.hash;
    }
    Ok(())
}

fn compute_hash(entry: &AuditEntry) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(entry.sequence.to_le_bytes());
    hasher.update(entry.review_id.0.to_bytes());
    match entry.actor {
        Some(actor) => hasher.update(actor.0.to_bytes()),
        None => hasher.update([0u8; 16]),
    }
    hasher.update(entry.action.as_str().as_bytes());
    hasher.update([0]);
    if let Some(from) = entry.from {
        hasher.update(from.to_string().as_bytes());
    }
    hasher.update([0]);
    hasher.update(entry.to.to_string().as_bytes());
    hasher.update([0]);
    hasher.update(entry.timestamp.timestamp_micros().to_le_bytes());
    hasher.update(entry.prev_hash);
    hasher.finalize().into()
}
