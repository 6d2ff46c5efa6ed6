//! Core types for Gatekeeper
//!
//! Defines the identity and reference types shared by every component:
//! - ULID-backed identifiers (sortable by creation time)
//! - Users and their closed set of roles
//! - Ephemeral review environments
//! - Diff references handed to risk analysis

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ulid::Ulid;

macro_rules! ulid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Ulid);

        impl $name {
            /// Generate a new identifier
            #[inline]
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = ulid::DecodeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ulid::from_string(s).map(Self)
            }
        }
    };
}

ulid_id!(
    /// Unique code review identifier
    ReviewId
);
ulid_id!(
    /// Unique user identifier
    UserId
);
ulid_id!(
    /// Unique comment identifier
    CommentId
);
ulid_id!(
    /// Unique environment identifier
    EnvironmentId
);

/// Closed set of user roles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Submits reviews
    Author,
    /// Reviews and approves
    Reviewer,
    /// Full control, including merge and close of any review
    Admin,
}

impl Role {
    /// Whether the role may cast approvals and request changes
    #[inline]
    #[must_use]
    pub fn can_review(self) -> bool {
        matches!(self, Role::Reviewer | Role::Admin)
    }

    /// Whether the role carries administrative override
    #[inline]
    #[must_use]
    pub fn is_admin(self) -> bool {
        matches!(self, Role::Admin)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Author => "author",
            Role::Reviewer => "reviewer",
            Role::Admin => "admin",
        };
        f.write_str(name)
    }
}

/// A platform user. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    /// User ID
    pub id: UserId,
    /// Display name
    pub name: String,
    /// Role
    pub role: Role,
}

impl User {
    /// Create a user with a fresh identifier
    #[inline]
    #[must_use]
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            id: UserId::new(),
            name: name.into(),
            role,
        }
    }

    /// Author-role user
    #[inline]
    #[must_use]
    pub fn author(name: impl Into<String>) -> Self {
        Self::new(name, Role::Author)
    }

    /// Reviewer-role user
    #[inline]
    #[must_use]
    pub fn reviewer(name: impl Into<String>) -> Self {
        Self::new(name, Role::Reviewer)
    }

    /// Admin-role user
    #[inline]
    #[must_use]
    pub fn admin(name: impl Into<String>) -> Self {
        Self::new(name, Role::Admin)
    }

    /// Same user under a known identifier, for identities owned elsewhere
    #[inline]
    #[must_use]
    pub fn with_id(self, id: UserId) -> Self {
        Self { id, ..self }
    }
}

/// Opaque reference to the diff under review (branch pair, commit range, patch URL)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DiffReference(pub String);

impl DiffReference {
    /// Create a diff reference
    #[inline]
    #[must_use]
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Borrow the raw reference
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DiffReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Provisioning status of a review environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvironmentStatus {
    /// Requested, not yet usable
    Provisioning,
    /// Usable at its access URL
    Ready,
    /// Provisioning failed
    Failed,
    /// Torn down after merge or close
    Destroyed,
}

impl fmt::Display for EnvironmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EnvironmentStatus::Provisioning => "provisioning",
            EnvironmentStatus::Ready => "ready",
            EnvironmentStatus::Failed => "failed",
            EnvironmentStatus::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

/// Ephemeral environment attached to a review
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Environment ID
    pub id: EnvironmentId,
    /// Owning review
    pub review_id: ReviewId,
    /// Current status
    pub status: EnvironmentStatus,
    /// Access URL, present once ready
    pub url: Option<String>,
}

impl Environment {
    /// New environment in `Provisioning`
    #[inline]
    #[must_use]
    pub fn provisioning(review_id: ReviewId) -> Self {
        Self {
            id: EnvironmentId::new(),
            review_id,
            status: EnvironmentStatus::Provisioning,
            url: None,
        }
    }

    /// Same environment, now ready at `url`
    #[inline]
    #[must_use]
    pub fn ready(mut self, url: impl Into<String>) -> Self {
        self.status = EnvironmentStatus::Ready;
        self.url = Some(url.into());
        self
    }

    /// Same environment, marked failed
    #[inline]
    #[must_use]
    pub fn failed(mut self) -> Self {
        self.status = EnvironmentStatus::Failed;
        self.url = None;
        self
    }

    /// Same environment, marked destroyed
    #[inline]
    #[must_use]
    pub fn destroyed(mut self) -> Self {
        self.status = EnvironmentStatus::Destroyed;
        self.url = None;
        self
    }

    /// Whether the environment can host a merge check
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status == EnvironmentStatus::Ready
    }
}
