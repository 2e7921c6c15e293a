//! User identity as seen by the access-control engine.
//!
//! The identity subsystem owns user records; this engine only reads a user's
//! role, team membership and status, and flips status or role through the
//! consistency guard. Password hashes never cross into the domain.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{TeamId, UserId};

/// Error raised when a stored enum label is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariantError {
    /// Which enum was being parsed.
    pub kind: &'static str,
    /// The rejected label.
    pub value: String,
}

impl UnknownVariantError {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

/// Organisation role carried in identity claims.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    /// Full control over users, teams and feedback.
    Admin,
    /// Oversees the team they manage.
    Manager,
    /// Sends and receives feedback.
    Collaborator,
}

impl Role {
    /// Stable storage label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ADMIN",
            Self::Manager => "MANAGER",
            Self::Collaborator => "COLLABORATOR",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownVariantError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ADMIN" => Ok(Self::Admin),
            "MANAGER" => Ok(Self::Manager),
            "COLLABORATOR" => Ok(Self::Collaborator),
            other => Err(UnknownVariantError::new("role", other)),
        }
    }
}

/// Account status. Users are never hard-deleted; they become inactive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserStatus {
    /// The account may act.
    Active,
    /// The account has been deactivated.
    Inactive,
}

impl UserStatus {
    /// Stable storage label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
        }
    }
}

impl FromStr for UserStatus {
    type Err = UnknownVariantError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "ACTIVE" => Ok(Self::Active),
            "INACTIVE" => Ok(Self::Inactive),
            other => Err(UnknownVariantError::new("user status", other)),
        }
    }
}

/// The slice of a user record the engine reads and mutates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAccount {
    /// Stable identifier.
    pub id: UserId,
    /// Display name.
    pub name: String,
    /// Contact address.
    pub email: String,
    /// Organisation role.
    pub role: Role,
    /// Team membership; a weak back-reference into the team table.
    pub team_id: Option<TeamId>,
    /// Account status.
    pub status: UserStatus,
}

impl UserAccount {
    /// Whether the account is active.
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }

    /// Whether the account is an active administrator.
    pub fn is_active_admin(&self) -> bool {
        self.role == Role::Admin && self.is_active()
    }
}

/// Already-authenticated principal handed to the engine per request.
///
/// The engine never verifies signatures; the claims are trusted as decoded
/// by the identity layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    /// Authenticated user.
    pub user_id: UserId,
    /// Role carried in the claims.
    pub role: Role,
    /// Account status carried in the claims.
    pub status: UserStatus,
}

impl Actor {
    /// Build claims for an active account.
    pub const fn new(user_id: UserId, role: Role) -> Self {
        Self {
            user_id,
            role,
            status: UserStatus::Active,
        }
    }

    /// Replace the status carried in the claims.
    #[must_use]
    pub const fn with_status(mut self, status: UserStatus) -> Self {
        self.status = status;
        self
    }

    /// Whether the actor is an administrator.
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
