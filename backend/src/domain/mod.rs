//! Access-control and lifecycle engine for the feedback platform.
//!
//! Purpose: decide, for every feedback record, who may see it and who may
//! move it through its lifecycle, and keep team membership, team management
//! and the administrator population consistent under concurrent requests.
//! The domain talks to storage only through [`ports::Store`].
//!
//! Public surface:
//! - [`FeedbackService`]: create, read, list, transition, delete, report.
//! - [`DirectoryService`]: teams, membership, manager and account changes.
//! - [`can`] / [`authorize`]: the role/action permission table.
//! - [`check_transition`]: the feedback state machine.
//! - [`VisibilityScope`]: the per-actor visibility predicate.
//! - [`Error`] / [`ErrorCode`]: transport-agnostic failures naming the rule
//!   that was violated.

pub mod directory;
mod directory_service;
pub mod error;
mod feedback;
mod feedback_service;
pub mod guard;
mod ids;
mod lifecycle;
mod observe;
pub mod policy;
pub mod ports;
mod reports;
mod team;
mod user;
mod visibility;

pub use self::directory_service::DirectoryService;
pub use self::error::{Error, ErrorCode, ErrorValidationError};
pub use self::feedback::{
    Feedback, FeedbackKind, FeedbackSnapshot, FeedbackValidationError, NewFeedback, SCORE_MAX,
    Score, TITLE_MAX,
};
pub use self::feedback_service::{FeedbackDirection, FeedbackListRequest, FeedbackService};
pub use self::guard::{RoleChange, UserDeactivation};
pub use self::ids::{FeedbackId, IdValidationError, TeamId, UserId};
pub use self::lifecycle::{ActorStanding, FeedbackStatus, check_transition};
pub use self::policy::{Action, authorize, can};
pub use self::reports::FeedbackReport;
pub use self::team::{NewTeam, TEAM_NAME_MAX, Team, TeamDeletion, TeamRoster};
pub use self::user::{Actor, Role, UnknownVariantError, UserAccount, UserStatus};
pub use self::visibility::VisibilityScope;

/// Result alias for engine operations.
///
/// # Examples
/// ```
/// use feedback_engine::domain::{EngineResult, Error};
///
/// fn refuse() -> EngineResult<()> {
///     Err(Error::forbidden("nope"))
/// }
/// assert!(refuse().is_err());
/// ```
pub type EngineResult<T> = Result<T, Error>;
