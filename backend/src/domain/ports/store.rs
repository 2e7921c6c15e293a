//! Transactional storage port over users, teams and feedback.
//!
//! [`Store::transaction`] is the only way into the rows. Every engine
//! operation, reads included, runs its checks and writes against one
//! [`StoreTx`] so a rule evaluated inside the closure still holds when the
//! closure's writes commit. Returning `Err` from the closure rolls back every
//! write it made.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use serde::Serialize;

use crate::domain::{
    Error, Feedback, FeedbackId, FeedbackKind, FeedbackStatus, Role, Team, TeamId, UserAccount,
    UserId, UserStatus, VisibilityScope,
};

use super::define_port_error;

define_port_error! {
    /// Errors raised by storage adapters.
    pub enum StoreError {
        /// The backing store could not be reached.
        Connection { message: String } =>
            "store connection failed: {message}",
        /// A query or mutation failed during execution.
        Query { message: String } =>
            "store query failed: {message}",
        /// A concurrent transaction touched the same rows first.
        Conflict { message: String } =>
            "store transaction conflicted: {message}",
        /// A uniqueness constraint rejected the write.
        Duplicate { message: String } =>
            "store rejected duplicate value: {message}",
    }
}

impl From<StoreError> for Error {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Connection { message } => Self::service_unavailable(message),
            StoreError::Query { message } => Self::internal(message),
            StoreError::Conflict { message } => {
                Self::conflict(format!("concurrent update detected, retry the request: {message}"))
            }
            StoreError::Duplicate { message } => Self::invalid_request(message),
        }
    }
}

/// Future returned by transaction bodies.
pub type TxFuture<'t, T> = BoxFuture<'t, Result<T, Error>>;

/// Atomic unit-of-work boundary.
pub trait Store: Send + Sync {
    /// Run `work` in one transaction. Commit on `Ok`, roll back on `Err`.
    ///
    /// Adapters that detect a serialisation failure at commit report it as
    /// [`crate::domain::ErrorCode::Conflict`].
    fn transaction<'s, T, F>(&'s self, work: F) -> BoxFuture<'s, Result<T, Error>>
    where
        T: Send + 's,
        F: for<'t> FnOnce(&'t mut dyn StoreTx) -> TxFuture<'t, T> + Send + 's;
}

/// Which feedback a listing selects before visibility is applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedbackSelection {
    /// Records received by the user.
    Received(UserId),
    /// Records authored by the user under their name.
    Sent(UserId),
    /// Records received by any of the users.
    RecipientIn(BTreeSet<UserId>),
    /// No selection beyond visibility.
    Everything,
}

impl FeedbackSelection {
    fn matches(&self, feedback: &Feedback) -> bool {
        match self {
            Self::Received(user) => feedback.recipient_id() == *user,
            Self::Sent(user) => feedback.author_id() == Some(*user),
            Self::RecipientIn(users) => users.contains(&feedback.recipient_id()),
            Self::Everything => true,
        }
    }
}

/// Largest page a listing may request.
pub const PAGE_SIZE_MAX: u32 = 100;
/// Page size used when none is given.
pub const PAGE_SIZE_DEFAULT: u32 = 20;

/// One-based page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    number: u32,
    size: u32,
}

impl Page {
    /// Validate a page request.
    ///
    /// # Examples
    /// ```
    /// use feedback_engine::domain::ports::Page;
    ///
    /// let page = Page::new(3, 10).expect("valid page");
    /// assert_eq!(page.offset(), 20);
    /// assert!(Page::new(0, 10).is_err());
    /// ```
    pub fn new(number: u32, size: u32) -> Result<Self, Error> {
        if number == 0 {
            return Err(Error::invalid_request("page number starts at 1"));
        }
        if size == 0 || size > PAGE_SIZE_MAX {
            return Err(Error::invalid_request(format!(
                "page size must be between 1 and {PAGE_SIZE_MAX}"
            )));
        }
        Ok(Self { number, size })
    }

    pub const fn number(&self) -> u32 {
        self.number
    }

    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Rows to skip.
    pub const fn offset(&self) -> u64 {
        (self.number as u64 - 1) * self.size as u64
    }
}

impl Default for Page {
    fn default() -> Self {
        Self {
            number: 1,
            size: PAGE_SIZE_DEFAULT,
        }
    }
}

/// Fully resolved listing predicate handed to adapters.
///
/// Adapters return matching records newest first, then apply the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedbackQuery {
    pub selection: FeedbackSelection,
    pub scope: VisibilityScope,
    pub status: Option<FeedbackStatus>,
    pub page: Page,
}

impl FeedbackQuery {
    /// Evaluate the whole predicate for one record, ignoring the page.
    pub fn matches(&self, feedback: &Feedback) -> bool {
        self.selection.matches(feedback)
            && self.scope.permits(feedback)
            && self.status.is_none_or(|status| feedback.status() == status)
    }
}

/// Population a report counts over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportScope {
    /// Every record.
    Organisation,
    /// Records whose team snapshot is the given team.
    Team(TeamId),
}

impl ReportScope {
    pub fn covers(&self, feedback: &Feedback) -> bool {
        match self {
            Self::Organisation => true,
            Self::Team(team) => feedback.team_id() == Some(*team),
        }
    }
}

/// Count of records sharing a status and kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedbackTally {
    pub status: FeedbackStatus,
    pub kind: FeedbackKind,
    pub count: u64,
}

/// Row access available inside a transaction.
///
/// `lock_*` reads take row locks that are held until the transaction ends.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StoreTx: Send {
    /// Fetch one user.
    async fn user(&mut self, id: UserId) -> Result<Option<UserAccount>, StoreError>;

    /// Users whose membership points at `team`.
    async fn users_in_team(&mut self, team: TeamId) -> Result<Vec<UserId>, StoreError>;

    /// Point a user's membership at `team`, or clear it.
    async fn set_user_team(
        &mut self,
        user: UserId,
        team: Option<TeamId>,
    ) -> Result<(), StoreError>;

    /// Clear every membership pointing at `team`, returning the affected users.
    async fn unassign_team_members(&mut self, team: TeamId) -> Result<Vec<UserId>, StoreError>;

    async fn set_user_role(&mut self, user: UserId, role: Role) -> Result<(), StoreError>;

    async fn set_user_status(&mut self, user: UserId, status: UserStatus)
    -> Result<(), StoreError>;

    /// Lock and return every active administrator.
    async fn lock_active_admins(&mut self) -> Result<Vec<UserId>, StoreError>;

    /// Fetch one team.
    async fn team(&mut self, id: TeamId) -> Result<Option<Team>, StoreError>;

    /// The team whose manager reference is `user`, if any.
    async fn team_managed_by(&mut self, user: UserId) -> Result<Option<Team>, StoreError>;

    /// Every team, ordered by name.
    async fn list_teams(&mut self) -> Result<Vec<Team>, StoreError>;

    /// Insert a team. Duplicate names fail with [`StoreError::Duplicate`].
    async fn insert_team(&mut self, team: &Team) -> Result<(), StoreError>;

    async fn set_team_manager(
        &mut self,
        team: TeamId,
        manager: Option<UserId>,
    ) -> Result<(), StoreError>;

    /// Clear every manager reference to `user`, returning the affected teams.
    async fn clear_managed_teams(&mut self, user: UserId) -> Result<Vec<TeamId>, StoreError>;

    /// Delete a team row, reporting whether it existed.
    async fn delete_team(&mut self, team: TeamId) -> Result<bool, StoreError>;

    async fn insert_feedback(&mut self, feedback: &Feedback) -> Result<(), StoreError>;

    /// Fetch one record without locking it.
    async fn feedback(&mut self, id: FeedbackId) -> Result<Option<Feedback>, StoreError>;

    /// Fetch one record and lock it for the rest of the transaction.
    async fn lock_feedback(&mut self, id: FeedbackId) -> Result<Option<Feedback>, StoreError>;

    async fn list_feedback(&mut self, query: &FeedbackQuery)
    -> Result<Vec<Feedback>, StoreError>;

    async fn update_feedback_status(
        &mut self,
        id: FeedbackId,
        status: FeedbackStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Delete a record, reporting whether it existed.
    async fn delete_feedback(&mut self, id: FeedbackId) -> Result<bool, StoreError>;

    /// Record counts grouped by status and kind.
    async fn feedback_tallies(
        &mut self,
        scope: ReportScope,
    ) -> Result<Vec<FeedbackTally>, StoreError>;
}
