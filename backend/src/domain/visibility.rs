//! Visibility filter: which feedback an actor may observe.
//!
//! The scope is resolved once per request from the actor's role and the team
//! directory, then used twice: adapters translate it into a query predicate
//! for lists, and [`VisibilityScope::permits`] checks single-record reads.
//! Anonymous records need no read-time redaction because the author was
//! discarded when they were written.

use std::collections::BTreeSet;

use serde_json::json;

use super::ports::StoreTx;
use super::{Actor, Error, Feedback, Role, UserId, directory};

/// Resolved visibility predicate for one actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VisibilityScope {
    /// Administrators see every record.
    Unrestricted,
    /// Records the user authored or received.
    Participant(UserId),
    /// Participant records plus anything received by a member of the team
    /// the manager currently runs.
    TeamManager {
        manager: UserId,
        members: BTreeSet<UserId>,
    },
}

impl VisibilityScope {
    /// Resolve the scope for `actor` against current team membership.
    pub async fn resolve(tx: &mut dyn StoreTx, actor: &Actor) -> Result<Self, Error> {
        match actor.role {
            Role::Admin => Ok(Self::Unrestricted),
            Role::Collaborator => Ok(Self::Participant(actor.user_id)),
            Role::Manager => {
                let members = match directory::managed_team(tx, actor.user_id).await? {
                    Some(team) => directory::members_of(tx, team).await?,
                    None => BTreeSet::new(),
                };
                Ok(Self::TeamManager {
                    manager: actor.user_id,
                    members,
                })
            }
        }
    }

    /// Evaluate the predicate for one record.
    ///
    /// # Examples
    /// ```
    /// use feedback_engine::domain::{UserId, VisibilityScope};
    ///
    /// let scope = VisibilityScope::Participant(UserId::random());
    /// assert!(matches!(scope, VisibilityScope::Participant(_)));
    /// ```
    pub fn permits(&self, feedback: &Feedback) -> bool {
        match self {
            Self::Unrestricted => true,
            Self::Participant(user) => feedback.involves(*user),
            Self::TeamManager { manager, members } => {
                feedback.involves(*manager) || members.contains(&feedback.recipient_id())
            }
        }
    }

    /// Reject reads of a record outside the scope.
    pub fn ensure_permits(&self, feedback: &Feedback) -> Result<(), Error> {
        if self.permits(feedback) {
            return Ok(());
        }
        Err(Error::forbidden("feedback is outside the caller's visibility scope")
            .with_details(json!({
                "rule": "visibility",
                "feedbackId": feedback.id(),
            })))
    }

    /// Members of the managed team, empty for every other scope.
    pub fn managed_members(&self) -> BTreeSet<UserId> {
        match self {
            Self::TeamManager { members, .. } => members.clone(),
            _ => BTreeSet::new(),
        }
    }
}
