//! Permission policy: the fixed role/action table.
//!
//! [`can`] is the coarse check. Row-level narrowing (which feedback, which
//! team) happens in the visibility filter and the consistency guard.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{Actor, Error, Role, UserStatus};

/// Actions the engine gates by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    SendFeedback,
    ViewFeedback,
    ManageFeedback,
    ManageUsers,
    ManageTeams,
    ViewReports,
}

impl Action {
    /// Every gated action.
    pub const ALL: [Self; 6] = [
        Self::SendFeedback,
        Self::ViewFeedback,
        Self::ManageFeedback,
        Self::ManageUsers,
        Self::ManageTeams,
        Self::ViewReports,
    ];

    /// Stable label used in error details.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SendFeedback => "send_feedback",
            Self::ViewFeedback => "view_feedback",
            Self::ManageFeedback => "manage_feedback",
            Self::ManageUsers => "manage_users",
            Self::ManageTeams => "manage_teams",
            Self::ViewReports => "view_reports",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `role` may perform `action` at all.
///
/// # Examples
/// ```
/// use feedback_engine::domain::{Action, Role, can};
///
/// assert!(can(Role::Manager, Action::ViewReports));
/// assert!(!can(Role::Collaborator, Action::ManageTeams));
/// ```
pub const fn can(role: Role, action: Action) -> bool {
    match role {
        Role::Admin => true,
        Role::Manager => !matches!(action, Action::ManageUsers),
        Role::Collaborator => matches!(action, Action::SendFeedback | Action::ViewFeedback),
    }
}

/// Reject the actor unless it is active and its role allows `action`.
pub fn authorize(actor: &Actor, action: Action) -> Result<(), Error> {
    if actor.status == UserStatus::Inactive {
        return Err(Error::forbidden(format!(
            "inactive accounts may not {action}"
        ))
        .with_details(json!({
            "action": action,
            "rule": "active_account",
        })));
    }
    if !can(actor.role, action) {
        return Err(Error::forbidden(format!(
            "role {} may not {action}",
            actor.role
        ))
        .with_details(json!({
            "action": action,
            "role": actor.role,
        })));
    }
    Ok(())
}

/// Reject anyone who is not an active administrator.
///
/// Used where the role table grants a MANAGER the action in general but the
/// specific operation is reserved to administrators.
pub fn require_admin(actor: &Actor, action: Action, operation: &str) -> Result<(), Error> {
    authorize(actor, action)?;
    if !actor.is_admin() {
        return Err(Error::forbidden(format!(
            "only administrators may {operation}"
        ))
        .with_details(json!({
            "action": action,
            "role": actor.role,
            "rule": "admin_only",
            "operation": operation,
        })));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ErrorCode, UserId};
    use rstest::rstest;

    #[rstest]
    #[case(Role::Collaborator, Action::SendFeedback, true)]
    #[case(Role::Collaborator, Action::ViewFeedback, true)]
    #[case(Role::Collaborator, Action::ManageFeedback, false)]
    #[case(Role::Collaborator, Action::ManageTeams, false)]
    #[case(Role::Collaborator, Action::ViewReports, false)]
    #[case(Role::Manager, Action::ManageFeedback, true)]
    #[case(Role::Manager, Action::ManageTeams, true)]
    #[case(Role::Manager, Action::ViewReports, true)]
    #[case(Role::Manager, Action::ManageUsers, false)]
    fn role_table(#[case] role: Role, #[case] action: Action, #[case] allowed: bool) {
        assert_eq!(can(role, action), allowed);
    }

    #[rstest]
    fn admins_may_do_everything() {
        assert!(Action::ALL.iter().all(|action| can(Role::Admin, *action)));
    }

    #[rstest]
    fn denial_names_action_and_role() {
        let actor = Actor::new(UserId::random(), Role::Collaborator);
        let err = authorize(&actor, Action::ManageUsers).expect_err("denied");

        assert_eq!(err.code(), ErrorCode::Forbidden);
        assert_eq!(
            err.details(),
            Some(&json!({ "action": "manage_users", "role": "COLLABORATOR" }))
        );
    }

    #[rstest]
    fn inactive_admins_are_denied() {
        let actor = Actor::new(UserId::random(), Role::Admin).with_status(UserStatus::Inactive);
        let err = authorize(&actor, Action::ViewFeedback).expect_err("inactive");
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }

    #[rstest]
    fn managers_fail_admin_only_operations() {
        let actor = Actor::new(UserId::random(), Role::Manager);
        let err = require_admin(&actor, Action::ManageTeams, "delete teams").expect_err("admin only");
        assert_eq!(err.code(), ErrorCode::Forbidden);
        assert_eq!(err.message(), "only administrators may delete teams");
    }
}
