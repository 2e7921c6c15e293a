//! Consistency guard: multi-row structural mutations.
//!
//! Each function performs every read it depends on and every write it needs
//! against the same transaction, so the caller's commit either lands the
//! whole change or none of it. The last-administrator check locks every
//! active administrator row before counting; two concurrent deactivations
//! of different administrators therefore serialise on the same rows.

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::directory::{require_team, require_user};
use super::ports::StoreTx;
use super::{Error, Role, Team, TeamDeletion, TeamId, UserAccount, UserId, UserStatus};

/// Outcome of a deactivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserDeactivation {
    pub user_id: UserId,
    /// Teams whose manager reference was cleared.
    pub cleared_teams: Vec<TeamId>,
    /// `false` when the account was already inactive.
    pub changed: bool,
}

/// Outcome of a role change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleChange {
    pub user_id: UserId,
    pub previous: Role,
    pub role: Role,
    /// Teams whose manager reference was cleared.
    pub cleared_teams: Vec<TeamId>,
}

/// Fail with `LAST_ADMIN` if removing `leaving` would leave no active
/// administrator.
pub async fn ensure_admin_survives(tx: &mut dyn StoreTx, leaving: UserId) -> Result<(), Error> {
    let admins = tx.lock_active_admins().await?;
    let remaining = admins.iter().filter(|admin| **admin != leaving).count();
    if remaining == 0 {
        return Err(Error::last_admin(
            "the organisation must keep at least one active administrator",
        )
        .with_details(json!({
            "rule": "last_admin",
            "userId": leaving,
            "activeAdmins": admins.len(),
        })));
    }
    Ok(())
}

/// Check that `candidate` may be named a team manager.
pub async fn require_manager_candidate(
    tx: &mut dyn StoreTx,
    candidate: UserId,
) -> Result<UserAccount, Error> {
    let account = require_user(tx, candidate).await?;
    if !account.is_active() {
        return Err(Error::invalid_request(format!(
            "user {candidate} is inactive and cannot manage a team"
        ))
        .with_details(json!({ "rule": "manager_active", "userId": candidate })));
    }
    if account.role == Role::Collaborator {
        return Err(Error::invalid_request(format!(
            "user {candidate} holds role {} and cannot manage a team",
            account.role
        ))
        .with_details(json!({
            "rule": "manager_role",
            "userId": candidate,
            "role": account.role,
        })));
    }
    Ok(account)
}

/// Insert `team`, first releasing its manager from any other team.
pub async fn create_team(tx: &mut dyn StoreTx, team: &Team) -> Result<Vec<TeamId>, Error> {
    let mut released = Vec::new();
    if let Some(manager) = team.manager_id {
        require_manager_candidate(tx, manager).await?;
        released = tx.clear_managed_teams(manager).await?;
    }
    tx.insert_team(team).await?;
    Ok(released)
}

/// Unlink every member and the manager, then delete the team row.
pub async fn delete_team(tx: &mut dyn StoreTx, team_id: TeamId) -> Result<TeamDeletion, Error> {
    let team = require_team(tx, team_id).await?;
    let unassigned_members = tx.unassign_team_members(team_id).await?;
    if team.manager_id.is_some() {
        tx.set_team_manager(team_id, None).await?;
    }
    if !tx.delete_team(team_id).await? {
        return Err(Error::conflict(format!(
            "team {team_id} was removed by a concurrent request"
        )));
    }
    Ok(TeamDeletion {
        team_id,
        unassigned_members,
        cleared_manager: team.manager_id,
    })
}

/// Point `team_id` at `manager` (or clear it), releasing the new manager from
/// any team they previously ran.
pub async fn reassign_manager(
    tx: &mut dyn StoreTx,
    team_id: TeamId,
    manager: Option<UserId>,
) -> Result<Team, Error> {
    let mut team = require_team(tx, team_id).await?;
    if let Some(candidate) = manager {
        require_manager_candidate(tx, candidate).await?;
        if team.manager_id == Some(candidate) {
            return Ok(team);
        }
        if let Some(previous) = tx.team_managed_by(candidate).await? {
            tx.set_team_manager(previous.id, None).await?;
        }
    }
    if team.manager_id != manager {
        tx.set_team_manager(team_id, manager).await?;
    }
    team.manager_id = manager;
    Ok(team)
}

/// Flip `user` to inactive, clearing any team they managed.
///
/// Already-inactive users are left untouched.
pub async fn deactivate_user(
    tx: &mut dyn StoreTx,
    user: UserId,
) -> Result<UserDeactivation, Error> {
    let account = require_user(tx, user).await?;
    if !account.is_active() {
        return Ok(UserDeactivation {
            user_id: user,
            cleared_teams: Vec::new(),
            changed: false,
        });
    }
    if account.role == Role::Admin {
        ensure_admin_survives(tx, user).await?;
    }
    let cleared_teams = tx.clear_managed_teams(user).await?;
    tx.set_user_status(user, UserStatus::Inactive).await?;
    Ok(UserDeactivation {
        user_id: user,
        cleared_teams,
        changed: true,
    })
}

/// Flip `user` back to active. Returns whether anything changed.
pub async fn reactivate_user(tx: &mut dyn StoreTx, user: UserId) -> Result<bool, Error> {
    let account = require_user(tx, user).await?;
    if account.is_active() {
        return Ok(false);
    }
    tx.set_user_status(user, UserStatus::Active).await?;
    Ok(true)
}

/// Change `user`'s role. Demotion out of ADMIN is subject to the
/// last-administrator check; demotion to COLLABORATOR clears managed teams.
pub async fn change_role(
    tx: &mut dyn StoreTx,
    user: UserId,
    role: Role,
) -> Result<RoleChange, Error> {
    let account = require_user(tx, user).await?;
    let mut change = RoleChange {
        user_id: user,
        previous: account.role,
        role,
        cleared_teams: Vec::new(),
    };
    if account.role == role {
        return Ok(change);
    }
    if account.is_active_admin() {
        ensure_admin_survives(tx, user).await?;
    }
    if role == Role::Collaborator {
        change.cleared_teams = tx.clear_managed_teams(user).await?;
    }
    tx.set_user_role(user, role).await?;
    Ok(change)
}
