//! Team and account administration.
//!
//! Structural changes run through the consistency guard inside one store
//! transaction; data-dependent authority checks (which team a manager runs)
//! are evaluated in that same transaction.

use std::sync::Arc;

use futures_util::FutureExt;
use mockable::Clock;
use serde_json::json;
use tracing::info;

use super::directory::{self, require_team, require_user};
use super::guard::{self, RoleChange, UserDeactivation};
use super::ports::{Store, StoreTx};
use super::policy::{authorize, require_admin};
use super::{
    Action, Actor, Error, NewTeam, Role, Team, TeamDeletion, TeamId, TeamRoster, UserId, observe,
};

/// Directory service over a transactional store.
#[derive(Clone)]
pub struct DirectoryService<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> DirectoryService<S> {
    /// Create a service over `store`, stamping times from `clock`.
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }
}

impl<S: Store> DirectoryService<S> {
    /// Create a team.
    ///
    /// Administrators may name any eligible manager. Managers may only name
    /// themselves or leave the team unmanaged.
    pub async fn create_team(&self, actor: &Actor, request: NewTeam) -> Result<Team, Error> {
        let result = self.create_team_inner(actor, request).await;
        result.inspect_err(|err| observe::rejection("create_team", actor, err))
    }

    async fn create_team_inner(&self, actor: &Actor, request: NewTeam) -> Result<Team, Error> {
        authorize(actor, Action::ManageTeams)?;
        let name = request.validated_name()?;
        if !actor.is_admin() && request.manager_id.is_some_and(|id| id != actor.user_id) {
            return Err(Error::forbidden("managers may only name themselves as team manager")
                .with_details(json!({
                    "action": Action::ManageTeams,
                    "role": actor.role,
                    "rule": "self_managed_team",
                })));
        }

        let team = Team {
            id: TeamId::random(),
            name,
            description: request.description,
            manager_id: request.manager_id,
            created_at: self.clock.utc(),
        };
        let (team, released) = self
            .store
            .transaction(move |tx| {
                async move {
                    let released = guard::create_team(tx, &team).await?;
                    Ok((team, released))
                }
                .boxed()
            })
            .await?;

        info!(
            team_id = %team.id,
            name = %team.name,
            manager = ?team.manager_id,
            released = ?released,
            "team created"
        );
        Ok(team)
    }

    /// Delete a team, unlinking members and manager atomically.
    pub async fn delete_team(&self, actor: &Actor, team: TeamId) -> Result<TeamDeletion, Error> {
        let result = self.delete_team_inner(actor, team).await;
        result.inspect_err(|err| observe::rejection("delete_team", actor, err))
    }

    async fn delete_team_inner(&self, actor: &Actor, team: TeamId) -> Result<TeamDeletion, Error> {
        require_admin(actor, Action::ManageTeams, "delete teams")?;
        let deletion = self
            .store
            .transaction(move |tx| guard::delete_team(tx, team).boxed())
            .await?;

        info!(
            team_id = %deletion.team_id,
            unassigned = deletion.unassigned_members.len(),
            cleared_manager = ?deletion.cleared_manager,
            "team deleted"
        );
        Ok(deletion)
    }

    /// Put `user` in `team`.
    ///
    /// Managers may only fill the team they run, and only with users who have
    /// no team yet.
    pub async fn assign_member(
        &self,
        actor: &Actor,
        user: UserId,
        team: TeamId,
    ) -> Result<(), Error> {
        let result = self.assign_member_inner(actor, user, team).await;
        result.inspect_err(|err| observe::rejection("assign_member", actor, err))
    }

    async fn assign_member_inner(
        &self,
        actor: &Actor,
        user: UserId,
        team: TeamId,
    ) -> Result<(), Error> {
        authorize(actor, Action::ManageTeams)?;
        let actor = *actor;
        self.store
            .transaction(move |tx| {
                async move {
                    require_team(tx, team).await?;
                    let account = require_user(tx, user).await?;
                    if !actor.is_admin() {
                        ensure_runs_team(tx, &actor, team).await?;
                        if account.team_id.is_some_and(|current| current != team) {
                            return Err(Error::forbidden(format!(
                                "user {user} belongs to another team"
                            ))
                            .with_details(json!({
                                "rule": "member_of_other_team",
                                "userId": user,
                            })));
                        }
                    }
                    directory::assign_member(tx, user, team).await
                }
                .boxed()
            })
            .await?;

        info!(user = %user, team_id = %team, actor = %actor.user_id, "member assigned");
        Ok(())
    }

    /// Take `user` out of their team. Users without a team are left alone.
    pub async fn remove_member(&self, actor: &Actor, user: UserId) -> Result<(), Error> {
        let result = self.remove_member_inner(actor, user).await;
        result.inspect_err(|err| observe::rejection("remove_member", actor, err))
    }

    async fn remove_member_inner(&self, actor: &Actor, user: UserId) -> Result<(), Error> {
        authorize(actor, Action::ManageTeams)?;
        let actor = *actor;
        let previous = self
            .store
            .transaction(move |tx| {
                async move {
                    let account = require_user(tx, user).await?;
                    let Some(current) = account.team_id else {
                        return Ok(None);
                    };
                    if !actor.is_admin() {
                        ensure_runs_team(tx, &actor, current).await?;
                    }
                    directory::unassign_member(tx, user).await
                }
                .boxed()
            })
            .await?;

        if let Some(team) = previous {
            info!(user = %user, team_id = %team, actor = %actor.user_id, "member removed");
        }
        Ok(())
    }

    /// Point `team` at a new manager, or clear it with `None`.
    pub async fn reassign_manager(
        &self,
        actor: &Actor,
        team: TeamId,
        manager: Option<UserId>,
    ) -> Result<Team, Error> {
        let result = self.reassign_manager_inner(actor, team, manager).await;
        result.inspect_err(|err| observe::rejection("reassign_manager", actor, err))
    }

    async fn reassign_manager_inner(
        &self,
        actor: &Actor,
        team: TeamId,
        manager: Option<UserId>,
    ) -> Result<Team, Error> {
        require_admin(actor, Action::ManageTeams, "reassign team managers")?;
        let updated = self
            .store
            .transaction(move |tx| guard::reassign_manager(tx, team, manager).boxed())
            .await?;

        info!(team_id = %team, manager = ?manager, actor = %actor.user_id, "team manager reassigned");
        Ok(updated)
    }

    /// Deactivate an account, refusing to remove the last active administrator.
    pub async fn deactivate_user(
        &self,
        actor: &Actor,
        user: UserId,
    ) -> Result<UserDeactivation, Error> {
        let result = self.deactivate_user_inner(actor, user).await;
        result.inspect_err(|err| observe::rejection("deactivate_user", actor, err))
    }

    async fn deactivate_user_inner(
        &self,
        actor: &Actor,
        user: UserId,
    ) -> Result<UserDeactivation, Error> {
        require_admin(actor, Action::ManageUsers, "deactivate users")?;
        let outcome = self
            .store
            .transaction(move |tx| guard::deactivate_user(tx, user).boxed())
            .await?;

        if outcome.changed {
            info!(
                user = %user,
                cleared_teams = ?outcome.cleared_teams,
                actor = %actor.user_id,
                "user deactivated"
            );
        }
        Ok(outcome)
    }

    /// Reactivate an account. Returns whether anything changed.
    pub async fn reactivate_user(&self, actor: &Actor, user: UserId) -> Result<bool, Error> {
        let result = self.reactivate_user_inner(actor, user).await;
        result.inspect_err(|err| observe::rejection("reactivate_user", actor, err))
    }

    async fn reactivate_user_inner(&self, actor: &Actor, user: UserId) -> Result<bool, Error> {
        require_admin(actor, Action::ManageUsers, "reactivate users")?;
        let changed = self
            .store
            .transaction(move |tx| guard::reactivate_user(tx, user).boxed())
            .await?;

        if changed {
            info!(user = %user, actor = %actor.user_id, "user reactivated");
        }
        Ok(changed)
    }

    /// Change an account's role.
    pub async fn change_role(
        &self,
        actor: &Actor,
        user: UserId,
        role: Role,
    ) -> Result<RoleChange, Error> {
        let result = self.change_role_inner(actor, user, role).await;
        result.inspect_err(|err| observe::rejection("change_role", actor, err))
    }

    async fn change_role_inner(
        &self,
        actor: &Actor,
        user: UserId,
        role: Role,
    ) -> Result<RoleChange, Error> {
        require_admin(actor, Action::ManageUsers, "change roles")?;
        let change = self
            .store
            .transaction(move |tx| guard::change_role(tx, user, role).boxed())
            .await?;

        if change.previous != change.role {
            info!(
                user = %user,
                from = %change.previous,
                to = %change.role,
                cleared_teams = ?change.cleared_teams,
                "role changed"
            );
        }
        Ok(change)
    }

    /// Every team, ordered by name. Administrators and managers only.
    pub async fn list_teams(&self, actor: &Actor) -> Result<Vec<Team>, Error> {
        let result = self.list_teams_inner(actor).await;
        result.inspect_err(|err| observe::rejection("list_teams", actor, err))
    }

    async fn list_teams_inner(&self, actor: &Actor) -> Result<Vec<Team>, Error> {
        authorize(actor, Action::ManageTeams)?;
        self.store
            .transaction(|tx| async move { Ok(tx.list_teams().await?) }.boxed())
            .await
    }

    /// A team and its members.
    ///
    /// Administrators may read any roster, managers the team they run or
    /// belong to, collaborators only their own team.
    pub async fn team_roster(&self, actor: &Actor, team: TeamId) -> Result<TeamRoster, Error> {
        let result = self.team_roster_inner(actor, team).await;
        result.inspect_err(|err| observe::rejection("team_roster", actor, err))
    }

    async fn team_roster_inner(&self, actor: &Actor, team: TeamId) -> Result<TeamRoster, Error> {
        authorize(actor, Action::ViewFeedback)?;
        let actor = *actor;
        self.store
            .transaction(move |tx| {
                async move {
                    let record = require_team(tx, team).await?;
                    if !actor.is_admin() {
                        let own_team = directory::team_of(tx, actor.user_id).await?;
                        let runs_it = record.manager_id == Some(actor.user_id)
                            && actor.role == Role::Manager;
                        if own_team != Some(team) && !runs_it {
                            return Err(Error::forbidden(format!(
                                "team {team} is outside the caller's teams"
                            ))
                            .with_details(json!({
                                "rule": "roster_visibility",
                                "role": actor.role,
                            })));
                        }
                    }
                    roster(tx, record).await
                }
                .boxed()
            })
            .await
    }

    /// The actor's own team, falling back to the team they manage.
    pub async fn my_team(&self, actor: &Actor) -> Result<Option<TeamRoster>, Error> {
        let result = self.my_team_inner(actor).await;
        result.inspect_err(|err| observe::rejection("my_team", actor, err))
    }

    async fn my_team_inner(&self, actor: &Actor) -> Result<Option<TeamRoster>, Error> {
        authorize(actor, Action::ViewFeedback)?;
        let actor = *actor;
        self.store
            .transaction(move |tx| {
                async move {
                    let team = match directory::team_of(tx, actor.user_id).await? {
                        Some(team) => Some(team),
                        None => directory::managed_team(tx, actor.user_id).await?,
                    };
                    let Some(team) = team else {
                        return Ok(None);
                    };
                    let record = require_team(tx, team).await?;
                    roster(tx, record).await.map(Some)
                }
                .boxed()
            })
            .await
    }
}

async fn ensure_runs_team(tx: &mut dyn StoreTx, actor: &Actor, team: TeamId) -> Result<(), Error> {
    if directory::managed_team(tx, actor.user_id).await? == Some(team) {
        return Ok(());
    }
    Err(Error::forbidden(format!("managers may only change the team they manage, not {team}"))
        .with_details(json!({
            "action": Action::ManageTeams,
            "role": actor.role,
            "rule": "managed_team",
            "teamId": team,
        })))
}

async fn roster(tx: &mut dyn StoreTx, team: Team) -> Result<TeamRoster, Error> {
    let members = directory::members_of(tx, team.id).await?;
    Ok(TeamRoster {
        team,
        members: members.into_iter().collect(),
    })
}
