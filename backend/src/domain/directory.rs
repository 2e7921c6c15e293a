//! Team directory lookups and single-row membership edits.
//!
//! Membership (`user.team_id`) and management (`team.manager_id`) are
//! independent relations: moving a manager into another team leaves their
//! manager reference alone. All functions run inside a caller-owned
//! transaction.

use std::collections::BTreeSet;

use serde_json::json;

use super::ports::StoreTx;
use super::{Error, Team, TeamId, UserAccount, UserId};

/// Load a user or fail with `NOT_FOUND`.
pub async fn require_user(tx: &mut dyn StoreTx, user: UserId) -> Result<UserAccount, Error> {
    tx.user(user).await?.ok_or_else(|| {
        Error::not_found(format!("user {user} does not exist"))
            .with_details(json!({ "userId": user }))
    })
}

/// Load a team or fail with `NOT_FOUND`.
pub async fn require_team(tx: &mut dyn StoreTx, team: TeamId) -> Result<Team, Error> {
    tx.team(team).await?.ok_or_else(|| {
        Error::not_found(format!("team {team} does not exist"))
            .with_details(json!({ "teamId": team }))
    })
}

/// The team `user` belongs to.
pub async fn team_of(tx: &mut dyn StoreTx, user: UserId) -> Result<Option<TeamId>, Error> {
    Ok(require_user(tx, user).await?.team_id)
}

/// The team `manager` runs, if any.
pub async fn managed_team(tx: &mut dyn StoreTx, manager: UserId) -> Result<Option<TeamId>, Error> {
    Ok(tx.team_managed_by(manager).await?.map(|team| team.id))
}

/// Users whose membership points at `team`.
pub async fn members_of(tx: &mut dyn StoreTx, team: TeamId) -> Result<BTreeSet<UserId>, Error> {
    Ok(tx.users_in_team(team).await?.into_iter().collect())
}

/// Whether `manager` currently runs the team `user` belongs to.
pub async fn manages_member(
    tx: &mut dyn StoreTx,
    manager: UserId,
    user: UserId,
) -> Result<bool, Error> {
    let Some(team) = managed_team(tx, manager).await? else {
        return Ok(false);
    };
    Ok(tx.user(user).await?.and_then(|account| account.team_id) == Some(team))
}

/// Point `user` at `team`. Re-assigning to the same team is a no-op.
pub async fn assign_member(tx: &mut dyn StoreTx, user: UserId, team: TeamId) -> Result<(), Error> {
    require_team(tx, team).await?;
    let account = require_user(tx, user).await?;
    if account.team_id == Some(team) {
        return Ok(());
    }
    tx.set_user_team(user, Some(team)).await?;
    Ok(())
}

/// Clear `user`'s membership. Clearing an empty membership is a no-op.
pub async fn unassign_member(tx: &mut dyn StoreTx, user: UserId) -> Result<Option<TeamId>, Error> {
    let account = require_user(tx, user).await?;
    if account.team_id.is_some() {
        tx.set_user_team(user, None).await?;
    }
    Ok(account.team_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::MockStoreTx;
    use crate::domain::{ErrorCode, Role, UserStatus};
    use chrono::Utc;
    use mockall::predicate::eq;
    use rstest::rstest;

    fn account(id: UserId, team_id: Option<TeamId>) -> UserAccount {
        UserAccount {
            id,
            name: "Bea".to_owned(),
            email: "bea@example.test".to_owned(),
            role: Role::Collaborator,
            team_id,
            status: UserStatus::Active,
        }
    }

    fn team(id: TeamId) -> Team {
        Team {
            id,
            name: "Platform".to_owned(),
            description: None,
            manager_id: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn assigning_to_a_missing_team_is_not_found() {
        let mut tx = MockStoreTx::new();
        tx.expect_team().returning(|_| Ok(None));
        tx.expect_set_user_team().never();

        let err = assign_member(&mut tx, UserId::random(), TeamId::random())
            .await
            .expect_err("missing team");
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[tokio::test]
    async fn assigning_twice_writes_once() {
        let user = UserId::random();
        let team_id = TeamId::random();
        let mut tx = MockStoreTx::new();
        tx.expect_team().returning(move |id| Ok(Some(team(id))));
        tx.expect_user()
            .returning(move |id| Ok(Some(account(id, Some(team_id)))));
        tx.expect_set_user_team().never();

        assign_member(&mut tx, user, team_id)
            .await
            .expect("idempotent assignment");
    }

    #[tokio::test]
    async fn assignment_writes_membership() {
        let user = UserId::random();
        let team_id = TeamId::random();
        let mut tx = MockStoreTx::new();
        tx.expect_team().returning(move |id| Ok(Some(team(id))));
        tx.expect_user().returning(move |id| Ok(Some(account(id, None))));
        tx.expect_set_user_team()
            .with(eq(user), eq(Some(team_id)))
            .times(1)
            .returning(|_, _| Ok(()));

        assign_member(&mut tx, user, team_id)
            .await
            .expect("assignment succeeds");
    }

    #[rstest]
    #[case(None, 0)]
    #[case(Some(TeamId::random()), 1)]
    #[tokio::test]
    async fn unassignment_only_writes_when_needed(
        #[case] current: Option<TeamId>,
        #[case] writes: usize,
    ) {
        let user = UserId::random();
        let mut tx = MockStoreTx::new();
        tx.expect_user()
            .returning(move |id| Ok(Some(account(id, current))));
        tx.expect_set_user_team()
            .with(eq(user), eq(None))
            .times(writes)
            .returning(|_, _| Ok(()));

        let previous = unassign_member(&mut tx, user)
            .await
            .expect("unassignment succeeds");
        assert_eq!(previous, current);
    }

    #[tokio::test]
    async fn manages_member_compares_current_team() {
        let manager = UserId::random();
        let member = UserId::random();
        let team_id = TeamId::random();
        let mut tx = MockStoreTx::new();
        tx.expect_team_managed_by()
            .returning(move |_| Ok(Some(team(team_id))));
        tx.expect_user()
            .returning(move |id| Ok(Some(account(id, Some(team_id)))));

        assert!(manages_member(&mut tx, manager, member).await.expect("lookup"));
    }
}
