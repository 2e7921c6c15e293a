//! In-process store.
//!
//! Transactions are serialised behind one async mutex. Each transaction runs
//! against a copy of the state which replaces the committed state only when
//! the work returns `Ok`, so a failed transaction leaves nothing behind.
//! Used as the test double for the services and for embedding the engine
//! without PostgreSQL.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tokio::sync::Mutex;

use crate::domain::ports::{
    FeedbackQuery, FeedbackTally, ReportScope, Store, StoreError, StoreTx, TxFuture,
};
use crate::domain::{
    Error, Feedback, FeedbackId, FeedbackSnapshot, FeedbackStatus, Role, Team, TeamId,
    UserAccount, UserId, UserStatus,
};

#[derive(Debug, Clone, Default)]
struct State {
    users: BTreeMap<UserId, UserAccount>,
    teams: BTreeMap<TeamId, Team>,
    feedback: BTreeMap<FeedbackId, Feedback>,
}

impl State {
    fn add_team(&mut self, team: Team) -> Result<(), StoreError> {
        if self.teams.contains_key(&team.id) {
            return Err(StoreError::duplicate(format!("team {} already exists", team.id)));
        }
        if self.teams.values().any(|existing| existing.name == team.name) {
            return Err(StoreError::duplicate(format!(
                "team name {} is already taken",
                team.name
            )));
        }
        self.teams.insert(team.id, team);
        Ok(())
    }

    fn user_mut(&mut self, id: UserId) -> Result<&mut UserAccount, StoreError> {
        self.users
            .get_mut(&id)
            .ok_or_else(|| StoreError::query(format!("user {id} is missing")))
    }
}

/// Store holding every row in process memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed or overwrite a user account.
    pub async fn insert_user(&self, account: UserAccount) {
        self.state.lock().await.users.insert(account.id, account);
    }

    /// Seed a team, enforcing unique names.
    pub async fn insert_team(&self, team: Team) -> Result<(), StoreError> {
        self.state.lock().await.add_team(team)
    }

    /// Committed view of a user.
    pub async fn user(&self, id: UserId) -> Option<UserAccount> {
        self.state.lock().await.users.get(&id).cloned()
    }

    /// Committed view of a team.
    pub async fn team(&self, id: TeamId) -> Option<Team> {
        self.state.lock().await.teams.get(&id).cloned()
    }

    /// Committed view of a feedback record.
    pub async fn feedback(&self, id: FeedbackId) -> Option<Feedback> {
        self.state.lock().await.feedback.get(&id).cloned()
    }
}

impl Store for InMemoryStore {
    fn transaction<'s, T, F>(&'s self, work: F) -> BoxFuture<'s, Result<T, Error>>
    where
        T: Send + 's,
        F: for<'t> FnOnce(&'t mut dyn StoreTx) -> TxFuture<'t, T> + Send + 's,
    {
        async move {
            let mut committed = self.state.lock().await;
            let mut working = committed.clone();
            let result = {
                let mut tx = MemoryTx {
                    state: &mut working,
                };
                work(&mut tx).await
            };
            if result.is_ok() {
                *committed = working;
            }
            result
        }
        .boxed()
    }
}

struct MemoryTx<'a> {
    state: &'a mut State,
}

#[async_trait]
impl StoreTx for MemoryTx<'_> {
    async fn user(&mut self, id: UserId) -> Result<Option<UserAccount>, StoreError> {
        Ok(self.state.users.get(&id).cloned())
    }

    async fn users_in_team(&mut self, team: TeamId) -> Result<Vec<UserId>, StoreError> {
        Ok(self
            .state
            .users
            .values()
            .filter(|user| user.team_id == Some(team))
            .map(|user| user.id)
            .collect())
    }

    async fn set_user_team(
        &mut self,
        user: UserId,
        team: Option<TeamId>,
    ) -> Result<(), StoreError> {
        if let Some(team) = team
            && !self.state.teams.contains_key(&team)
        {
            return Err(StoreError::query(format!("team {team} is missing")));
        }
        self.state.user_mut(user)?.team_id = team;
        Ok(())
    }

    async fn unassign_team_members(&mut self, team: TeamId) -> Result<Vec<UserId>, StoreError> {
        let mut unassigned = Vec::new();
        for user in self.state.users.values_mut() {
            if user.team_id == Some(team) {
                user.team_id = None;
                unassigned.push(user.id);
            }
        }
        Ok(unassigned)
    }

    async fn set_user_role(&mut self, user: UserId, role: Role) -> Result<(), StoreError> {
        self.state.user_mut(user)?.role = role;
        Ok(())
    }

    async fn set_user_status(
        &mut self,
        user: UserId,
        status: UserStatus,
    ) -> Result<(), StoreError> {
        self.state.user_mut(user)?.status = status;
        Ok(())
    }

    async fn lock_active_admins(&mut self) -> Result<Vec<UserId>, StoreError> {
        Ok(self
            .state
            .users
            .values()
            .filter(|user| user.is_active_admin())
            .map(|user| user.id)
            .collect())
    }

    async fn team(&mut self, id: TeamId) -> Result<Option<Team>, StoreError> {
        Ok(self.state.teams.get(&id).cloned())
    }

    async fn team_managed_by(&mut self, user: UserId) -> Result<Option<Team>, StoreError> {
        Ok(self
            .state
            .teams
            .values()
            .find(|team| team.manager_id == Some(user))
            .cloned())
    }

    async fn list_teams(&mut self) -> Result<Vec<Team>, StoreError> {
        let mut teams: Vec<_> = self.state.teams.values().cloned().collect();
        teams.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(teams)
    }

    async fn insert_team(&mut self, team: &Team) -> Result<(), StoreError> {
        self.state.add_team(team.clone())
    }

    async fn set_team_manager(
        &mut self,
        team: TeamId,
        manager: Option<UserId>,
    ) -> Result<(), StoreError> {
        let record = self
            .state
            .teams
            .get_mut(&team)
            .ok_or_else(|| StoreError::query(format!("team {team} is missing")))?;
        record.manager_id = manager;
        Ok(())
    }

    async fn clear_managed_teams(&mut self, user: UserId) -> Result<Vec<TeamId>, StoreError> {
        let mut cleared = Vec::new();
        for team in self.state.teams.values_mut() {
            if team.manager_id == Some(user) {
                team.manager_id = None;
                cleared.push(team.id);
            }
        }
        Ok(cleared)
    }

    async fn delete_team(&mut self, team: TeamId) -> Result<bool, StoreError> {
        Ok(self.state.teams.remove(&team).is_some())
    }

    async fn insert_feedback(&mut self, feedback: &Feedback) -> Result<(), StoreError> {
        if self.state.feedback.contains_key(&feedback.id()) {
            return Err(StoreError::duplicate(format!(
                "feedback {} already exists",
                feedback.id()
            )));
        }
        self.state.feedback.insert(feedback.id(), feedback.clone());
        Ok(())
    }

    async fn feedback(&mut self, id: FeedbackId) -> Result<Option<Feedback>, StoreError> {
        Ok(self.state.feedback.get(&id).cloned())
    }

    async fn lock_feedback(&mut self, id: FeedbackId) -> Result<Option<Feedback>, StoreError> {
        Ok(self.state.feedback.get(&id).cloned())
    }

    async fn list_feedback(
        &mut self,
        query: &FeedbackQuery,
    ) -> Result<Vec<Feedback>, StoreError> {
        let mut matches: Vec<_> = self
            .state
            .feedback
            .values()
            .filter(|feedback| query.matches(feedback))
            .cloned()
            .collect();
        matches.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(&a.id()))
        });
        let skip = usize::try_from(query.page.offset()).unwrap_or(usize::MAX);
        let take = usize::try_from(query.page.size()).unwrap_or(usize::MAX);
        Ok(matches.into_iter().skip(skip).take(take).collect())
    }

    async fn update_feedback_status(
        &mut self,
        id: FeedbackId,
        status: FeedbackStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let current = self
            .state
            .feedback
            .get(&id)
            .cloned()
            .ok_or_else(|| StoreError::query(format!("feedback {id} is missing")))?;
        let mut snapshot = FeedbackSnapshot::from(current);
        snapshot.status = status;
        snapshot.status_changed_at = Some(at);
        let updated =
            Feedback::restore(snapshot).map_err(|err| StoreError::query(err.to_string()))?;
        self.state.feedback.insert(id, updated);
        Ok(())
    }

    async fn delete_feedback(&mut self, id: FeedbackId) -> Result<bool, StoreError> {
        Ok(self.state.feedback.remove(&id).is_some())
    }

    async fn feedback_tallies(
        &mut self,
        scope: ReportScope,
    ) -> Result<Vec<FeedbackTally>, StoreError> {
        let mut groups = BTreeMap::new();
        for feedback in self.state.feedback.values().filter(|f| scope.covers(f)) {
            *groups.entry((feedback.status(), feedback.kind())).or_insert(0_u64) += 1;
        }
        Ok(groups
            .into_iter()
            .map(|((status, kind), count)| FeedbackTally {
                status,
                kind,
                count,
            })
            .collect())
    }
}
