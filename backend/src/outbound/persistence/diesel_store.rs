//! PostgreSQL implementation of the [`Store`] port.
//!
//! Every transaction runs at SERIALIZABLE isolation on one pooled
//! connection. Locked reads use `FOR UPDATE`; a concurrent writer that loses
//! the race is rolled back by PostgreSQL with a serialisation failure, which
//! surfaces as `CONFLICT`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::dsl::count_star;
use diesel::prelude::*;
use diesel_async::scoped_futures::ScopedFutureExt;
use diesel_async::{AsyncPgConnection, RunQueryDsl};
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use uuid::Uuid;

use crate::domain::ports::{
    FeedbackQuery, FeedbackSelection, FeedbackTally, ReportScope, Store, StoreError, StoreTx,
    TxFuture,
};
use crate::domain::{
    Error, Feedback, FeedbackId, FeedbackStatus, Role, Team, TeamId, UserAccount, UserId,
    UserStatus, VisibilityScope,
};

use super::error_mapping::{map_diesel_error, map_pool_error};
use super::models::{FeedbackRow, TeamRow, UserRow};
use super::pool::DbPool;
use super::schema::{feedback, teams, users};

/// Diesel-backed store.
#[derive(Clone)]
pub struct DieselStore {
    pool: DbPool,
}

impl DieselStore {
    /// Create a store over `pool`.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use feedback_engine::outbound::persistence::{DbPool, DieselStore, PoolConfig};
    ///
    /// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
    /// let pool = DbPool::new(PoolConfig::new("postgres://localhost/feedback")).await?;
    /// let store = DieselStore::new(pool);
    /// # let _ = store;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

/// Why a Diesel transaction closure gave up.
enum TxError {
    /// The engine rejected the operation; roll back and hand the error on.
    Aborted(Error),
    Database(diesel::result::Error),
}

impl From<diesel::result::Error> for TxError {
    fn from(value: diesel::result::Error) -> Self {
        Self::Database(value)
    }
}

impl Store for DieselStore {
    fn transaction<'s, T, F>(&'s self, work: F) -> BoxFuture<'s, Result<T, Error>>
    where
        T: Send + 's,
        F: for<'t> FnOnce(&'t mut dyn StoreTx) -> TxFuture<'t, T> + Send + 's,
    {
        async move {
            let mut conn = self
                .pool
                .get()
                .await
                .map_err(|err| Error::from(map_pool_error(err)))?;

            let outcome = conn
                .build_transaction()
                .serializable()
                .run(|conn| {
                    async move {
                        let mut tx = PgStoreTx { conn };
                        work(&mut tx).await.map_err(TxError::Aborted)
                    }
                    .scope_boxed()
                })
                .await;

            match outcome {
                Ok(value) => Ok(value),
                Err(TxError::Aborted(err)) => Err(err),
                Err(TxError::Database(err)) => Err(map_diesel_error(err).into()),
            }
        }
        .boxed()
    }
}

struct PgStoreTx<'c> {
    conn: &'c mut AsyncPgConnection,
}

impl PgStoreTx<'_> {
    fn conn(&mut self) -> &mut AsyncPgConnection {
        &mut *self.conn
    }
}

fn uuids<'a>(ids: impl IntoIterator<Item = &'a UserId>) -> Vec<Uuid> {
    ids.into_iter().map(|id| *id.as_uuid()).collect()
}

#[async_trait]
impl StoreTx for PgStoreTx<'_> {
    async fn user(&mut self, id: UserId) -> Result<Option<UserAccount>, StoreError> {
        let row = users::table
            .find(id.as_uuid())
            .select(UserRow::as_select())
            .first(self.conn())
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(UserAccount::try_from).transpose()
    }

    async fn users_in_team(&mut self, team: TeamId) -> Result<Vec<UserId>, StoreError> {
        let ids: Vec<Uuid> = users::table
            .filter(users::team_id.eq(team.as_uuid()))
            .select(users::id)
            .order(users::id)
            .load(self.conn())
            .await
            .map_err(map_diesel_error)?;
        Ok(ids.into_iter().map(UserId::from_uuid).collect())
    }

    async fn set_user_team(
        &mut self,
        user: UserId,
        team: Option<TeamId>,
    ) -> Result<(), StoreError> {
        diesel::update(users::table.find(user.as_uuid()))
            .set(users::team_id.eq(team.map(|id| *id.as_uuid())))
            .execute(self.conn())
            .await
            .map_err(map_diesel_error)?;
        Ok(())
    }

    async fn unassign_team_members(&mut self, team: TeamId) -> Result<Vec<UserId>, StoreError> {
        let ids: Vec<Uuid> = diesel::update(users::table.filter(users::team_id.eq(team.as_uuid())))
            .set(users::team_id.eq(None::<Uuid>))
            .returning(users::id)
            .get_results(self.conn())
            .await
            .map_err(map_diesel_error)?;
        Ok(ids.into_iter().map(UserId::from_uuid).collect())
    }

    async fn set_user_role(&mut self, user: UserId, role: Role) -> Result<(), StoreError> {
        diesel::update(users::table.find(user.as_uuid()))
            .set(users::role.eq(role.as_str()))
            .execute(self.conn())
            .await
            .map_err(map_diesel_error)?;
        Ok(())
    }

    async fn set_user_status(
        &mut self,
        user: UserId,
        status: UserStatus,
    ) -> Result<(), StoreError> {
        diesel::update(users::table.find(user.as_uuid()))
            .set(users::status.eq(status.as_str()))
            .execute(self.conn())
            .await
            .map_err(map_diesel_error)?;
        Ok(())
    }

    async fn lock_active_admins(&mut self) -> Result<Vec<UserId>, StoreError> {
        let ids: Vec<Uuid> = users::table
            .filter(users::role.eq(Role::Admin.as_str()))
            .filter(users::status.eq(UserStatus::Active.as_str()))
            .select(users::id)
            .order(users::id)
            .for_update()
            .load(self.conn())
            .await
            .map_err(map_diesel_error)?;
        Ok(ids.into_iter().map(UserId::from_uuid).collect())
    }

    async fn team(&mut self, id: TeamId) -> Result<Option<Team>, StoreError> {
        let row = teams::table
            .find(id.as_uuid())
            .select(TeamRow::as_select())
            .first(self.conn())
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(Team::from))
    }

    async fn team_managed_by(&mut self, user: UserId) -> Result<Option<Team>, StoreError> {
        let row = teams::table
            .filter(teams::manager_id.eq(user.as_uuid()))
            .select(TeamRow::as_select())
            .first(self.conn())
            .await
            .optional()
            .map_err(map_diesel_error)?;
        Ok(row.map(Team::from))
    }

    async fn list_teams(&mut self) -> Result<Vec<Team>, StoreError> {
        let rows = teams::table
            .select(TeamRow::as_select())
            .order(teams::name)
            .load(self.conn())
            .await
            .map_err(map_diesel_error)?;
        Ok(rows.into_iter().map(Team::from).collect())
    }

    async fn insert_team(&mut self, team: &Team) -> Result<(), StoreError> {
        diesel::insert_into(teams::table)
            .values(TeamRow::from(team))
            .execute(self.conn())
            .await
            .map_err(map_diesel_error)?;
        Ok(())
    }

    async fn set_team_manager(
        &mut self,
        team: TeamId,
        manager: Option<UserId>,
    ) -> Result<(), StoreError> {
        diesel::update(teams::table.find(team.as_uuid()))
            .set(teams::manager_id.eq(manager.map(|id| *id.as_uuid())))
            .execute(self.conn())
            .await
            .map_err(map_diesel_error)?;
        Ok(())
    }

    async fn clear_managed_teams(&mut self, user: UserId) -> Result<Vec<TeamId>, StoreError> {
        let ids: Vec<Uuid> =
            diesel::update(teams::table.filter(teams::manager_id.eq(user.as_uuid())))
                .set(teams::manager_id.eq(None::<Uuid>))
                .returning(teams::id)
                .get_results(self.conn())
                .await
                .map_err(map_diesel_error)?;
        Ok(ids.into_iter().map(TeamId::from_uuid).collect())
    }

    async fn delete_team(&mut self, team: TeamId) -> Result<bool, StoreError> {
        let deleted = diesel::delete(teams::table.find(team.as_uuid()))
            .execute(self.conn())
            .await
            .map_err(map_diesel_error)?;
        Ok(deleted > 0)
    }

    async fn insert_feedback(&mut self, record: &Feedback) -> Result<(), StoreError> {
        diesel::insert_into(feedback::table)
            .values(FeedbackRow::from(record))
            .execute(self.conn())
            .await
            .map_err(map_diesel_error)?;
        Ok(())
    }

    async fn feedback(&mut self, id: FeedbackId) -> Result<Option<Feedback>, StoreError> {
        let row = feedback::table
            .find(id.as_uuid())
            .select(FeedbackRow::as_select())
            .first(self.conn())
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(Feedback::try_from).transpose()
    }

    async fn lock_feedback(&mut self, id: FeedbackId) -> Result<Option<Feedback>, StoreError> {
        let row = feedback::table
            .find(id.as_uuid())
            .select(FeedbackRow::as_select())
            .for_update()
            .first(self.conn())
            .await
            .optional()
            .map_err(map_diesel_error)?;
        row.map(Feedback::try_from).transpose()
    }

    async fn list_feedback(
        &mut self,
        query: &FeedbackQuery,
    ) -> Result<Vec<Feedback>, StoreError> {
        let mut statement = feedback::table
            .select(FeedbackRow::as_select())
            .into_boxed();

        statement = match &query.selection {
            FeedbackSelection::Received(user) => {
                statement.filter(feedback::recipient_id.eq(*user.as_uuid()))
            }
            FeedbackSelection::Sent(user) => {
                statement.filter(feedback::author_id.eq(*user.as_uuid()))
            }
            FeedbackSelection::RecipientIn(members) => {
                statement.filter(feedback::recipient_id.eq_any(uuids(members)))
            }
            FeedbackSelection::Everything => statement,
        };

        statement = match &query.scope {
            VisibilityScope::Unrestricted => statement,
            VisibilityScope::Participant(user) => {
                let id = *user.as_uuid();
                statement.filter(
                    feedback::recipient_id
                        .eq(id)
                        .or(feedback::author_id.eq(id)),
                )
            }
            VisibilityScope::TeamManager { manager, members } => {
                let id = *manager.as_uuid();
                statement.filter(
                    feedback::recipient_id
                        .eq(id)
                        .or(feedback::author_id.eq(id))
                        .or(feedback::recipient_id.eq_any(uuids(members))),
                )
            }
        };

        if let Some(status) = query.status {
            statement = statement.filter(feedback::status.eq(status.as_str()));
        }

        let limit = i64::from(query.page.size());
        let offset = i64::try_from(query.page.offset())
            .map_err(|_| StoreError::query("page offset out of range"))?;
        let rows = statement
            .order((feedback::created_at.desc(), feedback::id.desc()))
            .limit(limit)
            .offset(offset)
            .load(self.conn())
            .await
            .map_err(map_diesel_error)?;
        rows.into_iter().map(Feedback::try_from).collect()
    }

    async fn update_feedback_status(
        &mut self,
        id: FeedbackId,
        status: FeedbackStatus,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        diesel::update(feedback::table.find(id.as_uuid()))
            .set((
                feedback::status.eq(status.as_str()),
                feedback::status_changed_at.eq(Some(at)),
            ))
            .execute(self.conn())
            .await
            .map_err(map_diesel_error)?;
        Ok(())
    }

    async fn delete_feedback(&mut self, id: FeedbackId) -> Result<bool, StoreError> {
        let deleted = diesel::delete(feedback::table.find(id.as_uuid()))
            .execute(self.conn())
            .await
            .map_err(map_diesel_error)?;
        Ok(deleted > 0)
    }

    async fn feedback_tallies(
        &mut self,
        scope: ReportScope,
    ) -> Result<Vec<FeedbackTally>, StoreError> {
        let rows: Vec<(String, String, i64)> = match scope {
            ReportScope::Organisation => feedback::table
                .group_by((feedback::status, feedback::kind))
                .select((feedback::status, feedback::kind, count_star()))
                .load(self.conn())
                .await,
            ReportScope::Team(team) => feedback::table
                .filter(feedback::team_id.eq(team.as_uuid()))
                .group_by((feedback::status, feedback::kind))
                .select((feedback::status, feedback::kind, count_star()))
                .load(self.conn())
                .await,
        }
        .map_err(map_diesel_error)?;

        rows.into_iter()
            .map(|(status, kind, count)| -> Result<FeedbackTally, StoreError> {
                Ok(FeedbackTally {
                    status: status
                        .parse()
                        .map_err(|err| StoreError::query(format!("{err}")))?,
                    kind: kind
                        .parse()
                        .map_err(|err| StoreError::query(format!("{err}")))?,
                    count: u64::try_from(count)
                        .map_err(|_| StoreError::query("negative tally count"))?,
                })
            })
            .collect()
    }
}
