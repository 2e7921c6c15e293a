//! Diesel row types and their conversions to domain records.
//!
//! Rows are internal to the adapter. Conversions out of the database re-run
//! domain validation, so a row that breaks an invariant (an anonymous record
//! with an author, an unknown role label) surfaces as a query error instead
//! of reaching the domain.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::domain::ports::StoreError;
use crate::domain::{
    Feedback, FeedbackId, FeedbackSnapshot, Team, TeamId, UserAccount, UserId,
};

use super::schema::{feedback, teams, users};

/// Engine-visible slice of a user row.
#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = users)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub team_id: Option<Uuid>,
    pub status: String,
}

impl TryFrom<UserRow> for UserAccount {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: UserId::from_uuid(row.id),
            name: row.name,
            email: row.email,
            role: row.role.parse().map_err(corrupt_row)?,
            team_id: row.team_id.map(TeamId::from_uuid),
            status: row.status.parse().map_err(corrupt_row)?,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = teams)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct TeamRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub manager_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<TeamRow> for Team {
    fn from(row: TeamRow) -> Self {
        Self {
            id: TeamId::from_uuid(row.id),
            name: row.name,
            description: row.description,
            manager_id: row.manager_id.map(UserId::from_uuid),
            created_at: row.created_at,
        }
    }
}

impl From<&Team> for TeamRow {
    fn from(team: &Team) -> Self {
        Self {
            id: *team.id.as_uuid(),
            name: team.name.clone(),
            description: team.description.clone(),
            manager_id: team.manager_id.map(|id| *id.as_uuid()),
            created_at: team.created_at,
        }
    }
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = feedback)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub(crate) struct FeedbackRow {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub kind: String,
    pub author_id: Option<Uuid>,
    pub recipient_id: Uuid,
    pub anonymous: bool,
    pub team_id: Option<Uuid>,
    pub score: Option<i16>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub status_changed_at: Option<DateTime<Utc>>,
}

impl TryFrom<FeedbackRow> for Feedback {
    type Error = StoreError;

    fn try_from(row: FeedbackRow) -> Result<Self, Self::Error> {
        let snapshot = FeedbackSnapshot {
            id: FeedbackId::from_uuid(row.id),
            title: row.title,
            content: row.content,
            kind: row.kind.parse().map_err(corrupt_row)?,
            author_id: row.author_id.map(UserId::from_uuid),
            recipient_id: UserId::from_uuid(row.recipient_id),
            anonymous: row.anonymous,
            team_id: row.team_id.map(TeamId::from_uuid),
            score: row.score.map(i64::from),
            status: row.status.parse().map_err(corrupt_row)?,
            created_at: row.created_at,
            status_changed_at: row.status_changed_at,
        };
        Feedback::restore(snapshot).map_err(corrupt_row)
    }
}

impl From<&Feedback> for FeedbackRow {
    fn from(feedback: &Feedback) -> Self {
        Self {
            id: *feedback.id().as_uuid(),
            title: feedback.title().to_owned(),
            content: feedback.content().to_owned(),
            kind: feedback.kind().as_str().to_owned(),
            author_id: feedback.author_id().map(|id| *id.as_uuid()),
            recipient_id: *feedback.recipient_id().as_uuid(),
            anonymous: feedback.is_anonymous(),
            team_id: feedback.team_id().map(|id| *id.as_uuid()),
            score: feedback.score().map(|score| i16::from(score.get())),
            status: feedback.status().as_str().to_owned(),
            created_at: feedback.created_at(),
            status_changed_at: feedback.status_changed_at(),
        }
    }
}

fn corrupt_row(err: impl std::fmt::Display) -> StoreError {
    StoreError::query(format!("stored row failed validation: {err}"))
}
