//! Feedback operations: create, read, list, transition, delete and report.
//!
//! Each call authorises the coarse action first, then resolves visibility and
//! applies lifecycle rules inside a single store transaction.

use std::sync::Arc;

use futures_util::FutureExt;
use mockable::Clock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use super::directory::{manages_member, managed_team, members_of, require_user};
use super::ports::{FeedbackQuery, FeedbackSelection, Page, ReportScope, Store};
use super::policy::{authorize, require_admin};
use super::{
    Action, Actor, ActorStanding, Error, Feedback, FeedbackId, FeedbackReport, FeedbackStatus,
    NewFeedback, Role, VisibilityScope, check_transition, observe,
};

/// Which slice of the visible feedback a listing returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackDirection {
    /// Records the actor received.
    #[default]
    Received,
    /// Records the actor sent under their name.
    Sent,
    /// Records received by members of the team the actor manages.
    Team,
    /// Everything the actor may see.
    All,
}

/// Listing parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedbackListRequest {
    pub direction: FeedbackDirection,
    pub status: Option<FeedbackStatus>,
    pub page: Page,
}

impl FeedbackListRequest {
    /// First page of `direction`, any status.
    pub fn new(direction: FeedbackDirection) -> Self {
        Self {
            direction,
            ..Self::default()
        }
    }
}

/// Feedback service over a transactional store.
#[derive(Clone)]
pub struct FeedbackService<S> {
    store: Arc<S>,
    clock: Arc<dyn Clock>,
}

impl<S> FeedbackService<S> {
    /// Create a service over `store`, stamping times from `clock`.
    pub fn new(store: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }
}

impl<S: Store> FeedbackService<S> {
    /// Record new feedback from `actor`.
    ///
    /// The recipient's current team is captured as the record's team
    /// snapshot. Anonymous drafts lose their author before the insert.
    pub async fn create(&self, actor: &Actor, draft: NewFeedback) -> Result<Feedback, Error> {
        let result = self.create_inner(actor, draft).await;
        result.inspect_err(|err| observe::rejection("create_feedback", actor, err))
    }

    async fn create_inner(&self, actor: &Actor, draft: NewFeedback) -> Result<Feedback, Error> {
        authorize(actor, Action::SendFeedback)?;
        let id = FeedbackId::random();
        let author = actor.user_id;
        let created_at = self.clock.utc();

        let feedback = self
            .store
            .transaction(move |tx| {
                async move {
                    let recipient = require_user(tx, draft.recipient_id).await?;
                    let feedback = Feedback::open(id, author, draft, recipient.team_id, created_at)?;
                    tx.insert_feedback(&feedback).await?;
                    Ok(feedback)
                }
                .boxed()
            })
            .await?;

        info!(
            feedback_id = %feedback.id(),
            recipient = %feedback.recipient_id(),
            anonymous = feedback.is_anonymous(),
            "feedback created"
        );
        Ok(feedback)
    }

    /// Read one record, subject to the actor's visibility.
    pub async fn get(&self, actor: &Actor, id: FeedbackId) -> Result<Feedback, Error> {
        let result = self.get_inner(actor, id).await;
        result.inspect_err(|err| observe::rejection("get_feedback", actor, err))
    }

    async fn get_inner(&self, actor: &Actor, id: FeedbackId) -> Result<Feedback, Error> {
        authorize(actor, Action::ViewFeedback)?;
        let actor = *actor;
        self.store
            .transaction(move |tx| {
                async move {
                    let feedback = tx.feedback(id).await?.ok_or_else(|| missing(id))?;
                    let scope = VisibilityScope::resolve(tx, &actor).await?;
                    scope.ensure_permits(&feedback)?;
                    Ok(feedback)
                }
                .boxed()
            })
            .await
    }

    /// List records, newest first, always narrowed by the actor's visibility.
    pub async fn list(
        &self,
        actor: &Actor,
        request: FeedbackListRequest,
    ) -> Result<Vec<Feedback>, Error> {
        let result = self.list_inner(actor, request).await;
        result.inspect_err(|err| observe::rejection("list_feedback", actor, err))
    }

    async fn list_inner(
        &self,
        actor: &Actor,
        request: FeedbackListRequest,
    ) -> Result<Vec<Feedback>, Error> {
        authorize(actor, Action::ViewFeedback)?;
        if request.direction == FeedbackDirection::Team {
            authorize(actor, Action::ManageFeedback)?;
        }
        let actor = *actor;
        self.store
            .transaction(move |tx| {
                async move {
                    let scope = VisibilityScope::resolve(tx, &actor).await?;
                    let selection = match request.direction {
                        FeedbackDirection::Received => FeedbackSelection::Received(actor.user_id),
                        FeedbackDirection::Sent => FeedbackSelection::Sent(actor.user_id),
                        FeedbackDirection::All => FeedbackSelection::Everything,
                        FeedbackDirection::Team => {
                            let team = managed_team(tx, actor.user_id)
                                .await?
                                .ok_or_else(|| no_managed_team(&actor, "list team feedback"))?;
                            FeedbackSelection::RecipientIn(members_of(tx, team).await?)
                        }
                    };
                    let query = FeedbackQuery {
                        selection,
                        scope,
                        status: request.status,
                        page: request.page,
                    };
                    Ok(tx.list_feedback(&query).await?)
                }
                .boxed()
            })
            .await
    }

    /// Move a record to `to`.
    ///
    /// The record is locked and its current status re-read inside the
    /// transaction, so two racing transitions cannot both apply to the same
    /// starting state.
    pub async fn transition(
        &self,
        actor: &Actor,
        id: FeedbackId,
        to: FeedbackStatus,
    ) -> Result<Feedback, Error> {
        let result = self.transition_inner(actor, id, to).await;
        result.inspect_err(|err| observe::rejection("transition_feedback", actor, err))
    }

    async fn transition_inner(
        &self,
        actor: &Actor,
        id: FeedbackId,
        to: FeedbackStatus,
    ) -> Result<Feedback, Error> {
        authorize(actor, Action::ViewFeedback)?;
        let actor = *actor;
        let at = self.clock.utc();

        let (from, feedback) = self
            .store
            .transaction(move |tx| {
                async move {
                    let feedback = tx.lock_feedback(id).await?.ok_or_else(|| missing(id))?;
                    let scope = VisibilityScope::resolve(tx, &actor).await?;
                    scope.ensure_permits(&feedback)?;

                    let recipient = feedback.recipient_id();
                    let manages_recipient_team = actor.role == Role::Manager
                        && manages_member(tx, actor.user_id, recipient).await?;
                    let standing = ActorStanding {
                        is_admin: actor.is_admin(),
                        is_recipient: recipient == actor.user_id,
                        manages_recipient_team,
                    };
                    let from = feedback.status();
                    check_transition(from, to, standing)?;

                    tx.update_feedback_status(id, to, at).await?;
                    Ok((from, feedback.with_status(to, at)))
                }
                .boxed()
            })
            .await?;

        info!(feedback_id = %id, actor = %actor.user_id, %from, %to, "feedback transitioned");
        Ok(feedback)
    }

    /// Permanently delete a record. Administrators only.
    pub async fn delete(&self, actor: &Actor, id: FeedbackId) -> Result<(), Error> {
        let result = self.delete_inner(actor, id).await;
        result.inspect_err(|err| observe::rejection("delete_feedback", actor, err))
    }

    async fn delete_inner(&self, actor: &Actor, id: FeedbackId) -> Result<(), Error> {
        require_admin(actor, Action::ManageFeedback, "delete feedback")?;
        self.store
            .transaction(move |tx| {
                async move {
                    if tx.delete_feedback(id).await? {
                        Ok(())
                    } else {
                        Err(missing(id))
                    }
                }
                .boxed()
            })
            .await?;

        info!(feedback_id = %id, actor = %actor.user_id, "feedback deleted");
        Ok(())
    }

    /// Counts by status and kind over the actor's reporting scope.
    ///
    /// Administrators see the organisation; managers see feedback whose team
    /// snapshot is the team they currently manage.
    pub async fn report(&self, actor: &Actor) -> Result<FeedbackReport, Error> {
        let result = self.report_inner(actor).await;
        result.inspect_err(|err| observe::rejection("feedback_report", actor, err))
    }

    async fn report_inner(&self, actor: &Actor) -> Result<FeedbackReport, Error> {
        authorize(actor, Action::ViewReports)?;
        let actor = *actor;
        self.store
            .transaction(move |tx| {
                async move {
                    let scope = if actor.is_admin() {
                        ReportScope::Organisation
                    } else {
                        let team = managed_team(tx, actor.user_id)
                            .await?
                            .ok_or_else(|| no_managed_team(&actor, "view team reports"))?;
                        ReportScope::Team(team)
                    };
                    let tallies = tx.feedback_tallies(scope).await?;
                    Ok(FeedbackReport::from_tallies(scope, &tallies))
                }
                .boxed()
            })
            .await
    }
}

fn missing(id: FeedbackId) -> Error {
    Error::not_found(format!("feedback {id} does not exist")).with_details(json!({
        "feedbackId": id,
    }))
}

fn no_managed_team(actor: &Actor, operation: &str) -> Error {
    Error::forbidden(format!("user {} manages no team and cannot {operation}", actor.user_id))
        .with_details(json!({
            "rule": "managed_team",
            "role": actor.role,
        }))
}
