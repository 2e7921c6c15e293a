//! Feedback status state machine.
//!
//! ```text
//! OPEN ──► IN_REVIEW ──► RESOLVED
//!   │          │
//!   └────┬─────┘
//!        ▼
//!     ARCHIVED
//! ```
//!
//! `RESOLVED` and `ARCHIVED` are terminal. Only an administrator may move a
//! record out of a terminal state; that override may target any other state.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{Error, UnknownVariantError};

/// Canonical feedback status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedbackStatus {
    /// Initial state for every new record.
    Open,
    /// Someone responsible has picked the feedback up.
    InReview,
    /// Terminal: the feedback has been addressed.
    Resolved,
    /// Terminal: the feedback was shelved without resolution.
    Archived,
}

impl FeedbackStatus {
    /// Every status, in lifecycle order.
    pub const ALL: [Self; 4] = [Self::Open, Self::InReview, Self::Resolved, Self::Archived];

    /// Stable storage label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::InReview => "IN_REVIEW",
            Self::Resolved => "RESOLVED",
            Self::Archived => "ARCHIVED",
        }
    }

    /// Whether no ordinary transition leaves this state.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Resolved | Self::Archived)
    }

    const fn has_edge_to(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Open, Self::InReview)
                | (Self::InReview, Self::Resolved)
                | (Self::Open | Self::InReview, Self::Archived)
        )
    }
}

impl fmt::Display for FeedbackStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedbackStatus {
    type Err = UnknownVariantError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "OPEN" => Ok(Self::Open),
            "IN_REVIEW" => Ok(Self::InReview),
            "RESOLVED" => Ok(Self::Resolved),
            "ARCHIVED" => Ok(Self::Archived),
            other => Err(UnknownVariantError::new("feedback status", other)),
        }
    }
}

/// How the acting principal relates to the feedback being transitioned.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActorStanding {
    /// The actor is an administrator.
    pub is_admin: bool,
    /// The actor received the feedback.
    pub is_recipient: bool,
    /// The actor manages the recipient's current team.
    pub manages_recipient_team: bool,
}

impl ActorStanding {
    fn may_steer(self) -> bool {
        self.is_admin || self.is_recipient || self.manages_recipient_team
    }
}

/// Validate a requested transition for an actor.
///
/// Returns `INVALID_TRANSITION` when the edge does not exist for this actor
/// and `FORBIDDEN` when the edge exists but the actor may not drive it.
///
/// # Examples
/// ```
/// use feedback_engine::domain::{ActorStanding, ErrorCode, FeedbackStatus, check_transition};
///
/// let recipient = ActorStanding { is_recipient: true, ..ActorStanding::default() };
/// assert!(check_transition(FeedbackStatus::Open, FeedbackStatus::InReview, recipient).is_ok());
///
/// let err = check_transition(FeedbackStatus::Resolved, FeedbackStatus::InReview, recipient)
///     .expect_err("terminal state");
/// assert_eq!(err.code(), ErrorCode::InvalidTransition);
/// ```
pub fn check_transition(
    from: FeedbackStatus,
    to: FeedbackStatus,
    standing: ActorStanding,
) -> Result<(), Error> {
    if from == to {
        return Err(invalid(from, to, "feedback is already in the requested state"));
    }

    if from.is_terminal() {
        if standing.is_admin {
            return Ok(());
        }
        return Err(invalid(
            from,
            to,
            "only an administrator may move feedback out of a terminal state",
        ));
    }

    if !from.has_edge_to(to) {
        return Err(invalid(from, to, "no such transition in the feedback lifecycle"));
    }

    if !standing.may_steer() {
        return Err(Error::forbidden(format!(
            "only the recipient, the recipient's team manager or an administrator may move feedback from {from} to {to}"
        ))
        .with_details(json!({
            "rule": "transition_actor",
            "from": from,
            "to": to,
        })));
    }

    Ok(())
}

fn invalid(from: FeedbackStatus, to: FeedbackStatus, reason: &str) -> Error {
    Error::invalid_transition(format!("cannot move feedback from {from} to {to}: {reason}"))
        .with_details(json!({
            "from": from,
            "to": to,
        }))
}
