//! Feedback records.
//!
//! A [`Feedback`] can only be built through [`Feedback::open`] (new records)
//! or [`Feedback::restore`] (rows read back from storage). Both paths keep
//! the anonymity invariant: an anonymous record never carries an author.
//! `open` discards the author at write time; `restore` refuses a snapshot
//! that violates the rule instead of silently repairing it.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Error, FeedbackId, FeedbackStatus, TeamId, UnknownVariantError, UserId};

/// Highest accepted score.
pub const SCORE_MAX: u8 = 10;

/// Maximum title length in characters.
pub const TITLE_MAX: usize = 200;

/// Validation failures for feedback payloads and stored snapshots.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FeedbackValidationError {
    /// Title was blank once trimmed.
    #[error("feedback title must not be empty")]
    EmptyTitle,
    /// Title longer than [`TITLE_MAX`] characters.
    #[error("feedback title must be at most {TITLE_MAX} characters")]
    TitleTooLong,
    /// Content was blank once trimmed.
    #[error("feedback content must not be empty")]
    EmptyContent,
    /// Score outside `0..=10`.
    #[error("feedback score must be between 0 and {SCORE_MAX}, got {0}")]
    ScoreOutOfRange(i64),
    /// An anonymous snapshot carried an author.
    #[error("anonymous feedback must not carry an author")]
    AnonymousAuthor,
    /// A named snapshot had no author.
    #[error("named feedback must carry an author")]
    MissingAuthor,
}

impl From<FeedbackValidationError> for Error {
    fn from(value: FeedbackValidationError) -> Self {
        Self::invalid_request(value.to_string())
    }
}

/// Category of a feedback record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedbackKind {
    /// Recognition of good work.
    Praise,
    /// Something that went wrong.
    Criticism,
    /// An idea for improvement.
    Suggestion,
}

impl FeedbackKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 3] = [Self::Praise, Self::Criticism, Self::Suggestion];

    /// Stable storage label.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Praise => "PRAISE",
            Self::Criticism => "CRITICISM",
            Self::Suggestion => "SUGGESTION",
        }
    }
}

impl fmt::Display for FeedbackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FeedbackKind {
    type Err = UnknownVariantError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "PRAISE" => Ok(Self::Praise),
            "CRITICISM" => Ok(Self::Criticism),
            "SUGGESTION" => Ok(Self::Suggestion),
            other => Err(UnknownVariantError::new("feedback kind", other)),
        }
    }
}

/// A score in `0..=10`.
///
/// # Examples
/// ```
/// use feedback_engine::domain::Score;
///
/// assert_eq!(Score::new(7).map(Score::get), Ok(7));
/// assert!(Score::new(11).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct Score(u8);

impl Score {
    /// Validate a raw score.
    pub fn new(raw: i64) -> Result<Self, FeedbackValidationError> {
        u8::try_from(raw)
            .ok()
            .filter(|value| *value <= SCORE_MAX)
            .map(Self)
            .ok_or(FeedbackValidationError::ScoreOutOfRange(raw))
    }

    /// The score value.
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<i64> for Score {
    type Error = FeedbackValidationError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Score> for i64 {
    fn from(value: Score) -> Self {
        i64::from(value.0)
    }
}

/// Caller-supplied payload for a new feedback record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFeedback {
    /// Who the feedback is about.
    pub recipient_id: UserId,
    /// Short headline.
    pub title: String,
    /// Body text.
    pub content: String,
    /// Category.
    pub kind: FeedbackKind,
    /// Whether the author identity is discarded.
    #[serde(default)]
    pub anonymous: bool,
    /// Optional score in `0..=10`.
    #[serde(default)]
    pub score: Option<i64>,
}

/// Row shape exchanged with storage adapters.
///
/// Field-for-field mirror of [`Feedback`]; it carries no guarantees until
/// passed through [`Feedback::restore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackSnapshot {
    pub id: FeedbackId,
    pub title: String,
    pub content: String,
    pub kind: FeedbackKind,
    pub author_id: Option<UserId>,
    pub recipient_id: UserId,
    pub anonymous: bool,
    pub team_id: Option<TeamId>,
    pub score: Option<i64>,
    pub status: FeedbackStatus,
    pub created_at: DateTime<Utc>,
    pub status_changed_at: Option<DateTime<Utc>>,
}

/// A feedback record.
///
/// ## Invariants
/// - `anonymous` implies `author_id` is `None`; otherwise `author_id` is set.
/// - `team_id` is the recipient's team at creation and never changes.
/// - `title` and `content` are non-blank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(try_from = "FeedbackSnapshot", into = "FeedbackSnapshot")]
pub struct Feedback {
    id: FeedbackId,
    title: String,
    content: String,
    kind: FeedbackKind,
    author_id: Option<UserId>,
    recipient_id: UserId,
    anonymous: bool,
    team_id: Option<TeamId>,
    score: Option<Score>,
    status: FeedbackStatus,
    created_at: DateTime<Utc>,
    status_changed_at: Option<DateTime<Utc>>,
}

impl Feedback {
    /// Build a new `OPEN` record authored by `author`.
    ///
    /// When the draft is anonymous the author is dropped here and cannot be
    /// recovered later.
    ///
    /// # Examples
    /// ```
    /// use chrono::Utc;
    /// use feedback_engine::domain::{
    ///     Feedback, FeedbackId, FeedbackKind, FeedbackStatus, NewFeedback, UserId,
    /// };
    ///
    /// let draft = NewFeedback {
    ///     recipient_id: UserId::random(),
    ///     title: "Demo".into(),
    ///     content: "Great teamwork".into(),
    ///     kind: FeedbackKind::Praise,
    ///     anonymous: true,
    ///     score: None,
    /// };
    /// let feedback = Feedback::open(FeedbackId::random(), UserId::random(), draft, None, Utc::now())
    ///     .expect("valid draft");
    /// assert_eq!(feedback.author_id(), None);
    /// assert_eq!(feedback.status(), FeedbackStatus::Open);
    /// ```
    pub fn open(
        id: FeedbackId,
        author: UserId,
        draft: NewFeedback,
        team_id: Option<TeamId>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, FeedbackValidationError> {
        let title = non_blank(draft.title, FeedbackValidationError::EmptyTitle)?;
        check_title_length(&title)?;
        let content = non_blank(draft.content, FeedbackValidationError::EmptyContent)?;
        let score = draft.score.map(Score::new).transpose()?;
        let author_id = (!draft.anonymous).then_some(author);

        Ok(Self {
            id,
            title,
            content,
            kind: draft.kind,
            author_id,
            recipient_id: draft.recipient_id,
            anonymous: draft.anonymous,
            team_id,
            score,
            status: FeedbackStatus::Open,
            created_at,
            status_changed_at: None,
        })
    }

    /// Rebuild a record read from storage, re-checking every invariant.
    pub fn restore(snapshot: FeedbackSnapshot) -> Result<Self, FeedbackValidationError> {
        match (snapshot.anonymous, snapshot.author_id) {
            (true, Some(_)) => return Err(FeedbackValidationError::AnonymousAuthor),
            (false, None) => return Err(FeedbackValidationError::MissingAuthor),
            _ => {}
        }
        if snapshot.title.trim().is_empty() {
            return Err(FeedbackValidationError::EmptyTitle);
        }
        check_title_length(&snapshot.title)?;
        if snapshot.content.trim().is_empty() {
            return Err(FeedbackValidationError::EmptyContent);
        }
        let score = snapshot.score.map(Score::new).transpose()?;

        Ok(Self {
            id: snapshot.id,
            title: snapshot.title,
            content: snapshot.content,
            kind: snapshot.kind,
            author_id: snapshot.author_id,
            recipient_id: snapshot.recipient_id,
            anonymous: snapshot.anonymous,
            team_id: snapshot.team_id,
            score,
            status: snapshot.status,
            created_at: snapshot.created_at,
            status_changed_at: snapshot.status_changed_at,
        })
    }

    pub fn id(&self) -> FeedbackId {
        self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn kind(&self) -> FeedbackKind {
        self.kind
    }

    /// Author, absent for anonymous feedback.
    pub fn author_id(&self) -> Option<UserId> {
        self.author_id
    }

    pub fn recipient_id(&self) -> UserId {
        self.recipient_id
    }

    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }

    /// Recipient's team when the record was created.
    pub fn team_id(&self) -> Option<TeamId> {
        self.team_id
    }

    pub fn score(&self) -> Option<Score> {
        self.score
    }

    pub fn status(&self) -> FeedbackStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// When the status last changed; `None` while still in the initial state.
    pub fn status_changed_at(&self) -> Option<DateTime<Utc>> {
        self.status_changed_at
    }

    /// Whether `user` authored or received the record.
    pub fn involves(&self, user: UserId) -> bool {
        self.recipient_id == user || self.author_id == Some(user)
    }

    /// Apply an already-validated transition.
    pub(crate) fn with_status(mut self, status: FeedbackStatus, at: DateTime<Utc>) -> Self {
        self.status = status;
        self.status_changed_at = Some(at);
        self
    }
}

impl TryFrom<FeedbackSnapshot> for Feedback {
    type Error = FeedbackValidationError;

    fn try_from(value: FeedbackSnapshot) -> Result<Self, Self::Error> {
        Self::restore(value)
    }
}

impl From<Feedback> for FeedbackSnapshot {
    fn from(value: Feedback) -> Self {
        Self {
            id: value.id,
            title: value.title,
            content: value.content,
            kind: value.kind,
            author_id: value.author_id,
            recipient_id: value.recipient_id,
            anonymous: value.anonymous,
            team_id: value.team_id,
            score: value.score.map(i64::from),
            status: value.status,
            created_at: value.created_at,
            status_changed_at: value.status_changed_at,
        }
    }
}

fn non_blank(value: String, err: FeedbackValidationError) -> Result<String, FeedbackValidationError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(err);
    }
    Ok(trimmed.to_owned())
}

fn check_title_length(title: &str) -> Result<(), FeedbackValidationError> {
    if title.chars().count() > TITLE_MAX {
        return Err(FeedbackValidationError::TitleTooLong);
    }
    Ok(())
}
