//! Shared fixtures for engine integration tests.
//!
//! Integration tests compile as separate crates, so the organisation builder
//! and fixture clock live here and are pulled in with `mod engine_support;`.

use std::sync::Arc;

use chrono::{DateTime, Local, TimeZone, Utc};
use feedback_engine::domain::{
    Actor, DirectoryService, Feedback, FeedbackKind, FeedbackService, NewFeedback, Role, Team,
    TeamId, UserAccount, UserId, UserStatus,
};
use feedback_engine::outbound::InMemoryStore;
use mockable::Clock;

/// Clock frozen at a fixed instant.
#[derive(Debug, Clone, Copy)]
pub struct FixtureClock {
    utc_now: DateTime<Utc>,
}

impl Clock for FixtureClock {
    fn local(&self) -> DateTime<Local> {
        self.utc_now.with_timezone(&Local)
    }

    fn utc(&self) -> DateTime<Utc> {
        self.utc_now
    }
}

pub fn fixture_timestamp() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 12, 9, 0, 0)
        .single()
        .expect("valid fixture timestamp")
}

pub fn fixture_clock() -> Arc<dyn Clock> {
    Arc::new(FixtureClock {
        utc_now: fixture_timestamp(),
    })
}

/// An organisation seeded directly into an in-memory store, with both
/// services wired over it.
pub struct Org {
    pub store: Arc<InMemoryStore>,
    pub feedback: FeedbackService<InMemoryStore>,
    pub directory: DirectoryService<InMemoryStore>,
}

impl Org {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let clock = fixture_clock();
        Self {
            feedback: FeedbackService::new(Arc::clone(&store), Arc::clone(&clock)),
            directory: DirectoryService::new(Arc::clone(&store), clock),
            store,
        }
    }

    /// Seed an active account and return its claims.
    pub async fn user(&self, name: &str, role: Role, team: Option<TeamId>) -> Actor {
        let id = UserId::random();
        self.store
            .insert_user(UserAccount {
                id,
                name: name.to_owned(),
                email: format!("{}@example.test", name.to_lowercase()),
                role,
                team_id: team,
                status: UserStatus::Active,
            })
            .await;
        Actor::new(id, role)
    }

    /// Seed a team, optionally managed by `manager`.
    pub async fn team(&self, name: &str, manager: Option<UserId>) -> TeamId {
        let id = TeamId::random();
        self.store
            .insert_team(Team {
                id,
                name: name.to_owned(),
                description: None,
                manager_id: manager,
                created_at: fixture_timestamp(),
            })
            .await
            .expect("seed team");
        id
    }

    /// Send praise from `author` to `recipient` through the service.
    pub async fn send(&self, author: &Actor, recipient: UserId, anonymous: bool) -> Feedback {
        self.feedback
            .create(author, draft(recipient, anonymous))
            .await
            .expect("feedback created")
    }

    pub async fn account(&self, id: UserId) -> UserAccount {
        self.store.user(id).await.expect("account exists")
    }
}

pub fn draft(recipient: UserId, anonymous: bool) -> NewFeedback {
    NewFeedback {
        recipient_id: recipient,
        title: "Release retrospective".to_owned(),
        content: "Kept the rollout calm and well documented".to_owned(),
        kind: FeedbackKind::Praise,
        anonymous,
        score: Some(8),
    }
}
