//! Integration tests for the feedback service over the in-memory store.

use std::collections::BTreeSet;

use feedback_engine::domain::ports::Page;
use feedback_engine::domain::{
    Error, ErrorCode, FeedbackDirection, FeedbackId, FeedbackKind, FeedbackListRequest,
    FeedbackStatus, NewFeedback, Role, TITLE_MAX, UserStatus,
};
use insta::assert_json_snapshot;
use rstest::rstest;
use serde_json::json;

mod engine_support;

use engine_support::{Org, draft, fixture_timestamp};

fn rule(err: &Error) -> Option<&serde_json::Value> {
    err.details().and_then(|details| details.get("rule"))
}

#[rstest]
#[tokio::test]
async fn anonymous_feedback_never_records_its_author() {
    let org = Org::new();
    let author = org.user("Ada", Role::Collaborator, None).await;
    let recipient = org.user("Brian", Role::Collaborator, None).await;

    let created = org.send(&author, recipient.user_id, true).await;

    assert!(created.is_anonymous());
    assert_eq!(created.author_id(), None);
    let stored = org.store.feedback(created.id()).await.expect("stored");
    assert_eq!(stored.author_id(), None);
    assert_eq!(stored.status(), FeedbackStatus::Open);
}

#[rstest]
#[tokio::test]
async fn named_feedback_snapshots_the_recipients_team() {
    let org = Org::new();
    let team = org.team("Platform", None).await;
    let author = org.user("Ada", Role::Collaborator, None).await;
    let recipient = org.user("Brian", Role::Collaborator, Some(team)).await;

    let created = org.send(&author, recipient.user_id, false).await;

    assert_eq!(created.author_id(), Some(author.user_id));
    assert_eq!(created.team_id(), Some(team));
    assert_eq!(created.created_at(), fixture_timestamp());
    assert_eq!(created.status_changed_at(), None);
}

#[rstest]
#[tokio::test]
async fn moving_the_recipient_keeps_the_original_team_snapshot() {
    let org = Org::new();
    let admin = org.user("Root", Role::Admin, None).await;
    let manager = org.user("Maya", Role::Manager, None).await;
    let platform = org.team("Platform", Some(manager.user_id)).await;
    let data = org.team("Data", None).await;
    let member = org.user("Brian", Role::Collaborator, Some(platform)).await;
    let author = org.user("Chen", Role::Collaborator, None).await;
    let created = org.send(&author, member.user_id, false).await;

    org.directory
        .assign_member(&admin, member.user_id, data)
        .await
        .expect("member moved");

    let fetched = org
        .feedback
        .get(&admin, created.id())
        .await
        .expect("admin read");
    assert_eq!(fetched.team_id(), Some(platform));
    let account = org.account(member.user_id).await;
    assert_eq!(account.team_id, Some(data));

    let report = org.feedback.report(&manager).await.expect("manager report");
    assert_eq!(report.team_id, Some(platform));
    assert_eq!(report.total, 1);
}

#[rstest]
#[tokio::test]
async fn deleting_the_team_keeps_the_feedback_team_snapshot() {
    let org = Org::new();
    let admin = org.user("Root", Role::Admin, None).await;
    let team = org.team("Platform", None).await;
    let member = org.user("Brian", Role::Collaborator, Some(team)).await;
    let author = org.user("Chen", Role::Collaborator, None).await;
    let created = org.send(&author, member.user_id, false).await;

    org.directory
        .delete_team(&admin, team)
        .await
        .expect("team deleted");

    let stored = org.store.feedback(created.id()).await.expect("stored");
    assert_eq!(stored.team_id(), Some(team));
    assert_eq!(org.account(member.user_id).await.team_id, None);
}

#[rstest]
#[tokio::test]
async fn anonymous_feedback_reaches_recipient_and_manager_without_an_author() {
    let org = Org::new();
    let manager = org.user("Maya", Role::Manager, None).await;
    let team = org.team("Platform", Some(manager.user_id)).await;
    let member = org.user("Brian", Role::Collaborator, Some(team)).await;
    let author = org.user("Ada", Role::Collaborator, None).await;
    let created = org.send(&author, member.user_id, true).await;

    let received = org
        .feedback
        .list(&member, FeedbackListRequest::new(FeedbackDirection::Received))
        .await
        .expect("received listing");
    let team_view = org
        .feedback
        .list(&manager, FeedbackListRequest::new(FeedbackDirection::Team))
        .await
        .expect("team listing");

    for listing in [&received, &team_view] {
        assert_eq!(listing.len(), 1);
        let record = &listing[0];
        assert_eq!(record.id(), created.id());
        assert!(record.is_anonymous());
        assert_eq!(record.author_id(), None);
        assert_eq!(record.content(), created.content());
    }
}

#[rstest]
#[tokio::test]
async fn manager_sees_own_and_member_feedback_only() {
    let org = Org::new();
    let manager = org.user("Maya", Role::Manager, None).await;
    let team = org.team("Platform", Some(manager.user_id)).await;
    let member = org.user("Brian", Role::Collaborator, Some(team)).await;
    let ada = org.user("Ada", Role::Collaborator, None).await;
    let chen = org.user("Chen", Role::Collaborator, None).await;

    let authored = org.send(&manager, ada.user_id, false).await;
    let received = org.send(&chen, manager.user_id, false).await;
    let for_member = org.send(&ada, member.user_id, false).await;
    let from_member = org.send(&member, chen.user_id, false).await;
    org.send(&ada, chen.user_id, false).await;

    let everything = org
        .feedback
        .list(&manager, FeedbackListRequest::new(FeedbackDirection::All))
        .await
        .expect("manager listing");

    let seen: BTreeSet<FeedbackId> = everything.iter().map(|record| record.id()).collect();
    let expected = BTreeSet::from([authored.id(), received.id(), for_member.id()]);
    assert_eq!(seen, expected);
    assert!(!seen.contains(&from_member.id()));
}

#[rstest]
#[tokio::test]
async fn anonymous_feedback_is_absent_from_the_authors_sent_list() {
    let org = Org::new();
    let author = org.user("Ada", Role::Collaborator, None).await;
    let recipient = org.user("Brian", Role::Collaborator, None).await;
    org.send(&author, recipient.user_id, true).await;
    let named = org.send(&author, recipient.user_id, false).await;

    let sent = org
        .feedback
        .list(&author, FeedbackListRequest::new(FeedbackDirection::Sent))
        .await
        .expect("listing succeeds");

    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].id(), named.id());
}

#[rstest]
#[case::empty_title(NewFeedback { title: "  ".to_owned(), ..draft_template() })]
#[case::title_too_long(NewFeedback { title: "x".repeat(TITLE_MAX + 1), ..draft_template() })]
#[case::score_too_high(NewFeedback { score: Some(11), ..draft_template() })]
#[case::negative_score(NewFeedback { score: Some(-1), ..draft_template() })]
#[tokio::test]
async fn malformed_drafts_are_invalid_requests(#[case] mut payload: NewFeedback) {
    let org = Org::new();
    let author = org.user("Ada", Role::Collaborator, None).await;
    let recipient = org.user("Brian", Role::Collaborator, None).await;
    payload.recipient_id = recipient.user_id;

    let err = org
        .feedback
        .create(&author, payload)
        .await
        .expect_err("draft rejected");

    assert_eq!(err.code(), ErrorCode::InvalidRequest);
}

fn draft_template() -> NewFeedback {
    draft(feedback_engine::domain::UserId::random(), false)
}

#[rstest]
#[tokio::test]
async fn feedback_for_an_unknown_recipient_is_not_found() {
    let org = Org::new();
    let author = org.user("Ada", Role::Collaborator, None).await;

    let err = org
        .feedback
        .create(&author, draft_template())
        .await
        .expect_err("unknown recipient");

    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn inactive_actors_cannot_send_feedback() {
    let org = Org::new();
    let author = org
        .user("Ada", Role::Collaborator, None)
        .await
        .with_status(UserStatus::Inactive);
    let recipient = org.user("Brian", Role::Collaborator, None).await;

    let err = org
        .feedback
        .create(&author, draft(recipient.user_id, false))
        .await
        .expect_err("inactive actor");

    assert_eq!(err.code(), ErrorCode::Forbidden);
    assert_eq!(rule(&err), Some(&json!("active_account")));
}

#[rstest]
#[tokio::test]
async fn unrelated_collaborators_cannot_read_or_move_feedback() {
    let org = Org::new();
    let author = org.user("Ada", Role::Collaborator, None).await;
    let recipient = org.user("Brian", Role::Collaborator, None).await;
    let outsider = org.user("Chen", Role::Collaborator, None).await;
    let created = org.send(&author, recipient.user_id, false).await;

    let read = org
        .feedback
        .get(&outsider, created.id())
        .await
        .expect_err("outsider read");
    assert_eq!(read.code(), ErrorCode::Forbidden);
    assert_eq!(rule(&read), Some(&json!("visibility")));

    let moved = org
        .feedback
        .transition(&outsider, created.id(), FeedbackStatus::InReview)
        .await
        .expect_err("outsider transition");
    assert_eq!(moved.code(), ErrorCode::Forbidden);

    let everything = org
        .feedback
        .list(&outsider, FeedbackListRequest::new(FeedbackDirection::All))
        .await
        .expect("listing succeeds");
    assert!(everything.is_empty());
}

#[rstest]
#[tokio::test]
async fn participants_can_read_their_feedback() {
    let org = Org::new();
    let author = org.user("Ada", Role::Collaborator, None).await;
    let recipient = org.user("Brian", Role::Collaborator, None).await;
    let created = org.send(&author, recipient.user_id, false).await;

    for actor in [&author, &recipient] {
        let fetched = org
            .feedback
            .get(actor, created.id())
            .await
            .expect("participant read");
        assert_eq!(fetched, created);
    }
}

#[rstest]
#[tokio::test]
async fn missing_feedback_is_not_found() {
    let org = Org::new();
    let admin = org.user("Root", Role::Admin, None).await;

    let err = org
        .feedback
        .get(&admin, FeedbackId::random())
        .await
        .expect_err("missing record");

    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn managers_lose_sight_of_feedback_when_the_recipient_leaves_their_team() {
    let org = Org::new();
    let admin = org.user("Root", Role::Admin, None).await;
    let manager = org.user("Maya", Role::Manager, None).await;
    let team = org.team("Platform", Some(manager.user_id)).await;
    let member = org.user("Brian", Role::Collaborator, Some(team)).await;
    let author = org.user("Chen", Role::Collaborator, None).await;
    let created = org.send(&author, member.user_id, false).await;

    let team_view = org
        .feedback
        .list(&manager, FeedbackListRequest::new(FeedbackDirection::Team))
        .await
        .expect("team listing");
    assert_eq!(team_view.len(), 1);
    org.feedback
        .get(&manager, created.id())
        .await
        .expect("manager sees member feedback");

    org.directory
        .remove_member(&admin, member.user_id)
        .await
        .expect("member removed");

    let team_view = org
        .feedback
        .list(&manager, FeedbackListRequest::new(FeedbackDirection::Team))
        .await
        .expect("team listing");
    assert!(team_view.is_empty());
    let err = org
        .feedback
        .get(&manager, created.id())
        .await
        .expect_err("feedback no longer visible");
    assert_eq!(err.code(), ErrorCode::Forbidden);
}

#[rstest]
#[tokio::test]
async fn team_listing_requires_a_managed_team() {
    let org = Org::new();
    let manager = org.user("Maya", Role::Manager, None).await;
    let collaborator = org.user("Brian", Role::Collaborator, None).await;

    let err = org
        .feedback
        .list(&manager, FeedbackListRequest::new(FeedbackDirection::Team))
        .await
        .expect_err("no managed team");
    assert_eq!(err.code(), ErrorCode::Forbidden);
    assert_eq!(rule(&err), Some(&json!("managed_team")));

    let err = org
        .feedback
        .list(&collaborator, FeedbackListRequest::new(FeedbackDirection::Team))
        .await
        .expect_err("collaborators have no team view");
    assert_eq!(err.code(), ErrorCode::Forbidden);
}

#[rstest]
#[tokio::test]
async fn listings_filter_by_status_and_page_newest_first() {
    let org = Org::new();
    let admin = org.user("Root", Role::Admin, None).await;
    let author = org.user("Ada", Role::Collaborator, None).await;
    let recipient = org.user("Brian", Role::Collaborator, None).await;
    for _ in 0..3 {
        org.send(&author, recipient.user_id, false).await;
    }
    let reviewed = org.send(&author, recipient.user_id, false).await;
    org.feedback
        .transition(&admin, reviewed.id(), FeedbackStatus::InReview)
        .await
        .expect("admin transition");

    let open_only = FeedbackListRequest {
        status: Some(FeedbackStatus::Open),
        page: Page::new(1, 2).expect("valid page"),
        ..FeedbackListRequest::new(FeedbackDirection::Received)
    };
    let first = org
        .feedback
        .list(&recipient, open_only)
        .await
        .expect("first page");
    let second = org
        .feedback
        .list(
            &recipient,
            FeedbackListRequest {
                page: Page::new(2, 2).expect("valid page"),
                ..open_only
            },
        )
        .await
        .expect("second page");

    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 1);
    assert!(
        first
            .iter()
            .chain(&second)
            .all(|record| record.status() == FeedbackStatus::Open)
    );
    assert!(first[0].id() > first[1].id());
}

#[rstest]
#[tokio::test]
async fn terminal_states_only_yield_to_administrators() {
    let org = Org::new();
    let admin = org.user("Root", Role::Admin, None).await;
    let manager = org.user("Maya", Role::Manager, None).await;
    let team = org.team("Platform", Some(manager.user_id)).await;
    let member = org.user("Brian", Role::Collaborator, Some(team)).await;
    let author = org.user("Chen", Role::Collaborator, None).await;
    let created = org.send(&author, member.user_id, false).await;

    let reviewed = org
        .feedback
        .transition(&manager, created.id(), FeedbackStatus::InReview)
        .await
        .expect("manager picks it up");
    assert_eq!(reviewed.status_changed_at(), Some(fixture_timestamp()));
    org.feedback
        .transition(&member, created.id(), FeedbackStatus::Resolved)
        .await
        .expect("recipient resolves");

    let err = org
        .feedback
        .transition(&manager, created.id(), FeedbackStatus::InReview)
        .await
        .expect_err("terminal for managers");
    assert_eq!(err.code(), ErrorCode::InvalidTransition);

    let reopened = org
        .feedback
        .transition(&admin, created.id(), FeedbackStatus::InReview)
        .await
        .expect("admin override");
    assert_eq!(reopened.status(), FeedbackStatus::InReview);
    assert_eq!(
        org.store.feedback(created.id()).await.map(|f| f.status()),
        Some(FeedbackStatus::InReview)
    );
}

#[rstest]
#[tokio::test]
async fn authors_cannot_steer_feedback_they_sent() {
    let org = Org::new();
    let author = org.user("Ada", Role::Collaborator, None).await;
    let recipient = org.user("Brian", Role::Collaborator, None).await;
    let created = org.send(&author, recipient.user_id, false).await;

    let err = org
        .feedback
        .transition(&author, created.id(), FeedbackStatus::Archived)
        .await
        .expect_err("author may only read");

    assert_eq!(err.code(), ErrorCode::Forbidden);
    assert_eq!(rule(&err), Some(&json!("transition_actor")));
}

#[rstest]
#[tokio::test]
async fn skipping_a_lifecycle_step_is_an_invalid_transition() {
    let org = Org::new();
    let author = org.user("Ada", Role::Collaborator, None).await;
    let recipient = org.user("Brian", Role::Collaborator, None).await;
    let created = org.send(&author, recipient.user_id, false).await;

    let err = org
        .feedback
        .transition(&recipient, created.id(), FeedbackStatus::Resolved)
        .await
        .expect_err("OPEN cannot jump to RESOLVED");

    assert_eq!(err.code(), ErrorCode::InvalidTransition);
    assert_eq!(
        org.store.feedback(created.id()).await.map(|f| f.status()),
        Some(FeedbackStatus::Open)
    );
}

#[rstest]
#[tokio::test]
async fn only_administrators_delete_feedback() {
    let org = Org::new();
    let admin = org.user("Root", Role::Admin, None).await;
    let manager = org.user("Maya", Role::Manager, None).await;
    let recipient = org.user("Brian", Role::Collaborator, None).await;
    let created = org.send(&manager, recipient.user_id, false).await;

    let err = org
        .feedback
        .delete(&manager, created.id())
        .await
        .expect_err("managers cannot delete");
    assert_eq!(err.code(), ErrorCode::Forbidden);

    org.feedback
        .delete(&admin, created.id())
        .await
        .expect("admin deletes");
    assert!(org.store.feedback(created.id()).await.is_none());

    let err = org
        .feedback
        .delete(&admin, created.id())
        .await
        .expect_err("already gone");
    assert_eq!(err.code(), ErrorCode::NotFound);
}

#[rstest]
#[tokio::test]
async fn organisation_report_counts_every_status_and_kind() {
    let org = Org::new();
    let admin = org.user("Root", Role::Admin, None).await;
    let author = org.user("Ada", Role::Collaborator, None).await;
    let recipient = org.user("Brian", Role::Collaborator, None).await;
    org.send(&author, recipient.user_id, false).await;
    let resolved = org.send(&author, recipient.user_id, true).await;
    org.feedback
        .create(
            &author,
            NewFeedback {
                kind: FeedbackKind::Criticism,
                ..draft(recipient.user_id, false)
            },
        )
        .await
        .expect("criticism sent");
    for to in [FeedbackStatus::InReview, FeedbackStatus::Resolved] {
        org.feedback
            .transition(&recipient, resolved.id(), to)
            .await
            .expect("recipient transition");
    }

    let report = org.feedback.report(&admin).await.expect("admin report");

    assert_json_snapshot!(report, @r#"
    {
      "teamId": null,
      "total": 3,
      "byStatus": {
        "OPEN": 2,
        "IN_REVIEW": 0,
        "RESOLVED": 1,
        "ARCHIVED": 0
      },
      "byKind": {
        "PRAISE": 2,
        "CRITICISM": 1,
        "SUGGESTION": 0
      }
    }
    "#);
}

#[rstest]
#[tokio::test]
async fn manager_reports_cover_only_their_team() {
    let org = Org::new();
    let manager = org.user("Maya", Role::Manager, None).await;
    let team = org.team("Platform", Some(manager.user_id)).await;
    let member = org.user("Brian", Role::Collaborator, Some(team)).await;
    let outsider = org.user("Chen", Role::Collaborator, None).await;
    org.send(&outsider, member.user_id, false).await;
    org.send(&member, outsider.user_id, false).await;

    let report = org.feedback.report(&manager).await.expect("manager report");
    assert_eq!(report.team_id, Some(team));
    assert_eq!(report.total, 1);

    let err = org
        .feedback
        .report(&outsider)
        .await
        .expect_err("collaborators see no reports");
    assert_eq!(err.code(), ErrorCode::Forbidden);
}
