//! End-to-end behavior of the service layer over the in-memory store.

mod common;

use serde_json::json;

use common::{Harness, body};
use kidsbook_auth::{AuthzError, CredentialService, DenialKind};
use kidsbook_core::DomainError;
use kidsbook_identity::ProfileView;
use kidsbook_infra::{ServiceError, SurveyFilter};

fn domain(err: ServiceError) -> DomainError {
    match err {
        ServiceError::Domain(e) => e,
        other => panic!("expected a domain error, got {other:?}"),
    }
}

fn denial_kind(err: ServiceError) -> DenialKind {
    match err {
        ServiceError::Authz(AuthzError::Forbidden(denial)) => denial.kind,
        other => panic!("expected a forbidden error, got {other:?}"),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Groups and membership
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn creator_joins_the_group_they_create() -> anyhow::Result<()> {
    let h = Harness::new()?;
    let group = h.create_group(&h.teacher, "Math")?;

    let members = h.services.list_members(h.teacher.session(), group)?;
    assert_eq!(members.iter().map(ProfileView::id).collect::<Vec<_>>(), vec![h.teacher.id]);

    let err = h
        .services
        .create_group(h.teacher.session(), &body(json!({ "name": "Math" })))
        .unwrap_err();
    assert!(matches!(domain(err), DomainError::Conflict(_)));
    Ok(())
}

#[test]
fn group_names_are_compared_after_trimming() -> anyhow::Result<()> {
    let h = Harness::new()?;
    let math = h.create_group(&h.teacher, "Math")?;

    let err = h
        .services
        .create_group(h.teacher.session(), &body(json!({ "name": "Math " })))
        .unwrap_err();
    assert!(matches!(domain(err), DomainError::Conflict(_)));

    let art = h.create_group(&h.teacher, "  Art  ")?;
    assert_eq!(h.services.group_detail(h.teacher.session(), art)?.name, "Art");
    let err = h
        .services
        .update_group(h.teacher.session(), art, &body(json!({ "name": " Math" })))
        .unwrap_err();
    assert!(matches!(domain(err), DomainError::Conflict(_)));
    assert_ne!(math, art);
    Ok(())
}

#[test]
fn adding_a_member_twice_is_a_conflict() -> anyhow::Result<()> {
    let h = Harness::new()?;
    let kid = h.student("bea")?;
    let group = h.create_group(&h.teacher, "Science")?;

    assert_eq!(h.services.add_member(h.teacher.session(), group, kid.id)?, vec![kid.id]);
    let err = h.services.add_member(h.teacher.session(), group, kid.id).unwrap_err();
    assert!(matches!(domain(err), DomainError::Conflict(_)));
    assert_eq!(h.services.list_members(h.teacher.session(), group)?.len(), 2);
    Ok(())
}

#[test]
fn the_creator_cannot_be_removed() -> anyhow::Result<()> {
    let h = Harness::new()?;
    let group = h.create_group(&h.teacher, "Art")?;

    let err = h
        .services
        .remove_member(h.teacher.session(), group, h.teacher.id)
        .unwrap_err();
    assert!(matches!(domain(err), DomainError::InvalidOperation(_)));
    Ok(())
}

#[test]
fn adding_a_teacher_brings_their_virtual_students() -> anyhow::Result<()> {
    let h = Harness::new()?;
    let bob = h.register("SUPERUSER", "bob", None)?;
    let shadow = h.register("VIRTUAL_USER", "bob_shadow", Some(bob.id))?;
    let group = h.create_group(&h.teacher, "History")?;

    let added = h.services.add_member(h.teacher.session(), group, bob.id)?;
    assert_eq!(added, vec![bob.id, shadow.id]);

    let groups = h.services.user_groups(bob.session(), shadow.id)?;
    assert_eq!(groups.iter().map(|g| g.id).collect::<Vec<_>>(), vec![group]);
    Ok(())
}

#[test]
fn new_virtual_students_join_every_group_of_their_teacher() -> anyhow::Result<()> {
    let h = Harness::new()?;
    let first = h.create_group(&h.teacher, "Morning")?;
    let second = h.create_group(&h.teacher, "Afternoon")?;

    let shadow = h.register("VIRTUAL_USER", "alice_shadow", Some(h.teacher.id))?;
    let mut joined: Vec<_> = h
        .services
        .user_groups(h.teacher.session(), shadow.id)?
        .into_iter()
        .map(|g| g.id)
        .collect();
    joined.sort();
    let mut expected = vec![first, second];
    expected.sort();
    assert_eq!(joined, expected);
    Ok(())
}

#[test]
fn students_see_public_profiles_and_teachers_see_everything() -> anyhow::Result<()> {
    let h = Harness::new()?;
    let bea = h.student("bea")?;
    let cal = h.student("cal")?;
    let group = h.create_group(&h.teacher, "Music")?;
    h.services.add_member(h.teacher.session(), group, bea.id)?;
    h.services.add_member(h.teacher.session(), group, cal.id)?;

    for view in h.services.list_members(bea.session(), group)? {
        let json = serde_json::to_value(&view)?;
        if view.id() == bea.id {
            assert!(json.get("email_address").is_some());
        } else {
            assert!(json.get("email_address").is_none(), "{json}");
            assert!(json.get("realname").is_none(), "{json}");
        }
    }

    for view in h.services.list_members(h.teacher.session(), group)? {
        let json = serde_json::to_value(&view)?;
        assert!(json.get("email_address").is_some());
        assert!(json.get("realname").is_some());
    }
    Ok(())
}

#[test]
fn students_cannot_change_group_settings() -> anyhow::Result<()> {
    let h = Harness::new()?;
    let bea = h.student("bea")?;
    let group = h.create_group(&h.teacher, "Drama")?;
    h.services.add_member(h.teacher.session(), group, bea.id)?;

    let err = h
        .services
        .update_group_settings(bea.session(), group, &body(json!({ "is_like_enabled": false })))
        .unwrap_err();
    assert_eq!(denial_kind(err), DenialKind::Role);
    assert!(h.services.group_settings(bea.session(), group)?.is_like_enabled);
    Ok(())
}

#[test]
fn outsiders_are_denied_by_membership() -> anyhow::Result<()> {
    let h = Harness::new()?;
    let bea = h.student("bea")?;
    let group = h.create_group(&h.teacher, "Chess")?;

    let err = h.services.list_posts(bea.session(), group).unwrap_err();
    assert_eq!(denial_kind(err), DenialKind::Membership);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Content
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn liking_twice_leaves_one_row() -> anyhow::Result<()> {
    let h = Harness::new()?;
    let bea = h.student("bea")?;
    let group = h.create_group(&h.teacher, "Reading")?;
    h.services.add_member(h.teacher.session(), group, bea.id)?;
    let post = h.post(&h.teacher, group, "Read chapter one")?;

    h.services.like_post(bea.session(), post, &body(json!({ "like_or_dislike": true })))?;
    h.services.like_post(bea.session(), post, &body(json!({ "like_or_dislike": "true" })))?;

    let likes = h.services.store().read(|t| t.post_likes(post).count())?;
    assert_eq!(likes, 1);
    assert_eq!(h.services.view_post(bea.session(), post)?.likes, vec![bea.id]);

    h.services.like_post(bea.session(), post, &body(json!({ "like_or_dislike": false })))?;
    assert!(h.services.view_post(bea.session(), post)?.likes.is_empty());
    Ok(())
}

#[test]
fn likes_disabled_blocks_even_the_author() -> anyhow::Result<()> {
    let h = Harness::new()?;
    let bea = h.student("bea")?;
    let group = h.create_group(&h.teacher, "Math")?;
    h.services.add_member(h.teacher.session(), group, bea.id)?;
    let post = h.post(&bea, group, "hello")?;

    h.services
        .update_group_settings(h.teacher.session(), group, &body(json!({ "is_like_enabled": "false" })))?;
    let err = h.services.like_post(bea.session(), post, &body(json!({}))).unwrap_err();
    assert!(matches!(domain(err), DomainError::FeatureDisabled(_)));

    let likes = h.services.store().read(|t| t.post_likes(post).count())?;
    assert_eq!(likes, 0);
    Ok(())
}

#[test]
fn comments_follow_the_toggle() -> anyhow::Result<()> {
    let h = Harness::new()?;
    let group = h.create_group(&h.teacher, "Poetry")?;
    let post = h.post(&h.teacher, group, "Write a haiku")?;

    h.services
        .update_group_settings(h.teacher.session(), group, &body(json!({ "is_comment_enabled": false })))?;
    let err = h
        .services
        .comment_on_post(h.teacher.session(), post, &body(json!({ "content": "mine" })))
        .unwrap_err();
    assert!(matches!(domain(err), DomainError::FeatureDisabled(_)));

    h.services
        .update_group_settings(h.teacher.session(), group, &body(json!({ "is_comment_enabled": true })))?;
    let view = h
        .services
        .comment_on_post(h.teacher.session(), post, &body(json!({ "content": "mine" })))?;
    assert_eq!(view.content, "mine");
    assert_eq!(h.services.list_comments(h.teacher.session(), post)?.len(), 1);
    Ok(())
}

#[test]
fn deleted_posts_are_hidden_from_students_only() -> anyhow::Result<()> {
    let h = Harness::new()?;
    let bea = h.student("bea")?;
    let group = h.create_group(&h.teacher, "Geography")?;
    h.services.add_member(h.teacher.session(), group, bea.id)?;
    let post = h.post(&bea, group, "oops")?;

    h.services.delete_post(bea.session(), post)?;

    assert!(h.services.list_posts(bea.session(), group)?.is_empty());
    let err = h.services.view_post(bea.session(), post).unwrap_err();
    assert!(matches!(domain(err), DomainError::NotFound(_)));

    let teacher_view = h.services.view_post(h.teacher.session(), post)?;
    assert_eq!(teacher_view.is_deleted, Some(true));
    assert_eq!(h.services.list_posts(h.teacher.session(), group)?.len(), 1);
    Ok(())
}

#[test]
fn own_posts_list_only_live_posts_of_the_caller() -> anyhow::Result<()> {
    let h = Harness::new()?;
    let bea = h.student("bea")?;
    let group = h.create_group(&h.teacher, "Painting")?;
    h.services.add_member(h.teacher.session(), group, bea.id)?;
    let gone = h.post(&bea, group, "draft")?;
    let kept = h.post(&bea, group, "final")?;
    h.post(&h.teacher, group, "assignment")?;
    h.services.delete_post(bea.session(), gone)?;

    let mine: Vec<_> = h.services.my_posts(bea.session())?.into_iter().map(|p| p.id).collect();
    assert_eq!(mine, vec![kept]);

    let err = h.services.my_posts(None).unwrap_err();
    assert!(matches!(err, ServiceError::Authz(AuthzError::Unauthenticated)));
    Ok(())
}

#[test]
fn profile_stats_count_comment_likes_as_given() -> anyhow::Result<()> {
    let h = Harness::new()?;
    let bea = h.student("bea")?;
    let group = h.create_group(&h.teacher, "Drama")?;
    h.services.add_member(h.teacher.session(), group, bea.id)?;
    let post = h.post(&bea, group, "testing content")?;

    h.services.like_post(h.teacher.session(), post, &body(json!({})))?;
    h.services.like_post(bea.session(), post, &body(json!({})))?;
    let teacher_comment = h
        .services
        .comment_on_post(h.teacher.session(), post, &body(json!({ "content": "testing comment" })))?;
    h.services
        .comment_on_post(bea.session(), post, &body(json!({ "content": "another comment" })))?;
    h.services
        .like_comment(bea.session(), teacher_comment.id, &body(json!({})))?;

    let profile = h.services.view_user(bea.session(), bea.id)?;
    let stats = profile.stats.expect("own profile carries stats");
    let activity = &stats[&group];
    assert_eq!(activity.num_comments, 1);
    assert_eq!(activity.num_likes_given, 2);
    assert_eq!(activity.num_likes_received, 2);
    Ok(())
}

#[test]
fn only_the_author_or_group_creator_deletes_a_post() -> anyhow::Result<()> {
    let h = Harness::new()?;
    let bea = h.student("bea")?;
    let cal = h.student("cal")?;
    let group = h.create_group(&h.teacher, "Biology")?;
    h.services.add_member(h.teacher.session(), group, bea.id)?;
    h.services.add_member(h.teacher.session(), group, cal.id)?;
    let post = h.post(&bea, group, "cells")?;

    let err = h.services.delete_post(cal.session(), post).unwrap_err();
    assert_eq!(denial_kind(err), DenialKind::Ownership);
    h.services.delete_post(h.teacher.session(), post)?;
    Ok(())
}

#[test]
fn shares_record_a_row_per_call() -> anyhow::Result<()> {
    let h = Harness::new()?;
    let group = h.create_group(&h.teacher, "News")?;
    let post = h.post(&h.teacher, group, "field trip friday")?;

    h.services.share_post(h.teacher.session(), post)?;
    h.services.share_post(h.teacher.session(), post)?;
    assert_eq!(h.services.view_post(h.teacher.session(), post)?.shares.len(), 2);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Notifications
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn comments_notify_the_author_and_push_after_commit() -> anyhow::Result<()> {
    let h = Harness::new()?;
    let bea = h.student("bea")?;
    let group = h.create_group(&h.teacher, "Physics")?;
    h.services.add_member(h.teacher.session(), group, bea.id)?;
    let post = h.post(&bea, group, "gravity")?;
    h.pushes.drain();

    h.services
        .comment_on_post(h.teacher.session(), post, &body(json!({ "content": "nice" })))?;

    let pushed = h.pushes.drain();
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].recipient(), bea.id);
    assert_eq!(pushed[0].payload().post, Some(post));

    assert_eq!(h.services.unseen_count(bea.session())?.number_of_unseen, 2);
    assert_eq!(h.services.list_notifications(bea.session())?.len(), 2);
    assert_eq!(h.services.reset_unseen(bea.session())?.number_of_unseen, 0);
    Ok(())
}

#[test]
fn muted_users_are_notified_but_not_pushed() -> anyhow::Result<()> {
    let h = Harness::new()?;
    let bea = h.student("bea")?;
    h.services
        .update_user_settings(bea.session(), &body(json!({ "receive_notifications": "false" })))?;
    let group = h.create_group(&h.teacher, "Latin")?;
    h.pushes.drain();

    h.services.add_member(h.teacher.session(), group, bea.id)?;

    assert!(h.pushes.drain().is_empty());
    assert_eq!(h.services.list_notifications(bea.session())?.len(), 1);
    Ok(())
}

#[test]
fn failed_actions_push_nothing() -> anyhow::Result<()> {
    let h = Harness::new()?;
    let bea = h.student("bea")?;
    let group = h.create_group(&h.teacher, "Spanish")?;
    h.services.add_member(h.teacher.session(), group, bea.id)?;
    h.pushes.drain();

    assert!(h.services.add_member(h.teacher.session(), group, bea.id).is_err());
    assert!(h.pushes.drain().is_empty());
    assert_eq!(h.services.list_notifications(bea.session())?.len(), 1);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Users and sessions
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn logout_blacklists_the_presented_token() -> anyhow::Result<()> {
    let h = Harness::new()?;
    let bea = h.student("bea")?;

    h.services.logout(bea.session())?;
    let stale = h.services.credentials().resolve(&bea.session.token)?;
    assert!(stale.blacklisted);

    let err = h.services.user_settings(Some(&stale)).unwrap_err();
    assert!(matches!(err, ServiceError::Authz(AuthzError::Unauthenticated)));
    Ok(())
}

#[test]
fn only_the_owning_teacher_logs_in_as_a_virtual_student() -> anyhow::Result<()> {
    let h = Harness::new()?;
    let bob = h.register("SUPERUSER", "bob", None)?;
    let shadow = h.register("VIRTUAL_USER", "alice_shadow", Some(h.teacher.id))?;
    let request = body(json!({ "email_address": "alice_shadow@school.org" }));

    let err = h.services.login_as_virtual(bob.session(), &request).unwrap_err();
    assert_eq!(denial_kind(err), DenialKind::Ownership);

    let login = h.services.login_as_virtual(h.teacher.session(), &request)?;
    assert_eq!(login.user.id, shadow.id);
    let session = h.services.credentials().resolve(&login.token)?;
    assert_eq!(session.identity.user_id, shadow.id);
    Ok(())
}

#[test]
fn anonymous_virtual_login_is_unauthenticated_even_for_unknown_emails() -> anyhow::Result<()> {
    let h = Harness::new()?;
    let err = h
        .services
        .login_as_virtual(None, &body(json!({ "email_address": "nobody@school.org" })))
        .unwrap_err();
    assert!(matches!(err, ServiceError::Authz(AuthzError::Unauthenticated)));
    Ok(())
}

#[test]
fn profile_updates_enforce_uniqueness() -> anyhow::Result<()> {
    let h = Harness::new()?;
    let bea = h.student("bea")?;
    h.student("cal")?;

    let err = h
        .services
        .update_user(bea.session(), bea.id, &body(json!({ "username": "cal" })))
        .unwrap_err();
    assert!(matches!(domain(err), DomainError::Conflict(_)));

    let updated = h
        .services
        .update_user(bea.session(), bea.id, &body(json!({ "description": "likes frogs" })))?;
    assert_eq!(updated.description, "likes frogs");
    Ok(())
}

#[test]
fn bootstrap_is_idempotent() -> anyhow::Result<()> {
    let h = Harness::new()?;
    let again = h.services.bootstrap_teacher("alice", "alice@school.org")?;
    assert_eq!(again.teacher.id, h.teacher.id);
    assert!(!again.created);
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Surveys and games
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn surveys_accept_one_answer_per_user() -> anyhow::Result<()> {
    let h = Harness::new()?;
    let bea = h.student("bea")?;
    let group = h.create_group(&h.teacher, "Homeroom")?;
    h.services.add_member(h.teacher.session(), group, bea.id)?;

    let survey = h.services.create_survey(
        h.teacher.session(),
        group,
        &body(json!({
            "title": "Lunch",
            "is_pinned": true,
            "questions_answers": [
                { "question": "Favourite fruit?", "options": ["apple", "pear"], "type": "radio", "required": true }
            ]
        })),
    )?;

    h.services
        .answer_survey(bea.session(), survey.id, &body(json!({ "answers": ["pear"] })))?;
    let err = h
        .services
        .answer_survey(bea.session(), survey.id, &body(json!({ "answers": ["apple"] })))
        .unwrap_err();
    assert!(matches!(domain(err), DomainError::Conflict(_)));

    let done = SurveyFilter {
        is_pinned: None,
        is_completed: Some(true),
    };
    assert_eq!(h.services.list_surveys(bea.session(), group, done)?.len(), 1);
    assert!(h.services.list_surveys(h.teacher.session(), group, done)?.is_empty());
    Ok(())
}

#[test]
fn games_walk_to_an_ending_once() -> anyhow::Result<()> {
    let h = Harness::new()?;
    let bea = h.student("bea")?;
    let group = h.create_group(&h.teacher, "Ethics")?;
    h.services.add_member(h.teacher.session(), group, bea.id)?;

    let game = h.services.create_game(
        h.teacher.session(),
        group,
        &body(json!({
            "title": "Playground",
            "first_scene": "start",
            "scenes": [
                { "key": "start", "choices": [
                    { "text": "share", "tag": "kind", "pathway": "good" },
                    { "text": "grab", "tag": "mean", "pathway": "bad" }
                ] },
                { "key": "good", "is_end": true, "dialogue": [{ "speech": "Yay", "tag": "GOOD_ENDING" }] },
                { "key": "bad", "is_end": true, "dialogue": [{ "speech": "Oh no", "tag": "BAD_ENDING" }] }
            ]
        })),
    )?;

    let answer = h.services.answer_game(bea.session(), game.id, &body(json!({ "answers": [0] })))?;
    assert_eq!(answer.ending, "GOOD_ENDING");

    let err = h
        .services
        .answer_game(bea.session(), game.id, &body(json!({ "answers": [1] })))
        .unwrap_err();
    assert!(matches!(domain(err), DomainError::Conflict(_)));

    let views = h.services.list_games(h.teacher.session(), group)?;
    assert_eq!(views[0].stats.as_ref().map(|s| s.num_of_responses), Some(1));
    Ok(())
}

#[test]
fn deleting_a_group_cascades() -> anyhow::Result<()> {
    let h = Harness::new()?;
    let group = h.create_group(&h.teacher, "Temporary")?;
    let post = h.post(&h.teacher, group, "bye")?;

    h.services.delete_group(h.teacher.session(), group)?;

    assert!(h.services.list_groups(h.teacher.session())?.is_empty());
    assert!(h.services.store().read(|t| t.post(post).is_err())?);
    assert!(h.services.list_notifications(h.teacher.session())?.is_empty());
    Ok(())
}
