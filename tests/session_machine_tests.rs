mod common;

use common::{bundle, day, started, streak, Harness};
use parish::api::StartSessionOutcome;
use parish::errors::{ApiError, AppError, FailureTag, SessionError};
use parish::session::{
    CompletionOutcome, ForegroundOutcome, SessionMachine, SessionScope, SessionStatus,
};
use parish::{CalendarDay, Clock};

/// Loads today's session into `Ready` with session id `id`.
async fn ready(harness: &Harness, machine: &SessionMachine, id: &str) {
    let today = machine_today(harness);
    harness.api.push_today(Ok(bundle(today)));
    harness.api.push_start(Ok(started(id)));
    assert_eq!(machine.load().await.unwrap(), SessionStatus::Ready);
}

fn machine_today(harness: &Harness) -> CalendarDay {
    harness.clock.today()
}

#[tokio::test]
async fn test_load_reaches_ready_with_content() {
    let harness = Harness::at(day(2025, 1, 15));
    let machine = harness.machine();
    assert_eq!(machine.status(), SessionStatus::Idle);

    ready(&harness, &machine, "s-1").await;

    let state = machine.snapshot();
    assert_eq!(state.day, Some(day(2025, 1, 15)));
    assert_eq!(state.scope, SessionScope::Today);
    assert_eq!(state.session_id.as_deref(), Some("s-1"));
    assert_eq!(state.content.map(|c| c.day), Some(day(2025, 1, 15)));
    assert!(state.error.is_none());
}

#[tokio::test]
async fn test_full_flow_to_confirmed_completion() {
    let harness = Harness::at(day(2025, 1, 15));
    let machine = harness.machine();
    ready(&harness, &machine, "s-1").await;

    machine.begin_playback().unwrap();
    assert_eq!(machine.status(), SessionStatus::Playing);
    machine.mark_content_consumed().unwrap();
    assert_eq!(machine.status(), SessionStatus::AwaitingCompletion);

    harness.api.push_complete(Ok(streak(3)));
    let outcome = machine.complete().await.unwrap();

    assert_eq!(outcome, CompletionOutcome::Confirmed(streak(3)));
    let state = machine.snapshot();
    assert_eq!(state.status, SessionStatus::Completed);
    assert_eq!(state.streak, Some(streak(3)));
    assert!(machine.record().completed);
    assert_eq!(machine.record().unconfirmed_session_id, None);
}

#[tokio::test]
async fn test_already_completed_goes_straight_to_completed() {
    let harness = Harness::at(day(2025, 1, 15));
    let machine = harness.machine();
    harness.api.push_today(Ok(bundle(day(2025, 1, 15))));
    harness.api.push_start(Ok(StartSessionOutcome::AlreadyCompleted));

    let status = machine.load().await.unwrap();

    assert_eq!(status, SessionStatus::Completed);
    let state = machine.snapshot();
    assert_eq!(state.session_id, None);
    assert!(state.content.is_some());
    assert!(machine.record().completed);
    assert_eq!(harness.api.calls(), vec!["today", "start"]);
}

#[tokio::test]
async fn test_completed_day_never_restarts_or_recompletes() {
    let harness = Harness::at(day(2025, 1, 15));
    let machine = harness.machine();
    harness.api.push_today(Ok(bundle(day(2025, 1, 15))));
    harness.api.push_start(Ok(StartSessionOutcome::AlreadyCompleted));
    machine.load().await.unwrap();

    // Pull-to-refresh on the same day.
    harness.api.push_today(Ok(bundle(day(2025, 1, 15))));
    assert_eq!(machine.load().await.unwrap(), SessionStatus::Completed);

    // A fresh process on the same day.
    let reopened = harness.machine();
    assert_eq!(reopened.status(), SessionStatus::Completed);
    harness.api.push_today(Ok(bundle(day(2025, 1, 15))));
    assert_eq!(reopened.load().await.unwrap(), SessionStatus::Completed);

    assert_eq!(harness.api.count("start"), 1);
    assert_eq!(harness.api.count("complete"), 0);
}

#[tokio::test]
async fn test_complete_twice_makes_one_call() {
    let harness = Harness::at(day(2025, 1, 15));
    let machine = harness.machine();
    ready(&harness, &machine, "s-1").await;
    machine.mark_content_consumed().unwrap();
    harness.api.push_complete(Ok(streak(1)));

    machine.complete().await.unwrap();
    let second = machine.complete().await;

    assert!(matches!(
        second,
        Err(AppError::Session(SessionError::InvalidTransition {
            from: SessionStatus::Completed,
            event: "complete"
        }))
    ));
    assert_eq!(harness.api.count("complete"), 1);
}

#[tokio::test]
async fn test_complete_requires_consumed_content() {
    let harness = Harness::at(day(2025, 1, 15));
    let machine = harness.machine();
    ready(&harness, &machine, "s-1").await;

    assert!(matches!(
        machine.complete().await,
        Err(AppError::Session(SessionError::InvalidTransition {
            from: SessionStatus::Ready,
            ..
        }))
    ));
    assert!(machine.begin_playback().is_ok());
    assert_eq!(harness.api.count("complete"), 0);
}

#[tokio::test]
async fn test_playback_before_ready_is_rejected() {
    let harness = Harness::at(day(2025, 1, 15));
    let machine = harness.machine();

    assert!(matches!(
        machine.begin_playback(),
        Err(AppError::Session(SessionError::InvalidTransition {
            from: SessionStatus::Idle,
            ..
        }))
    ));
    assert!(machine.mark_content_consumed().is_err());
}

#[tokio::test]
async fn test_failed_confirmation_completes_optimistically_and_retries_on_foreground() {
    let harness = Harness::at(day(2025, 1, 15));
    let machine = harness.machine();
    ready(&harness, &machine, "s-1").await;
    machine.mark_content_consumed().unwrap();

    harness.api.push_complete(Err(ApiError::Timeout { seconds: 15 }));
    let outcome = machine.complete().await.unwrap();

    assert_eq!(
        outcome,
        CompletionOutcome::Unconfirmed {
            tag: FailureTag::Offline
        }
    );
    assert_eq!(machine.status(), SessionStatus::Completed);
    assert_eq!(
        machine.record().unconfirmed_session_id.as_deref(),
        Some("s-1")
    );

    harness.api.push_complete(Ok(streak(4)));
    let foreground = machine.on_foreground().await.unwrap();

    assert_eq!(foreground, ForegroundOutcome::Unchanged);
    assert_eq!(machine.record().unconfirmed_session_id, None);
    assert_eq!(machine.snapshot().streak, Some(streak(4)));
    assert_eq!(harness.api.count("complete s-1"), 2);
}

#[tokio::test]
async fn test_pending_confirmation_survives_restart_and_precedes_new_session() {
    let harness = Harness::at(day(2025, 1, 15));
    {
        let machine = harness.machine();
        ready(&harness, &machine, "s-1").await;
        machine.mark_content_consumed().unwrap();
        harness.api.push_complete(Err(ApiError::Server {
            status: 503,
            body: String::new(),
        }));
        machine.complete().await.unwrap();
    }

    harness.clock.advance_days(1);
    let machine = harness.machine();
    harness.api.push_complete(Ok(streak(2)));
    ready(&harness, &machine, "s-2").await;

    let calls = harness.api.calls();
    let confirm = calls.iter().rposition(|c| c == "complete s-1").unwrap();
    let start = calls.iter().rposition(|c| c == "start").unwrap();
    assert!(confirm < start, "confirmation must precede the new start: {:?}", calls);
    assert_eq!(machine.record().unconfirmed_session_id, None);
}

#[tokio::test]
async fn test_load_failures_carry_distinct_tags() {
    let cases = [
        (ApiError::Unauthorized, FailureTag::AuthExpired),
        (
            ApiError::NotFound("today's readings".to_string()),
            FailureTag::NotAvailable,
        ),
        (ApiError::Timeout { seconds: 15 }, FailureTag::Offline),
        (
            ApiError::InvalidResponse("bad json".to_string()),
            FailureTag::Unexpected,
        ),
    ];

    for (error, expected) in cases {
        let harness = Harness::at(day(2025, 1, 15));
        let machine = harness.machine();
        harness.api.push_today(Err(error));

        assert_eq!(machine.load().await.unwrap(), SessionStatus::Error);
        let failure = machine.snapshot().error.unwrap();
        assert_eq!(failure.tag, expected);
        assert_eq!(harness.api.count("start"), 0);
    }
}

#[tokio::test]
async fn test_start_failure_is_an_error_too() {
    let harness = Harness::at(day(2025, 1, 15));
    let machine = harness.machine();
    harness.api.push_today(Ok(bundle(day(2025, 1, 15))));
    harness.api.push_start(Err(ApiError::Unauthorized));

    assert_eq!(machine.load().await.unwrap(), SessionStatus::Error);
    assert_eq!(
        machine.snapshot().error.map(|e| e.tag),
        Some(FailureTag::AuthExpired)
    );
}

#[tokio::test]
async fn test_retry_only_from_error() {
    let harness = Harness::at(day(2025, 1, 15));
    let machine = harness.machine();

    assert!(matches!(
        machine.retry().await,
        Err(AppError::Session(SessionError::InvalidTransition {
            from: SessionStatus::Idle,
            event: "retry"
        }))
    ));

    harness.api.push_today(Err(ApiError::Timeout { seconds: 15 }));
    machine.load().await.unwrap();
    assert_eq!(machine.status(), SessionStatus::Error);

    harness.api.push_today(Ok(bundle(day(2025, 1, 15))));
    harness.api.push_start(Ok(started("s-1")));
    assert_eq!(machine.retry().await.unwrap(), SessionStatus::Ready);
    assert!(machine.snapshot().error.is_none());
}

#[tokio::test]
async fn test_rollover_exposes_loading_for_new_day() {
    let harness = Harness::at(day(2025, 1, 1));
    let machine = harness.machine();
    harness.api.push_today(Ok(bundle(day(2025, 1, 1))));
    harness.api.push_start(Ok(StartSessionOutcome::AlreadyCompleted));
    machine.load().await.unwrap();
    assert_eq!(machine.status(), SessionStatus::Completed);

    harness.clock.set_day(day(2025, 1, 2));
    let gate = harness.api.push_today_gated(Ok(bundle(day(2025, 1, 2))));
    harness.api.push_start(Ok(started("s-2")));

    let (outcome, in_flight) = tokio::join!(machine.on_foreground(), async {
        while harness.api.count("today") < 2 {
            tokio::task::yield_now().await;
        }
        let observed = machine.snapshot();
        gate.notify_one();
        observed
    });

    assert_eq!(in_flight.status, SessionStatus::Loading);
    assert_eq!(in_flight.day, Some(day(2025, 1, 2)));
    assert!(in_flight.content.is_none());
    assert_eq!(
        outcome.unwrap(),
        ForegroundOutcome::RolledOver {
            from: day(2025, 1, 1),
            to: day(2025, 1, 2)
        }
    );

    let state = machine.snapshot();
    assert_eq!(state.status, SessionStatus::Ready);
    assert_eq!(state.session_id.as_deref(), Some("s-2"));
    assert!(!machine.record().completed);
}

#[tokio::test]
async fn test_foreground_same_day_changes_nothing() {
    let harness = Harness::at(day(2025, 1, 1));
    let machine = harness.machine();
    ready(&harness, &machine, "s-1").await;
    machine.begin_playback().unwrap();

    assert_eq!(
        machine.on_foreground().await.unwrap(),
        ForegroundOutcome::Unchanged
    );
    assert_eq!(machine.status(), SessionStatus::Playing);
}

#[tokio::test]
async fn test_reload_while_playing_is_rejected() {
    let harness = Harness::at(day(2025, 1, 1));
    let machine = harness.machine();
    ready(&harness, &machine, "s-1").await;
    machine.begin_playback().unwrap();

    assert!(machine.load().await.is_err());
    assert_eq!(machine.status(), SessionStatus::Playing);
}

#[tokio::test]
async fn test_stale_response_is_discarded() {
    let harness = Harness::at(day(2025, 1, 1));
    let machine = harness.machine();
    let gate = harness.api.push_today_gated(Ok(bundle(day(2025, 1, 1))));
    harness.api.push_today(Ok(bundle(day(2025, 1, 2))));
    harness.api.push_start(Ok(started("s-2")));

    let (stale, current) = tokio::join!(machine.load(), async {
        while harness.api.count("today") < 1 {
            tokio::task::yield_now().await;
        }
        harness.clock.set_day(day(2025, 1, 2));
        let status = machine.load().await;
        gate.notify_one();
        status
    });

    assert_eq!(current.unwrap(), SessionStatus::Ready);
    assert_eq!(stale.unwrap(), SessionStatus::Ready);
    let state = machine.snapshot();
    assert_eq!(state.day, Some(day(2025, 1, 2)));
    assert_eq!(state.content.map(|c| c.day), Some(day(2025, 1, 2)));
    assert_eq!(state.session_id.as_deref(), Some("s-2"));
    assert_eq!(harness.api.count("start"), 1);
}

#[tokio::test]
async fn test_past_day_view_is_read_only() {
    let harness = Harness::at(day(2025, 1, 15));
    let machine = harness.machine();
    harness.api.push_today(Ok(bundle(day(2025, 1, 15))));
    harness.api.push_start(Ok(StartSessionOutcome::AlreadyCompleted));
    machine.load().await.unwrap();
    let record = machine.record();

    harness.api.push_day(Ok(bundle(day(2025, 1, 3))));
    assert_eq!(machine.view_day(day(2025, 1, 3)).await, SessionStatus::Ready);

    let state = machine.snapshot();
    assert_eq!(state.scope, SessionScope::PastDay);
    assert_eq!(state.day, Some(day(2025, 1, 3)));
    assert!(matches!(
        machine.mark_content_consumed(),
        Err(AppError::Session(SessionError::ReadOnlyDay { .. }))
    ));
    assert_eq!(machine.record(), record);
    assert_eq!(harness.api.count("start"), 1);

    // Coming back on a new day keeps the past day on screen but forgets
    // yesterday's completion.
    harness.clock.advance_days(1);
    assert_eq!(
        machine.on_foreground().await.unwrap(),
        ForegroundOutcome::RolledOver {
            from: day(2025, 1, 15),
            to: day(2025, 1, 16),
        }
    );
    assert_eq!(machine.snapshot().day, Some(day(2025, 1, 3)));
    assert_eq!(machine.snapshot().scope, SessionScope::PastDay);
    let record = machine.record();
    assert_eq!(record.day, Some(day(2025, 1, 16)));
    assert!(!record.completed);
    assert!(!record.completed_on(day(2025, 1, 15)));
}

#[tokio::test]
async fn test_mark_read_on_past_day_changes_nothing() {
    let harness = Harness::at(day(2025, 1, 15));
    let machine = harness.machine();
    harness.api.push_day(Ok(bundle(day(2025, 1, 3))));
    assert_eq!(machine.view_day(day(2025, 1, 3)).await, SessionStatus::Ready);

    assert!(matches!(
        machine.mark_read(),
        Err(AppError::Session(SessionError::ReadOnlyDay { .. }))
    ));
    assert_eq!(machine.status(), SessionStatus::Ready);
    assert_eq!(machine.snapshot().scope, SessionScope::PastDay);
}

#[tokio::test]
async fn test_mark_read_skips_playing() {
    let harness = Harness::at(day(2025, 1, 15));
    let machine = harness.machine();
    let mut updates = machine.subscribe();
    harness.api.push_today(Ok(bundle(day(2025, 1, 15))));
    harness.api.push_start(Ok(started("s-7")));
    assert_eq!(machine.load().await.unwrap(), SessionStatus::Ready);
    updates.borrow_and_update();

    machine.mark_read().unwrap();
    assert!(updates.has_changed().unwrap());
    assert_eq!(
        updates.borrow_and_update().status,
        SessionStatus::AwaitingCompletion
    );
    // Marking again is harmless.
    machine.mark_read().unwrap();
    assert_eq!(machine.status(), SessionStatus::AwaitingCompletion);
}

#[tokio::test]
async fn test_mark_read_before_content_is_rejected() {
    let harness = Harness::at(day(2025, 1, 15));
    let machine = harness.machine();
    assert!(matches!(
        machine.mark_read(),
        Err(AppError::Session(SessionError::InvalidTransition {
            from: SessionStatus::Idle,
            ..
        }))
    ));
    assert_eq!(machine.status(), SessionStatus::Idle);
}

#[tokio::test]
async fn test_past_day_not_available() {
    let harness = Harness::at(day(2025, 1, 15));
    let machine = harness.machine();
    harness
        .api
        .push_day(Err(ApiError::NotFound("readings for 1999-01-01".to_string())));

    assert_eq!(machine.view_day(day(1999, 1, 1)).await, SessionStatus::Error);
    let failure = machine.snapshot().error.unwrap();
    assert_eq!(failure.tag, FailureTag::NotAvailable);
    assert!(!failure.tag.is_retryable());
}

#[tokio::test]
async fn test_reset_clears_record() {
    let harness = Harness::at(day(2025, 1, 15));
    let machine = harness.machine();
    harness.api.push_today(Ok(bundle(day(2025, 1, 15))));
    harness.api.push_start(Ok(StartSessionOutcome::AlreadyCompleted));
    machine.load().await.unwrap();

    machine.reset();

    assert_eq!(machine.status(), SessionStatus::Idle);
    assert_eq!(harness.machine().status(), SessionStatus::Idle);
}
