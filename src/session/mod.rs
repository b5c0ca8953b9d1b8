//! The daily session state machine.
//!
//! Tracks one day's practice against the remote API:
//!
//! ```text
//! Idle ─load─▶ Loading ─fetch + start─▶ Ready ─play─▶ Playing ─end─▶ AwaitingCompletion ─▶ Completed
//!                 │  └──── start says "already completed" (409) ────────────────────────────▲
//!                 └─▶ Error ─retry─▶ Loading
//! ```
//!
//! The server's "already completed" answer is authoritative: the day is
//! recorded as complete and start-session is never called again for it until
//! the day rolls over. A failed complete-session call still lands in
//! `Completed`; the session id is kept and confirmation is retried on the
//! next foreground or load.
//!
//! Every request carries a ticket. A response whose ticket is no longer
//! current (because a newer load superseded it) is dropped without touching
//! state. Only the day and its completion are persisted; loaded content never is.

use crate::api::{ContentApi, ContentBundle, StartSessionOutcome, StreakSummary};
use crate::clock::{CalendarDay, Clock};
use crate::constants::SESSION_NAMESPACE;
use crate::errors::{ApiError, AppResult, FailureTag, SessionError};
use crate::storage::{load_or_default, KeyValueStore, Persister};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Where the machine is in the daily flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Idle,
    Loading,
    Ready,
    Playing,
    AwaitingCompletion,
    Completed,
    Error,
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionStatus::Idle => "idle",
            SessionStatus::Loading => "loading",
            SessionStatus::Ready => "ready",
            SessionStatus::Playing => "playing",
            SessionStatus::AwaitingCompletion => "awaiting_completion",
            SessionStatus::Completed => "completed",
            SessionStatus::Error => "error",
        };
        f.write_str(name)
    }
}

/// Whether the machine is tracking today's session or showing a past day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionScope {
    #[default]
    Today,
    /// Read-only: never starts or completes a session.
    PastDay,
}

/// Why the last load failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionFailure {
    pub tag: FailureTag,
    pub message: String,
}

/// Observable session state.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionState {
    pub day: Option<CalendarDay>,
    pub scope: SessionScope,
    pub content: Option<ContentBundle>,
    pub session_id: Option<String>,
    pub status: SessionStatus,
    pub error: Option<SessionFailure>,
    /// Streak reported by the last confirmed completion.
    pub streak: Option<StreakSummary>,
}

impl SessionState {
    fn loading(day: CalendarDay, scope: SessionScope) -> Self {
        SessionState {
            day: Some(day),
            scope,
            status: SessionStatus::Loading,
            ..SessionState::default()
        }
    }
}

/// The persisted part of the session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionRecord {
    /// The day of today's session as last loaded.
    pub day: Option<CalendarDay>,
    /// Whether that day's session is complete.
    pub completed: bool,
    /// A completed session the server has not acknowledged yet.
    pub unconfirmed_session_id: Option<String>,
}

impl SessionRecord {
    /// Whether `day` is recorded as completed.
    pub fn completed_on(&self, day: CalendarDay) -> bool {
        self.completed && self.day == Some(day)
    }
}

/// How a completion ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The server acknowledged the completion.
    Confirmed(StreakSummary),
    /// Completed locally; confirmation will be retried.
    Unconfirmed { tag: FailureTag },
}

/// What a foreground transition found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForegroundOutcome {
    Unchanged,
    RolledOver { from: CalendarDay, to: CalendarDay },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Ticket {
    seq: u64,
    day: CalendarDay,
}

struct Bookkeeping {
    seq: u64,
    record: SessionRecord,
    auth_token: String,
    completing: bool,
}

/// Owner of the session state.
pub struct SessionMachine {
    api: Arc<dyn ContentApi>,
    clock: Arc<dyn Clock>,
    state: watch::Sender<SessionState>,
    inner: Mutex<Bookkeeping>,
    persister: Persister<SessionRecord>,
}

impl SessionMachine {
    /// Restores the persisted record and builds the initial state.
    ///
    /// If today's session was already completed, the machine starts in
    /// `Completed` so no fetch is needed to know it.
    pub fn open(
        backend: Arc<dyn KeyValueStore>,
        api: Arc<dyn ContentApi>,
        clock: Arc<dyn Clock>,
        auth_token: impl Into<String>,
        debounce: Duration,
    ) -> Self {
        let record: SessionRecord = load_or_default(backend.as_ref(), SESSION_NAMESPACE);
        let today = clock.today();
        let initial = if record.completed_on(today) {
            SessionState {
                day: Some(today),
                status: SessionStatus::Completed,
                ..SessionState::default()
            }
        } else {
            SessionState::default()
        };
        debug!("Session opened as {}", initial.status);

        let (sender, _) = watch::channel(initial);
        Self {
            api,
            clock,
            state: sender,
            inner: Mutex::new(Bookkeeping {
                seq: 0,
                record,
                auth_token: auth_token.into(),
                completing: false,
            }),
            persister: Persister::new(backend, SESSION_NAMESPACE, debounce),
        }
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Receives every future state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// The current status.
    pub fn status(&self) -> SessionStatus {
        self.state.borrow().status
    }

    /// A copy of the persisted record.
    pub fn record(&self) -> SessionRecord {
        self.lock().record.clone()
    }

    /// Replaces the bearer token used for subsequent calls.
    pub fn set_auth_token(&self, auth_token: impl Into<String>) {
        self.lock().auth_token = auth_token.into();
    }

    fn lock(&self) -> MutexGuard<'_, Bookkeeping> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn auth_token(&self) -> String {
        self.lock().auth_token.clone()
    }

    fn persist(&self, record: &SessionRecord) {
        self.persister.schedule(record);
    }

    /// Starts a new request, superseding any in flight, and shows `Loading`.
    fn begin_request(&self, day: CalendarDay, scope: SessionScope) -> Ticket {
        let mut inner = self.lock();
        inner.seq += 1;
        if scope == SessionScope::Today && inner.record.day != Some(day) {
            inner.record.day = Some(day);
            inner.record.completed = false;
            self.persist(&inner.record);
        }
        self.state.send_replace(SessionState::loading(day, scope));
        debug!("Loading {} (request {})", day, inner.seq);
        Ticket {
            seq: inner.seq,
            day,
        }
    }

    /// A ticket for the current request, without resetting state.
    fn current_ticket(&self, day: CalendarDay) -> Ticket {
        let mut inner = self.lock();
        inner.seq += 1;
        Ticket {
            seq: inner.seq,
            day,
        }
    }

    fn is_current(&self, ticket: Ticket) -> bool {
        self.lock().seq == ticket.seq && self.state.borrow().day == Some(ticket.day)
    }

    /// Applies `update` only if `ticket` is still the active request.
    fn apply(&self, ticket: Ticket, update: impl FnOnce(&mut SessionState)) -> bool {
        let inner = self.lock();
        if inner.seq != ticket.seq || self.state.borrow().day != Some(ticket.day) {
            debug!("Discarding stale response for {}", ticket.day);
            return false;
        }
        self.state.send_modify(update);
        drop(inner);
        true
    }

    fn fail(&self, ticket: Ticket, error: ApiError) -> SessionStatus {
        let tag = error.failure_tag();
        warn!("Loading {} failed ({}): {}", ticket.day, tag, error);
        self.apply(ticket, |state| {
            state.status = SessionStatus::Error;
            state.error = Some(SessionFailure {
                tag,
                message: error.to_string(),
            });
        });
        self.status()
    }

    fn invalid(&self, event: &'static str) -> SessionError {
        SessionError::InvalidTransition {
            from: self.status(),
            event,
        }
    }

    /// Loads today's content and starts today's session.
    ///
    /// Network failures land in `Error` and are reported through the state,
    /// not as `Err`. A load for a newer day supersedes one still in flight.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` if today's session is
    /// already playing or awaiting completion.
    pub async fn load(&self) -> AppResult<SessionStatus> {
        let today = self.clock.today();
        self.load_today(today).await
    }

    async fn load_today(&self, day: CalendarDay) -> AppResult<SessionStatus> {
        let (scope, current_day, status) = {
            let state = self.state.borrow();
            (state.scope, state.day, state.status)
        };
        if scope == SessionScope::Today && current_day == Some(day) {
            match status {
                SessionStatus::Playing | SessionStatus::AwaitingCompletion => {
                    return Err(self.invalid("reload").into());
                }
                SessionStatus::Completed => return Ok(self.refresh_completed(day).await),
                _ => {}
            }
        }

        let ticket = self.begin_request(day, SessionScope::Today);
        self.reconcile_pending().await;

        let token = self.auth_token();
        let content = match self.api.today_content(&token).await {
            Ok(content) => content,
            Err(e) => return Ok(self.fail(ticket, e)),
        };
        if !self.is_current(ticket) {
            debug!("Discarding stale content for {}", day);
            return Ok(self.status());
        }
        if content.day != day {
            warn!("Server day {} differs from local day {}", content.day, day);
        }

        if self.lock().record.completed_on(day) {
            self.apply(ticket, |state| {
                state.content = Some(content);
                state.status = SessionStatus::Completed;
            });
            return Ok(self.status());
        }

        let outcome = match self.api.start_session(&token).await {
            Ok(outcome) => outcome,
            Err(e) => return Ok(self.fail(ticket, e)),
        };

        match outcome {
            StartSessionOutcome::Started { session_id } => {
                info!("Session {} started for {}", session_id, day);
                self.apply(ticket, |state| {
                    state.content = Some(content);
                    state.session_id = Some(session_id);
                    state.status = SessionStatus::Ready;
                });
            }
            StartSessionOutcome::AlreadyCompleted => {
                let applied = self.apply(ticket, |state| {
                    state.content = Some(content);
                    state.status = SessionStatus::Completed;
                });
                if applied {
                    info!("Session for {} already completed on server", day);
                    let mut inner = self.lock();
                    inner.record.completed = true;
                    self.persist(&inner.record);
                }
            }
        }
        Ok(self.status())
    }

    /// Refetches content for a day that is already complete, staying `Completed`.
    async fn refresh_completed(&self, day: CalendarDay) -> SessionStatus {
        let ticket = self.current_ticket(day);
        self.reconcile_pending().await;
        match self.api.today_content(&self.auth_token()).await {
            Ok(content) => {
                self.apply(ticket, |state| {
                    state.content = Some(content);
                    state.error = None;
                });
            }
            Err(e) => warn!("Refreshing completed day {} failed: {}", day, e),
        }
        self.status()
    }

    /// Shows content for `day` without starting or completing a session.
    ///
    /// Today's completion record is left untouched.
    pub async fn view_day(&self, day: CalendarDay) -> SessionStatus {
        let ticket = self.begin_request(day, SessionScope::PastDay);
        match self.api.content_for_day(&self.auth_token(), day).await {
            Ok(content) => {
                self.apply(ticket, |state| {
                    state.content = Some(content);
                    state.status = SessionStatus::Ready;
                });
                self.status()
            }
            Err(e) => self.fail(ticket, e),
        }
    }

    /// Re-runs the failed request.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` unless the machine is in `Error`.
    pub async fn retry(&self) -> AppResult<SessionStatus> {
        let (status, scope, day) = {
            let state = self.state.borrow();
            (state.status, state.scope, state.day)
        };
        if status != SessionStatus::Error {
            return Err(self.invalid("retry").into());
        }
        match (scope, day) {
            (SessionScope::PastDay, Some(day)) => Ok(self.view_day(day).await),
            _ => self.load().await,
        }
    }

    /// Playback (or reading) has begun.
    ///
    /// Replaying after completion is allowed and changes nothing.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` before content is ready.
    pub fn begin_playback(&self) -> AppResult<()> {
        match self.status() {
            SessionStatus::Ready => {
                self.state.send_modify(|state| state.status = SessionStatus::Playing);
                debug!("Session playing");
                Ok(())
            }
            SessionStatus::Playing | SessionStatus::Completed => Ok(()),
            _ => Err(self.invalid("begin playback").into()),
        }
    }

    /// The content was consumed to its end, or the user marked it read.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ReadOnlyDay` for a past-day view and
    /// `SessionError::InvalidTransition` before content is ready.
    pub fn mark_content_consumed(&self) -> AppResult<()> {
        let (status, scope) = {
            let state = self.state.borrow();
            (state.status, state.scope)
        };
        match status {
            SessionStatus::Completed | SessionStatus::AwaitingCompletion => Ok(()),
            SessionStatus::Ready | SessionStatus::Playing if scope == SessionScope::PastDay => {
                Err(SessionError::ReadOnlyDay {
                    event: "mark content consumed",
                }
                .into())
            }
            SessionStatus::Ready | SessionStatus::Playing => {
                self.state
                    .send_modify(|state| state.status = SessionStatus::AwaitingCompletion);
                debug!("Session awaiting completion");
                Ok(())
            }
            _ => Err(self.invalid("mark content consumed").into()),
        }
    }

    /// The user read the content without playing it.
    ///
    /// Moves straight from `Ready` to `AwaitingCompletion`, so a rejected call
    /// leaves the state as it was.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::ReadOnlyDay` for a past-day view and
    /// `SessionError::InvalidTransition` before content is ready.
    pub fn mark_read(&self) -> AppResult<()> {
        let _inner = self.lock();
        let (status, scope) = {
            let state = self.state.borrow();
            (state.status, state.scope)
        };
        match (status, scope) {
            (SessionStatus::Completed | SessionStatus::AwaitingCompletion, _) => Ok(()),
            (SessionStatus::Ready | SessionStatus::Playing, SessionScope::PastDay) => {
                Err(SessionError::ReadOnlyDay { event: "mark read" }.into())
            }
            (SessionStatus::Ready | SessionStatus::Playing, SessionScope::Today) => {
                self.state
                    .send_modify(|state| state.status = SessionStatus::AwaitingCompletion);
                debug!("Session marked read");
                Ok(())
            }
            (from, _) => Err(SessionError::InvalidTransition {
                from,
                event: "mark read",
            }
            .into()),
        }
    }

    /// Confirms completion with the server and moves to `Completed`.
    ///
    /// A failed confirmation still completes locally; the session id is kept
    /// and confirmed later by [`on_foreground`](Self::on_foreground).
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidTransition` unless the machine is in
    /// `AwaitingCompletion` with no completion already in flight.
    pub async fn complete(&self) -> AppResult<CompletionOutcome> {
        let (ticket, session_id) = {
            let mut inner = self.lock();
            let state = self.state.borrow();
            let day = match (state.status, state.scope, state.day) {
                (SessionStatus::AwaitingCompletion, SessionScope::Today, Some(day))
                    if !inner.completing =>
                {
                    day
                }
                (_, SessionScope::PastDay, _) => {
                    return Err(SessionError::ReadOnlyDay { event: "complete" }.into())
                }
                (from, _, _) => {
                    return Err(SessionError::InvalidTransition {
                        from,
                        event: "complete",
                    }
                    .into())
                }
            };
            inner.completing = true;
            (
                Ticket {
                    seq: inner.seq,
                    day,
                },
                state.session_id.clone(),
            )
        };

        let result = match &session_id {
            Some(id) => Some(self.api.complete_session(&self.auth_token(), id).await),
            None => None,
        };

        {
            let mut inner = self.lock();
            inner.completing = false;
            if inner.record.day == Some(ticket.day) {
                inner.record.completed = true;
            }
            if let (Some(Err(_)), Some(id)) = (&result, &session_id) {
                inner.record.unconfirmed_session_id = Some(id.clone());
            }
            self.persist(&inner.record);
        }

        let outcome = match result {
            Some(Ok(streak)) => {
                info!("Session for {} confirmed", ticket.day);
                self.apply(ticket, |state| {
                    state.status = SessionStatus::Completed;
                    state.streak = Some(streak);
                });
                CompletionOutcome::Confirmed(streak)
            }
            Some(Err(e)) => {
                let tag = e.failure_tag();
                warn!("Completion for {} unconfirmed ({}): {}", ticket.day, tag, e);
                self.apply(ticket, |state| state.status = SessionStatus::Completed);
                CompletionOutcome::Unconfirmed { tag }
            }
            None => {
                warn!("Completing {} without a session id", ticket.day);
                self.apply(ticket, |state| state.status = SessionStatus::Completed);
                CompletionOutcome::Unconfirmed {
                    tag: FailureTag::Unexpected,
                }
            }
        };
        Ok(outcome)
    }

    /// Retries a pending completion confirmation. Returns whether one was confirmed.
    pub async fn reconcile_pending(&self) -> bool {
        let pending = self.lock().record.unconfirmed_session_id.clone();
        let Some(session_id) = pending else {
            return false;
        };

        match self
            .api
            .complete_session(&self.auth_token(), &session_id)
            .await
        {
            Ok(streak) => {
                info!("Confirmed pending completion of session {}", session_id);
                {
                    let mut inner = self.lock();
                    if inner.record.unconfirmed_session_id.as_deref() == Some(session_id.as_str()) {
                        inner.record.unconfirmed_session_id = None;
                        self.persist(&inner.record);
                    }
                }
                self.state.send_if_modified(|state| {
                    if state.session_id.as_deref() == Some(session_id.as_str()) {
                        state.streak = Some(streak);
                        true
                    } else {
                        false
                    }
                });
                true
            }
            Err(e) => {
                debug!("Session {} still unconfirmed: {}", session_id, e);
                false
            }
        }
    }

    /// Handles the app returning to the foreground.
    ///
    /// If the calendar day changed since today's session was loaded, all
    /// transient state is dropped and today's session is loaded afresh.
    /// A past-day view stays on screen, but the stale completion record is
    /// reset to the new day. Otherwise a pending completion confirmation is
    /// retried.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`load`](Self::load), which cannot occur for a
    /// new day.
    pub async fn on_foreground(&self) -> AppResult<ForegroundOutcome> {
        let today = self.clock.today();
        let (scope, state_day) = {
            let state = self.state.borrow();
            (state.scope, state.day)
        };
        let record_day = self.lock().record.day;
        let last_day = match scope {
            SessionScope::Today => record_day.or(state_day),
            SessionScope::PastDay => record_day,
        };

        match (scope, last_day) {
            (SessionScope::Today, Some(from)) if from != today => {
                info!("Day rolled over from {} to {}", from, today);
                self.load_today(today).await?;
                Ok(ForegroundOutcome::RolledOver { from, to: today })
            }
            (SessionScope::PastDay, Some(from)) if from != today => {
                info!("Day rolled over from {} to {} during a past-day view", from, today);
                {
                    let mut inner = self.lock();
                    inner.record.day = Some(today);
                    inner.record.completed = false;
                    self.persist(&inner.record);
                }
                self.reconcile_pending().await;
                Ok(ForegroundOutcome::RolledOver { from, to: today })
            }
            _ => {
                self.reconcile_pending().await;
                Ok(ForegroundOutcome::Unchanged)
            }
        }
    }

    /// Forgets everything, including the persisted record.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.seq += 1;
        inner.record = SessionRecord::default();
        inner.completing = false;
        self.persister.clear();
        self.state.send_replace(SessionState::default());
        info!("Session state cleared");
    }

    /// Writes any pending snapshot now.
    pub fn flush(&self) {
        self.persister.flush();
    }
}
