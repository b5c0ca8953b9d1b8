#![allow(dead_code)]

use async_trait::async_trait;
use parish::api::{
    ContentApi, ContentBundle, HistoryItem, Reading, StartSessionOutcome, StreakSummary,
    UserProfile,
};
use parish::errors::ApiError;
use parish::session::SessionMachine;
use parish::storage::MemoryStore;
use parish::{CalendarDay, ManualClock};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub fn day(y: i32, m: u32, d: u32) -> CalendarDay {
    CalendarDay::from_ymd(y, m, d).unwrap()
}

pub fn bundle(day: CalendarDay) -> ContentBundle {
    ContentBundle {
        day,
        first_reading: Reading {
            reference: "Hebrews 2:14-18".to_string(),
            text: "Since the children share in flesh and blood...".to_string(),
        },
        gospel: Reading {
            reference: "Mark 1:29-39".to_string(),
            text: "On leaving the synagogue...".to_string(),
        },
        commentary: String::new(),
        audio_url: None,
    }
}

pub fn started(id: &str) -> StartSessionOutcome {
    StartSessionOutcome::Started {
        session_id: id.to_string(),
    }
}

pub fn streak(current: u32) -> StreakSummary {
    StreakSummary {
        current_streak: current,
        longest_streak: current,
        total_sessions: current,
    }
}

struct Step<T> {
    gate: Option<Arc<Notify>>,
    result: Result<T, ApiError>,
}

fn unscripted<T>(what: &str) -> Result<T, ApiError> {
    Err(ApiError::InvalidResponse(format!("unscripted {} call", what)))
}

/// A `ContentApi` that replays queued responses in call order.
///
/// A gated response is taken off the queue when the call starts and returned
/// only once its `Notify` fires, so tests can hold a request in flight.
#[derive(Default)]
pub struct ScriptedApi {
    today: Mutex<VecDeque<Step<ContentBundle>>>,
    start: Mutex<VecDeque<Step<StartSessionOutcome>>>,
    day_content: Mutex<VecDeque<Step<ContentBundle>>>,
    complete: Mutex<VecDeque<Result<StreakSummary, ApiError>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_today(&self, result: Result<ContentBundle, ApiError>) {
        self.today.lock().unwrap().push_back(Step { gate: None, result });
    }

    pub fn push_today_gated(&self, result: Result<ContentBundle, ApiError>) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.today.lock().unwrap().push_back(Step {
            gate: Some(gate.clone()),
            result,
        });
        gate
    }

    pub fn push_start(&self, result: Result<StartSessionOutcome, ApiError>) {
        self.start.lock().unwrap().push_back(Step { gate: None, result });
    }

    pub fn push_day(&self, result: Result<ContentBundle, ApiError>) {
        self.day_content
            .lock()
            .unwrap()
            .push_back(Step { gate: None, result });
    }

    pub fn push_complete(&self, result: Result<StreakSummary, ApiError>) {
        self.complete.lock().unwrap().push_back(result);
    }

    /// Every call made so far, e.g. `"today"` or `"complete s-1"`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    async fn replay<T>(queue: &Mutex<VecDeque<Step<T>>>, what: &str) -> Result<T, ApiError> {
        let step = queue.lock().unwrap().pop_front();
        match step {
            Some(Step { gate, result }) => {
                if let Some(gate) = gate {
                    gate.notified().await;
                }
                result
            }
            None => unscripted(what),
        }
    }
}

#[async_trait]
impl ContentApi for ScriptedApi {
    async fn today_content(&self, _auth_token: &str) -> Result<ContentBundle, ApiError> {
        self.record("today".to_string());
        Self::replay(&self.today, "today").await
    }

    async fn start_session(&self, _auth_token: &str) -> Result<StartSessionOutcome, ApiError> {
        self.record("start".to_string());
        Self::replay(&self.start, "start").await
    }

    async fn content_for_day(
        &self,
        _auth_token: &str,
        day: CalendarDay,
    ) -> Result<ContentBundle, ApiError> {
        self.record(format!("day {}", day));
        Self::replay(&self.day_content, "day").await
    }

    async fn complete_session(
        &self,
        _auth_token: &str,
        session_id: &str,
    ) -> Result<StreakSummary, ApiError> {
        self.record(format!("complete {}", session_id));
        let result = self.complete.lock().unwrap().pop_front();
        result.unwrap_or_else(|| unscripted("complete"))
    }

    async fn history(&self, _auth_token: &str) -> Result<Vec<HistoryItem>, ApiError> {
        self.record("history".to_string());
        Ok(Vec::new())
    }

    async fn profile(&self, _auth_token: &str) -> Result<UserProfile, ApiError> {
        self.record("profile".to_string());
        unscripted("profile")
    }
}

pub struct Harness {
    pub api: Arc<ScriptedApi>,
    pub clock: Arc<ManualClock>,
    pub backend: Arc<MemoryStore>,
}

impl Harness {
    pub fn at(start: CalendarDay) -> Self {
        Self {
            api: ScriptedApi::new(),
            clock: Arc::new(ManualClock::at_day(start)),
            backend: Arc::new(MemoryStore::new()),
        }
    }

    /// Opens a session machine over the harness's backend, writing through immediately.
    pub fn machine(&self) -> SessionMachine {
        SessionMachine::open(
            self.backend.clone(),
            self.api.clone(),
            self.clock.clone(),
            "test-token",
            Duration::ZERO,
        )
    }
}
