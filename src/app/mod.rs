//! The application root that owns one instance of every store.
//!
//! Consumers receive the [`Engine`] (or references to its stores) rather than
//! reaching for globals.

use crate::api::{ContentApi, HttpContentApi};
use crate::clock::{Clock, SystemClock};
use crate::config::{ensure_data_dir, Config};
use crate::errors::AppResult;
use crate::journal::JournalStore;
use crate::playback::NaturalCompletion;
use crate::session::{CompletionOutcome, ForegroundOutcome, SessionMachine};
use crate::settings::{LoggingScheduler, NotificationScheduler, SettingsStore};
use crate::storage::{KeyValueStore, SqliteStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// The practice-continuity engine.
pub struct Engine {
    journal: JournalStore,
    session: SessionMachine,
    settings: SettingsStore,
    api: Arc<dyn ContentApi>,
    auth_token: String,
}

impl Engine {
    /// Wires the stores to the given collaborators.
    pub fn new(
        backend: Arc<dyn KeyValueStore>,
        api: Arc<dyn ContentApi>,
        clock: Arc<dyn Clock>,
        scheduler: Arc<dyn NotificationScheduler>,
        auth_token: impl Into<String>,
        debounce: Duration,
    ) -> Self {
        let auth_token = auth_token.into();
        let journal = JournalStore::open(backend.clone(), clock.clone(), debounce);
        let session = SessionMachine::open(
            backend.clone(),
            api.clone(),
            clock,
            auth_token.clone(),
            debounce,
        );
        let settings = SettingsStore::open(backend, scheduler, debounce);
        Self {
            journal,
            session,
            settings,
            api,
            auth_token,
        }
    }

    /// Builds the engine from configuration: SQLite storage in the data
    /// directory, the HTTP API, and the system clock.
    ///
    /// # Errors
    ///
    /// Returns an error if the data directory or database cannot be opened,
    /// or the HTTP client cannot be built.
    pub fn open(config: &Config) -> AppResult<Self> {
        ensure_data_dir(&config.data_dir)?;
        let backend = Arc::new(SqliteStore::open(&config.database_path())?);
        let api = Arc::new(HttpContentApi::new(
            config.api_url.clone(),
            config.request_timeout,
        )?);
        info!("Engine opened");
        Ok(Self::new(
            backend,
            api,
            Arc::new(SystemClock),
            Arc::new(LoggingScheduler),
            config.auth_token.clone(),
            config.save_debounce,
        ))
    }

    pub fn journal(&self) -> &JournalStore {
        &self.journal
    }

    pub fn session(&self) -> &SessionMachine {
        &self.session
    }

    pub fn settings(&self) -> &SettingsStore {
        &self.settings
    }

    /// The remote API, for read-only queries such as history.
    pub fn api(&self) -> &dyn ContentApi {
        self.api.as_ref()
    }

    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }

    /// Replaces the bearer token after the user signs in again.
    pub fn set_auth_token(&mut self, auth_token: impl Into<String>) {
        self.auth_token = auth_token.into();
        self.session.set_auth_token(self.auth_token.clone());
    }

    /// The app returned to the foreground.
    pub async fn on_foreground(&self) -> AppResult<ForegroundOutcome> {
        self.session.on_foreground().await
    }

    /// Playback started.
    pub fn play(&self) -> AppResult<()> {
        self.session.begin_playback()
    }

    /// The user read the content without audio.
    pub fn mark_read(&self) -> AppResult<()> {
        self.session.mark_read()
    }

    /// Feeds a natural playback completion into the session.
    pub fn on_natural_completion(&self, completion: &NaturalCompletion) -> AppResult<()> {
        debug!("Natural completion of {}", completion.source);
        self.session.mark_content_consumed()
    }

    /// Completes today's session and records the first-session flag.
    pub async fn finish_session(&self) -> AppResult<CompletionOutcome> {
        let outcome = self.session.complete().await?;
        self.settings.mark_first_session_completed();
        Ok(outcome)
    }

    /// Clears session and per-user settings. The journal stays on the device.
    pub async fn sign_out(&mut self) {
        self.session.reset();
        self.settings.sign_out().await;
        self.set_auth_token(String::new());
        info!("Signed out");
    }

    /// Writes every pending snapshot now.
    pub fn flush(&self) {
        self.journal.flush();
        self.session.flush();
        self.settings.flush();
    }
}
