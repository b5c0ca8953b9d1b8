//! User settings, first-run flags, and the bridge to notification scheduling.
//!
//! The store only decides *whether* and *when* a daily reminder should exist;
//! delivering it is the [`NotificationScheduler`]'s job.

use crate::constants::{DEFAULT_REMINDER_HOUR, DEFAULT_REMINDER_MINUTE, SETTINGS_NAMESPACE};
use crate::errors::{AppError, AppResult};
use crate::storage::{load_or_default, KeyValueStore, Persister};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Schedules local notifications on the host platform.
#[async_trait]
pub trait NotificationScheduler: Send + Sync {
    /// Asks the user for permission. Returns whether it is granted.
    async fn request_permission(&self) -> bool;

    /// Replaces any existing reminder with a daily one at `hour:minute`.
    /// Returns a handle, or `None` if scheduling failed.
    async fn schedule_daily(&self, hour: u8, minute: u8) -> Option<String>;

    /// Cancels every scheduled reminder.
    async fn cancel_all(&self);
}

/// Scheduler for hosts without notifications: grants permission and only logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingScheduler;

#[async_trait]
impl NotificationScheduler for LoggingScheduler {
    async fn request_permission(&self) -> bool {
        true
    }

    async fn schedule_daily(&self, hour: u8, minute: u8) -> Option<String> {
        info!("Daily reminder set for {:02}:{:02}", hour, minute);
        Some(format!("daily-{:02}{:02}", hour, minute))
    }

    async fn cancel_all(&self) {
        info!("Daily reminders cancelled");
    }
}

/// The persisted settings record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsState {
    pub daily_reminder_enabled: bool,
    pub reminder_hour: u8,
    pub reminder_minute: u8,
    pub notification_permission_granted: bool,
    pub has_completed_first_session: bool,
    /// Device-level: survives sign-out.
    pub has_seen_welcome: bool,
    pub reminder_prompt_shown: bool,
}

impl Default for SettingsState {
    fn default() -> Self {
        Self {
            daily_reminder_enabled: false,
            reminder_hour: DEFAULT_REMINDER_HOUR,
            reminder_minute: DEFAULT_REMINDER_MINUTE,
            notification_permission_granted: false,
            has_completed_first_session: false,
            has_seen_welcome: false,
            reminder_prompt_shown: false,
        }
    }
}

/// Owner of the settings state.
pub struct SettingsStore {
    scheduler: Arc<dyn NotificationScheduler>,
    state: watch::Sender<SettingsState>,
    persister: Persister<SettingsState>,
}

impl SettingsStore {
    pub fn open(
        backend: Arc<dyn KeyValueStore>,
        scheduler: Arc<dyn NotificationScheduler>,
        debounce: Duration,
    ) -> Self {
        let state: SettingsState = load_or_default(backend.as_ref(), SETTINGS_NAMESPACE);
        let (sender, _) = watch::channel(state);
        Self {
            scheduler,
            state: sender,
            persister: Persister::new(backend, SETTINGS_NAMESPACE, debounce),
        }
    }

    /// A copy of the current state.
    pub fn snapshot(&self) -> SettingsState {
        self.state.borrow().clone()
    }

    /// Receives every future state change.
    pub fn subscribe(&self) -> watch::Receiver<SettingsState> {
        self.state.subscribe()
    }

    fn mutate(&self, mutate: impl FnOnce(&mut SettingsState) -> bool) -> bool {
        let changed = self.state.send_if_modified(mutate);
        if changed {
            self.persister.schedule(&self.state.borrow());
        }
        changed
    }

    fn set_flag(&self, flag: impl FnOnce(&mut SettingsState) -> &mut bool, value: bool) -> bool {
        self.mutate(|state| {
            let slot = flag(state);
            let changed = *slot != value;
            *slot = value;
            changed
        })
    }

    /// Turns the daily reminder on or off. Returns whether it ends up enabled.
    ///
    /// Enabling asks for permission first; without it the reminder stays off.
    pub async fn set_reminder_enabled(&self, enabled: bool) -> bool {
        if !enabled {
            self.scheduler.cancel_all().await;
            self.set_flag(|s| &mut s.daily_reminder_enabled, false);
            info!("Daily reminder disabled");
            return false;
        }

        let granted = self.scheduler.request_permission().await;
        self.set_flag(|s| &mut s.notification_permission_granted, granted);
        if !granted {
            warn!("Notification permission denied, reminder stays off");
            return false;
        }

        let (hour, minute) = self.reminder_time();
        match self.scheduler.schedule_daily(hour, minute).await {
            Some(handle) => debug!("Scheduled reminder {}", handle),
            None => warn!("Scheduler returned no handle for {:02}:{:02}", hour, minute),
        }
        self.set_flag(|s| &mut s.daily_reminder_enabled, true);
        info!("Daily reminder enabled");
        true
    }

    /// Changes the reminder time, rescheduling if the reminder is on.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidInput` if `hour` is not 0-23 or `minute` is not 0-59.
    pub async fn set_reminder_time(&self, hour: u8, minute: u8) -> AppResult<()> {
        if hour > 23 {
            return Err(AppError::InvalidInput(format!(
                "Reminder hour must be 0-23, got {}",
                hour
            )));
        }
        if minute > 59 {
            return Err(AppError::InvalidInput(format!(
                "Reminder minute must be 0-59, got {}",
                minute
            )));
        }

        self.mutate(|state| {
            let changed = state.reminder_hour != hour || state.reminder_minute != minute;
            state.reminder_hour = hour;
            state.reminder_minute = minute;
            changed
        });

        let enabled = self.state.borrow().daily_reminder_enabled;
        if enabled && self.scheduler.schedule_daily(hour, minute).await.is_none() {
            warn!("Rescheduling reminder for {:02}:{:02} failed", hour, minute);
        }
        Ok(())
    }

    /// The configured reminder `(hour, minute)`.
    pub fn reminder_time(&self) -> (u8, u8) {
        let state = self.state.borrow();
        (state.reminder_hour, state.reminder_minute)
    }

    /// Whether the first-session orientation should still be shown.
    pub fn should_show_orientation(&self) -> bool {
        !self.state.borrow().has_completed_first_session
    }

    /// Whether to offer the one-time reminder prompt.
    pub fn should_show_reminder_prompt(&self) -> bool {
        let state = self.state.borrow();
        state.has_completed_first_session
            && !state.daily_reminder_enabled
            && !state.reminder_prompt_shown
    }

    /// The user accepted the reminder prompt.
    pub async fn accept_reminder_prompt(&self) -> bool {
        self.set_flag(|s| &mut s.reminder_prompt_shown, true);
        self.set_reminder_enabled(true).await
    }

    /// The user dismissed the reminder prompt; it is not offered again.
    pub fn dismiss_reminder_prompt(&self) {
        self.set_flag(|s| &mut s.reminder_prompt_shown, true);
    }

    pub fn mark_welcome_seen(&self) {
        self.set_flag(|s| &mut s.has_seen_welcome, true);
    }

    pub fn mark_first_session_completed(&self) {
        if self.set_flag(|s| &mut s.has_completed_first_session, true) {
            info!("First session completed");
        }
    }

    /// Clears per-user settings and reminders. `has_seen_welcome` is kept.
    pub async fn sign_out(&self) {
        self.scheduler.cancel_all().await;
        self.mutate(|state| {
            let cleared = SettingsState {
                has_seen_welcome: state.has_seen_welcome,
                ..SettingsState::default()
            };
            let changed = *state != cleared;
            *state = cleared;
            changed
        });
        info!("Settings cleared for sign-out");
    }

    /// Writes any pending snapshot now.
    pub fn flush(&self) {
        self.persister.flush();
    }
}
