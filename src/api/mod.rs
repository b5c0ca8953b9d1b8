//! Contract with the remote content/session API.
//!
//! The engine depends only on the [`ContentApi`] trait. [`HttpContentApi`]
//! implements it over HTTPS with bearer-token authentication; tests drive the
//! state machine through scripted in-process implementations instead.
//!
//! # Module Structure
//!
//! - `http`: reqwest-based client

pub mod http;

pub use http::HttpContentApi;

use crate::clock::CalendarDay;
use crate::errors::ApiError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One scripture passage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reading {
    /// Citation, possibly several joined by `|`.
    pub reference: String,
    pub text: String,
}

impl Reading {
    /// The reference with `|`-separated parts joined by `" & "`.
    ///
    /// # Examples
    ///
    /// ```
    /// use parish::api::Reading;
    ///
    /// let reading = Reading {
    ///     reference: "Malachi 3:1-4 | Hebrews 2:14-18".to_string(),
    ///     text: String::new(),
    /// };
    /// assert_eq!(reading.display_reference(), "Malachi 3:1-4 & Hebrews 2:14-18");
    /// ```
    pub fn display_reference(&self) -> String {
        self.reference_parts().join(" & ")
    }

    /// The individual `|`-separated references, trimmed.
    pub fn reference_parts(&self) -> Vec<&str> {
        self.reference
            .split('|')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .collect()
    }
}

/// Everything needed to present one day's practice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentBundle {
    /// The day the server says this content belongs to.
    #[serde(rename = "date")]
    pub day: CalendarDay,
    pub first_reading: Reading,
    pub gospel: Reading,
    #[serde(default)]
    pub commentary: String,
    #[serde(default, alias = "audioUrl")]
    pub audio_url: Option<String>,
}

impl ContentBundle {
    /// Stable identifier journal entries use to link to this content.
    pub fn content_id(&self) -> String {
        self.day.to_string()
    }
}

/// Result of asking the server to start today's session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartSessionOutcome {
    /// A fresh session was granted.
    Started { session_id: String },
    /// The server already has today's session marked complete.
    AlreadyCompleted,
}

/// Practice streak as counted by the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakSummary {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_sessions: u32,
}

/// One completed session in the user's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub session_id: String,
    #[serde(rename = "date")]
    pub day: CalendarDay,
    pub first_reading_reference: String,
    pub gospel_reference: String,
    pub completed_at: String,
}

/// The signed-in user as known to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    pub created_at: String,
    pub streak: StreakSummary,
}

/// Remote content and session operations.
///
/// Implementations translate every transport failure into an [`ApiError`];
/// an "already completed" start is an `Ok` outcome, never an error.
#[async_trait]
pub trait ContentApi: Send + Sync {
    /// Today's content, as the server defines today.
    async fn today_content(&self, auth_token: &str) -> Result<ContentBundle, ApiError>;

    /// Starts today's session.
    async fn start_session(&self, auth_token: &str) -> Result<StartSessionOutcome, ApiError>;

    /// Content for an arbitrary day, read-only.
    async fn content_for_day(
        &self,
        auth_token: &str,
        day: CalendarDay,
    ) -> Result<ContentBundle, ApiError>;

    /// Marks a session complete. Safe to repeat for the same session.
    async fn complete_session(
        &self,
        auth_token: &str,
        session_id: &str,
    ) -> Result<StreakSummary, ApiError>;

    /// Past completed sessions, newest first.
    async fn history(&self, auth_token: &str) -> Result<Vec<HistoryItem>, ApiError>;

    /// The signed-in user's profile.
    async fn profile(&self, auth_token: &str) -> Result<UserProfile, ApiError>;
}
