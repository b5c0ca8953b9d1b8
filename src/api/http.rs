//! HTTP client for the content/session API.
//!
//! Status codes are mapped onto [`ApiError`] here, at the edge: 401 becomes
//! `Unauthorized`, 404 becomes `NotFound`, and 409 on start-session becomes
//! [`StartSessionOutcome::AlreadyCompleted`].

use super::{
    ContentApi, ContentBundle, HistoryItem, StartSessionOutcome, StreakSummary, UserProfile,
};
use crate::clock::CalendarDay;
use crate::constants::{
    API_PATH_HISTORY, API_PATH_READINGS, API_PATH_SESSION_COMPLETE, API_PATH_SESSION_START,
    API_PATH_TODAY, API_PATH_USER,
};
use crate::errors::ApiError;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Response body of start-session.
#[derive(Debug, Deserialize)]
struct SessionStartResponse {
    session_id: Option<String>,
    #[serde(default)]
    already_completed: bool,
}

/// Request body of complete-session.
#[derive(Debug, Serialize)]
struct SessionCompleteRequest<'a> {
    session_id: &'a str,
}

/// Response body of complete-session.
#[derive(Debug, Deserialize)]
struct SessionCompleteResponse {
    #[serde(default)]
    streak: StreakSummary,
}

/// Response body of history.
#[derive(Debug, Deserialize)]
struct HistoryResponse {
    sessions: Vec<HistoryItem>,
}

/// reqwest-backed [`ContentApi`].
pub struct HttpContentApi {
    base_url: String,
    client: Client,
    timeout: Duration,
}

impl HttpContentApi {
    /// Creates a client for the API rooted at `base_url`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the API (e.g., "https://example.com/api")
    /// * `timeout` - Per-request timeout
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ApiError::Network)?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, request: RequestBuilder, auth_token: &str) -> Result<Response, ApiError> {
        request
            .bearer_auth(auth_token)
            .send()
            .await
            .map_err(|e| self.transport_error(e))
    }

    fn transport_error(&self, error: reqwest::Error) -> ApiError {
        if error.is_timeout() {
            ApiError::Timeout {
                seconds: self.timeout.as_secs(),
            }
        } else {
            ApiError::Network(error)
        }
    }

    /// Fails on any non-success status, mapping 401 and 404.
    async fn check_status(&self, response: Response, what: &str) -> Result<Response, ApiError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        debug!("{} failed with HTTP {}", what, status);
        Err(match status {
            StatusCode::UNAUTHORIZED => ApiError::Unauthorized,
            StatusCode::NOT_FOUND => ApiError::NotFound(what.to_string()),
            _ => ApiError::Server {
                status: status.as_u16(),
                body,
            },
        })
    }

    async fn decode<T: DeserializeOwned>(&self, response: Response, what: &str) -> Result<T, ApiError> {
        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse {}: {}", what, e)))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        auth_token: &str,
        what: &str,
    ) -> Result<T, ApiError> {
        let response = self.send(self.client.get(self.url(path)), auth_token).await?;
        let response = self.check_status(response, what).await?;
        self.decode(response, what).await
    }
}

#[async_trait]
impl ContentApi for HttpContentApi {
    async fn today_content(&self, auth_token: &str) -> Result<ContentBundle, ApiError> {
        debug!("Fetching today's content");
        self.get_json(API_PATH_TODAY, auth_token, "today's readings")
            .await
    }

    async fn start_session(&self, auth_token: &str) -> Result<StartSessionOutcome, ApiError> {
        debug!("Starting session");
        let response = self
            .send(self.client.post(self.url(API_PATH_SESSION_START)), auth_token)
            .await?;

        if response.status() == StatusCode::CONFLICT {
            debug!("Session already completed for today (HTTP 409)");
            return Ok(StartSessionOutcome::AlreadyCompleted);
        }

        let response = self.check_status(response, "session start").await?;
        let body: SessionStartResponse = self.decode(response, "session start").await?;
        match (body.already_completed, body.session_id) {
            (true, _) => Ok(StartSessionOutcome::AlreadyCompleted),
            (false, Some(session_id)) if !session_id.is_empty() => {
                Ok(StartSessionOutcome::Started { session_id })
            }
            (false, _) => Err(ApiError::InvalidResponse(
                "session start returned no session id".to_string(),
            )),
        }
    }

    async fn content_for_day(
        &self,
        auth_token: &str,
        day: CalendarDay,
    ) -> Result<ContentBundle, ApiError> {
        debug!("Fetching content for {}", day);
        let path = format!("{}/{}", API_PATH_READINGS, day);
        self.get_json(&path, auth_token, &format!("readings for {}", day))
            .await
    }

    async fn complete_session(
        &self,
        auth_token: &str,
        session_id: &str,
    ) -> Result<StreakSummary, ApiError> {
        debug!("Completing session {}", session_id);
        let request = self
            .client
            .post(self.url(API_PATH_SESSION_COMPLETE))
            .json(&SessionCompleteRequest { session_id });
        let response = self.send(request, auth_token).await?;
        let response = self.check_status(response, "session completion").await?;
        let body: SessionCompleteResponse = self.decode(response, "session completion").await?;
        Ok(body.streak)
    }

    async fn history(&self, auth_token: &str) -> Result<Vec<HistoryItem>, ApiError> {
        let body: HistoryResponse = self
            .get_json(API_PATH_HISTORY, auth_token, "history")
            .await?;
        Ok(body.sessions)
    }

    async fn profile(&self, auth_token: &str) -> Result<UserProfile, ApiError> {
        self.get_json(API_PATH_USER, auth_token, "user profile").await
    }
}
