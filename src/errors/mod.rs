//! Error handling utilities for the parish application.
//!
//! This module provides the central error type `AppError` which represents all
//! possible error conditions that might occur in the application, the
//! domain-specific error enums it wraps, and the convenience type alias
//! `AppResult` for functions that can return these errors.
//!
//! Low-level failures (HTTP transport, SQLite, JSON) are translated into these
//! types at the edge of the engine. The session state machine further reduces
//! API failures to a [`FailureTag`] that a UI can act on.

use crate::session::SessionStatus;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;

/// User-facing classification of a failed network interaction.
///
/// # Examples
///
/// ```
/// use parish::errors::FailureTag;
///
/// assert!(FailureTag::Offline.is_retryable());
/// assert!(!FailureTag::NotAvailable.is_retryable());
/// assert!(!FailureTag::AuthExpired.is_retryable());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureTag {
    /// No connectivity, timeout, or a transient server failure.
    Offline,
    /// The bearer token was rejected; the user has to sign in again.
    AuthExpired,
    /// No content exists for the requested day.
    NotAvailable,
    /// Anything else, such as an undecodable response.
    Unexpected,
}

impl FailureTag {
    /// Whether simply repeating the same call may succeed.
    pub fn is_retryable(self) -> bool {
        matches!(self, FailureTag::Offline | FailureTag::Unexpected)
    }

    /// Stable short name, suitable for logs and CLI output.
    pub fn as_str(self) -> &'static str {
        match self {
            FailureTag::Offline => "offline",
            FailureTag::AuthExpired => "auth_expired",
            FailureTag::NotAvailable => "not_available",
            FailureTag::Unexpected => "unexpected",
        }
    }
}

impl fmt::Display for FailureTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Represents specific error cases that can occur when calling the content API.
///
/// A 409 on start-session is deliberately absent: it is a successful
/// "already completed" outcome, not an error.
///
/// # Examples
///
/// ```
/// use parish::errors::{ApiError, FailureTag};
///
/// let error = ApiError::Unauthorized;
/// assert_eq!(error.failure_tag(), FailureTag::AuthExpired);
/// assert!(format!("{}", error).contains("sign in"));
/// ```
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server could not be reached.
    #[error("Content API unreachable: {0}. Check your connection and try again.")]
    Network(#[source] reqwest::Error),

    /// The request did not complete within the configured timeout.
    #[error("Content API request timed out after {seconds}s")]
    Timeout {
        /// The timeout that elapsed
        seconds: u64,
    },

    /// The bearer token is missing, expired or revoked (HTTP 401).
    #[error("Authentication expired. Please sign in again.")]
    Unauthorized,

    /// The requested resource does not exist (HTTP 404).
    #[error("Not available: {0}")]
    NotFound(String),

    /// Any other non-success status.
    #[error("Content API returned HTTP {status}: {body}")]
    Server {
        /// The HTTP status code
        status: u16,
        /// The response body, if any
        body: String,
    },

    /// The server answered with a body we could not decode.
    #[error("Invalid response from content API: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    /// Maps this error onto the user-facing failure taxonomy.
    pub fn failure_tag(&self) -> FailureTag {
        match self {
            ApiError::Network(_) | ApiError::Timeout { .. } => FailureTag::Offline,
            ApiError::Unauthorized => FailureTag::AuthExpired,
            ApiError::NotFound(_) => FailureTag::NotAvailable,
            ApiError::Server { status, .. } if *status >= 500 => FailureTag::Offline,
            ApiError::Server { .. } | ApiError::InvalidResponse(_) => FailureTag::Unexpected,
        }
    }
}

/// Represents errors raised by a durable storage backend.
///
/// These never reach the UI: stores log them and carry on with their
/// in-memory state.
#[derive(Debug, Error)]
pub enum StorageError {
    /// SQLite database error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A persisted record could not be serialised or parsed.
    #[error("Malformed record in namespace '{namespace}': {source}")]
    Malformed {
        /// The namespace of the record
        namespace: String,
        /// The underlying JSON error
        #[source]
        source: serde_json::Error,
    },

    /// The backend refused the write for another reason.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Represents errors raised by the daily session state machine.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    /// The requested event is not valid in the current state.
    #[error("Cannot {event} while session is {from}")]
    InvalidTransition {
        /// The state the machine was in
        from: SessionStatus,
        /// The rejected event
        event: &'static str,
    },

    /// The operation only applies to today's session, not a past-day view.
    #[error("Cannot {event} while viewing a past day")]
    ReadOnlyDay {
        /// The rejected event
        event: &'static str,
    },
}

/// Represents errors raised by the playback transport.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlaybackError {
    /// A command was issued before any source was loaded.
    #[error("No audio source loaded")]
    NotLoaded,

    /// The external transport rejected a command.
    #[error("Audio transport error: {0}")]
    Transport(String),
}

/// Represents all possible errors that can occur in the parish application.
///
/// # Examples
///
/// Creating a configuration error:
/// ```
/// use parish::errors::AppError;
///
/// let error = AppError::Config("Missing data directory".to_string());
/// assert_eq!(format!("{}", error), "Configuration error: Missing data directory");
/// ```
#[derive(Debug, Error)]
pub enum AppError {
    /// Errors related to configuration loading or validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input/output errors from filesystem operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Caller supplied a value outside the accepted range.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Errors from the durable storage backend.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Errors from the remote content/session API.
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// A remote operation failed and was reduced to its failure tag.
    #[error("Request failed ({tag}): {message}")]
    Remote {
        /// The user-facing classification
        tag: FailureTag,
        /// Human-readable detail
        message: String,
    },

    /// Rejected session state machine events.
    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    /// Errors from the audio transport.
    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),
}

impl AppError {
    /// Reduces an API error to its failure tag and message.
    pub fn remote(error: &ApiError) -> Self {
        AppError::Remote {
            tag: error.failure_tag(),
            message: error.to_string(),
        }
    }
}

/// A type alias for `Result<T, AppError>` to simplify function signatures.
pub type AppResult<T> = Result<T, AppError>;
