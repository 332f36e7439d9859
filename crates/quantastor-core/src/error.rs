//! Error types for QuantaStor operations.
//!
//! Every failure a client can observe maps to one variant, so callers can branch
//! on the failure category instead of parsing message text.

use thiserror::Error;

/// Message fragments of `RestError`s that report an access failure.
const ACCESS_DENIED_MARKERS: &[&str] = &[
    "permission",
    "denied",
    "not authorized",
    "unauthorized",
    "forbidden",
    "authentication",
];

/// Main error type for QuantaStor operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The array answered with a non-success HTTP status.
    #[error("Request to `{endpoint}` with payload '{payload}' failed with status code {status}")]
    Transport {
        /// API endpoint that was called
        endpoint: String,
        /// Summary of the query payload
        payload: String,
        /// HTTP status code returned by the array
        status: u16,
    },

    /// The array reported a logical error inside a successful HTTP response.
    #[error("Request to `{endpoint}` with payload '{payload}' returned RestError: {message}")]
    Api {
        /// API endpoint that was called
        endpoint: String,
        /// Summary of the query payload
        payload: String,
        /// Error message reported by the array
        message: String,
    },

    /// A response was missing fields required to build a domain record.
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// An asynchronous call did not return a task reference.
    #[error("Task object not found in response: {0}")]
    MissingTask(String),

    /// The array reported the task as failed.
    #[error("Task '{task_id}' failed with error ({description})")]
    TaskFailed {
        /// Identifier of the failed task
        task_id: String,
        /// Description reported by the array
        description: String,
    },

    /// The array reported the task as cancelled.
    #[error("Task '{task_id}' cancelled at state ({description})")]
    TaskCancelled {
        /// Identifier of the cancelled task
        task_id: String,
        /// Description reported by the array
        description: String,
    },

    /// The task did not reach a terminal state within the polling budget.
    #[error("Task '{task_id}' did not complete after {attempts} status queries")]
    TaskTimeout {
        /// Identifier of the unfinished task
        task_id: String,
        /// Number of status queries issued
        attempts: u32,
    },

    /// The request never produced an HTTP response (connection, TLS, IO).
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// The request exceeded the configured timeout.
    #[error("Request timed out: {0}")]
    Timeout(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid endpoint
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

/// Specialized result type for QuantaStor operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Returns the error code for this error type.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "TRANSPORT_ERROR",
            Self::Api { .. } => "API_ERROR",
            Self::MalformedResponse(_) => "MALFORMED_RESPONSE",
            Self::MissingTask(_) => "MISSING_TASK",
            Self::TaskFailed { .. } => "TASK_FAILED",
            Self::TaskCancelled { .. } => "TASK_CANCELLED",
            Self::TaskTimeout { .. } => "TASK_TIMEOUT",
            Self::Http(_) => "HTTP_ERROR",
            Self::Timeout(_) => "TIMEOUT",
            Self::ConfigError(_) => "CONFIG_ERROR",
            Self::InvalidEndpoint(_) => "INVALID_ENDPOINT",
        }
    }

    /// Returns true if another attempt at the same operation may succeed.
    ///
    /// Terminal task outcomes are stable on the array and parsing mismatches
    /// do not change between attempts, so neither is retryable.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. }
                | Self::Api { .. }
                | Self::Http(_)
                | Self::Timeout(_)
                | Self::TaskTimeout { .. }
        )
    }

    /// Returns true if this error means "no such object" to a lookup.
    ///
    /// The array reports a missing object with a `RestError` whose wording
    /// varies by endpoint, so any [`Error::Api`] counts, except messages that
    /// report an access or authorization failure.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Api { message, .. } => {
                let message = message.to_ascii_lowercase();
                !ACCESS_DENIED_MARKERS
                    .iter()
                    .any(|marker| message.contains(marker))
            }
            _ => false,
        }
    }

    /// Returns the task identifier carried by task outcome errors.
    #[must_use]
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::TaskFailed { task_id, .. }
            | Self::TaskCancelled { task_id, .. }
            | Self::TaskTimeout { task_id, .. } => Some(task_id),
            _ => None,
        }
    }
}

// Conversions from external error types
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout(err.to_string())
        } else {
            Self::Http(err.to_string())
        }
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidEndpoint(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedResponse(err.to_string())
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::ConfigError(err.to_string())
    }
}
