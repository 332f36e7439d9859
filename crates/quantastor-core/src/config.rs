//! Configuration structures for QuantaStor clients.
//!
//! This module provides the validated connection settings for one managed
//! array: endpoint, credentials, TLS policy, and task polling budgets.

use crate::client::RetryPolicy;
use crate::Error;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;
use validator::Validate;

/// Port the QuantaStor management API listens on.
pub const DEFAULT_API_PORT: u16 = 8153;

/// Path prefix of every management API endpoint.
pub const API_PATH: &str = "qstorapi/";

/// Configuration for a QuantaStor client instance.
///
/// TLS certificate verification is on by default. Arrays that still serve
/// their factory self-signed certificate need either `tls_ca_cert` or an
/// explicit `with_tls_verify(false)`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct QuantastorConfig {
    /// Array management hostname or IP address
    #[validate(length(min = 1))]
    pub hostname: String,

    /// Management API port
    #[validate(range(min = 1))]
    #[serde(default = "default_port")]
    pub port: u16,

    /// Management API user
    #[validate(length(min = 1))]
    pub username: String,

    /// Management API password
    #[serde(skip_serializing)]
    pub password: SecretString,

    /// Whether to verify TLS certificates
    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,

    /// Optional path to a PEM CA certificate trusted for the array
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_ca_cert: Option<PathBuf>,

    /// Request timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Status queries issued per task before giving up
    #[validate(range(min = 1, max = 100))]
    #[serde(default = "default_task_poll_attempts")]
    pub task_poll_attempts: u32,

    /// Pause between two status queries in milliseconds
    #[serde(default)]
    pub task_poll_interval_ms: u64,

    /// Total tries of a whole task wait
    #[validate(range(min = 1, max = 10))]
    #[serde(default = "default_task_retry_tries")]
    pub task_retry_tries: u32,

    /// Delay before the first task wait retry in milliseconds
    #[serde(default = "default_task_retry_delay_ms")]
    pub task_retry_delay_ms: u64,

    /// Back-off multiplier for task wait retries
    #[validate(range(min = 1, max = 10))]
    #[serde(default = "default_task_retry_backoff")]
    pub task_retry_backoff: u32,

    /// Pause between a task-creating call and its first status query, in milliseconds
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
}

const fn default_port() -> u16 {
    DEFAULT_API_PORT
}

const fn default_tls_verify() -> bool {
    true
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_task_poll_attempts() -> u32 {
    10
}

const fn default_task_retry_tries() -> u32 {
    6
}

const fn default_task_retry_delay_ms() -> u64 {
    3000
}

const fn default_task_retry_backoff() -> u32 {
    2
}

const fn default_settle_delay_ms() -> u64 {
    2000
}

impl QuantastorConfig {
    /// Create a new client configuration with required parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if validation fails.
    pub fn new(
        hostname: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, Error> {
        let config = Self {
            hostname: hostname.into(),
            port: default_port(),
            username: username.into(),
            password: SecretString::from(password.into()),
            tls_verify: default_tls_verify(),
            tls_ca_cert: None,
            request_timeout_secs: default_request_timeout_secs(),
            task_poll_attempts: default_task_poll_attempts(),
            task_poll_interval_ms: 0,
            task_retry_tries: default_task_retry_tries(),
            task_retry_delay_ms: default_task_retry_delay_ms(),
            task_retry_backoff: default_task_retry_backoff(),
            settle_delay_ms: default_settle_delay_ms(),
        };

        config.validated()
    }

    /// Parse a JSON configuration document and validate it.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be parsed or validation fails.
    pub fn from_json(document: &str) -> Result<Self, Error> {
        let config: Self = serde_json::from_str(document)
            .map_err(|e| Error::ConfigError(format!("Invalid configuration document: {e}")))?;
        config.validated()
    }

    fn validated(self) -> Result<Self, Error> {
        self.validate()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))?;
        Ok(self)
    }

    /// Set the management API port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set whether to verify TLS certificates.
    #[must_use]
    pub const fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Set custom CA certificate path.
    #[must_use]
    pub fn with_ca_cert(mut self, path: PathBuf) -> Self {
        self.tls_ca_cert = Some(path);
        self
    }

    /// Set request timeout in seconds.
    #[must_use]
    pub const fn with_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout_secs = seconds;
        self
    }

    /// Set the number of status queries per task.
    #[must_use]
    pub const fn with_task_poll_attempts(mut self, attempts: u32) -> Self {
        self.task_poll_attempts = attempts;
        self
    }

    /// Set the settle delay in milliseconds.
    #[must_use]
    pub const fn with_settle_delay_ms(mut self, millis: u64) -> Self {
        self.settle_delay_ms = millis;
        self
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Get the settle delay as a Duration.
    #[must_use]
    pub const fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Get the pause between status queries as a Duration.
    #[must_use]
    pub const fn task_poll_interval(&self) -> Duration {
        Duration::from_millis(self.task_poll_interval_ms)
    }

    /// Retry policy applied around a whole task wait.
    #[must_use]
    pub const fn task_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_tries(self.task_retry_tries)
            .with_initial_delay(Duration::from_millis(self.task_retry_delay_ms))
            .with_backoff_multiplier(self.task_retry_backoff)
    }

    /// Build the management API base URL (`https://<host>:<port>/qstorapi/`).
    ///
    /// # Errors
    ///
    /// Returns an error if the hostname does not form a valid URL.
    pub fn base_url(&self) -> Result<Url, Error> {
        Url::parse(&format!("https://{}:{}/{API_PATH}", self.hostname, self.port))
            .map_err(|e| Error::ConfigError(format!("Invalid QuantaStor hostname: {e}")))
    }
}
