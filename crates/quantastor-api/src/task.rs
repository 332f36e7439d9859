//! Polling of array-side asynchronous tasks.
//!
//! Mutating calls answer with a `task` reference. [`TaskPoller::wait_on_task`]
//! queries `taskGet` until the task completes, fails, or is cancelled, and
//! returns the task's `customId`, which identifies the object it produced.

use crate::models::unwrap_envelope;
use crate::transport::Transport;
use crate::Result;
use quantastor_core::config::QuantastorConfig;
use quantastor_core::{retry, Error, QueryParams, RetryPolicy};
use serde_json::Value;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::debug;

/// Default number of status queries per poll cycle.
pub const DEFAULT_POLL_ATTEMPTS: u32 = 10;

/// Endpoint returning the status of one task.
pub const TASK_STATUS_ENDPOINT: &str = "taskGet";

const TASK_STATE_KEY: &str = "taskState";

/// Lifecycle state of an array task, decoded from its wire integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Queued, not yet started (1).
    Pending,
    /// Executing (2).
    Running,
    /// Finished unsuccessfully (3).
    Failed,
    /// Cancelled before finishing (4).
    Cancelled,
    /// Finished successfully (5).
    Completed,
    /// Any other code; treated as still in progress.
    Other(i64),
}

impl TaskState {
    /// Decode a wire state code.
    #[must_use]
    pub const fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Pending,
            2 => Self::Running,
            3 => Self::Failed,
            4 => Self::Cancelled,
            5 => Self::Completed,
            other => Self::Other(other),
        }
    }

    /// Wire code of this state.
    #[must_use]
    pub const fn code(&self) -> i64 {
        match self {
            Self::Pending => 1,
            Self::Running => 2,
            Self::Failed => 3,
            Self::Cancelled => 4,
            Self::Completed => 5,
            Self::Other(code) => *code,
        }
    }

    /// Returns true for completed, failed and cancelled tasks.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Failed | Self::Cancelled | Self::Completed)
    }
}

/// Extract the task id an asynchronous call answered with.
///
/// The id may arrive as a string or a number.
#[must_use]
pub fn task_id(response: &Value) -> Option<String> {
    response
        .get("task")
        .and_then(|task| task.get("id"))
        .and_then(scalar_to_string)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) if !text.is_empty() => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    }
}

/// Task status fields live at the top level; `obj` is only consulted when
/// the top level has no `taskState`.
fn status_body(response: &Value) -> &Value {
    if response.get(TASK_STATE_KEY).is_some() {
        response
    } else {
        unwrap_envelope(response, TASK_STATE_KEY)
    }
}

fn state_of(status: &Value) -> Option<TaskState> {
    let raw = status.get(TASK_STATE_KEY)?;
    raw.as_i64()
        .or_else(|| raw.as_str().and_then(|text| text.trim().parse().ok()))
        .map(TaskState::from_code)
}

fn description_of(status: &Value) -> String {
    status
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Drives array tasks to a terminal state.
///
/// A poll cycle issues at most `max_attempts` status queries. The whole cycle
/// runs under `retry`, so a transport failure mid-cycle restarts polling from
/// the same task id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskPoller {
    max_attempts: u32,
    poll_interval: Duration,
    retry: RetryPolicy,
    deadline: Option<Duration>,
}

impl TaskPoller {
    /// Create a poller with the default budgets.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_attempts: DEFAULT_POLL_ATTEMPTS,
            poll_interval: Duration::from_millis(0),
            retry: RetryPolicy::new(),
            deadline: None,
        }
    }

    /// Create a poller from the array configuration.
    #[must_use]
    pub const fn from_config(config: &QuantastorConfig) -> Self {
        Self {
            max_attempts: config.task_poll_attempts,
            poll_interval: config.task_poll_interval(),
            retry: config.task_retry_policy(),
            deadline: None,
        }
    }

    /// Set the number of status queries per poll cycle.
    #[must_use]
    pub const fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Pause between two status queries.
    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Override the retry policy around whole poll cycles.
    #[must_use]
    pub const fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Bound the total wait, retries included.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Status queries per poll cycle.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait for the task referenced by `initial_response` and return its `customId`.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingTask`] if the response has no `task.id`; no query is sent.
    /// - [`Error::TaskFailed`] / [`Error::TaskCancelled`] on those terminal states.
    /// - [`Error::TaskTimeout`] when the attempt budget or deadline runs out.
    /// - Transport errors of the last poll cycle.
    pub async fn wait_on_task(
        &self,
        transport: &dyn Transport,
        initial_response: &Value,
    ) -> Result<String> {
        let task_id = task_id(initial_response)
            .ok_or_else(|| Error::MissingTask(initial_response.to_string()))?;
        let queries = AtomicU32::new(0);

        let cycles = retry(&self.retry, Error::is_retryable, || {
            self.poll_cycle(transport, &task_id, &queries)
        });

        match self.deadline {
            None => cycles.await,
            Some(limit) => match timeout(limit, cycles).await {
                Ok(outcome) => outcome,
                Err(_) => Err(Error::TaskTimeout {
                    task_id: task_id.clone(),
                    attempts: queries.load(Ordering::Relaxed),
                }),
            },
        }
    }

    async fn poll_cycle(
        &self,
        transport: &dyn Transport,
        task_id: &str,
        queries: &AtomicU32,
    ) -> Result<String> {
        let params = QueryParams::new().with("id", task_id);

        for attempt in 1..=self.max_attempts {
            if attempt > 1 && !self.poll_interval.is_zero() {
                sleep(self.poll_interval).await;
            }

            queries.fetch_add(1, Ordering::Relaxed);
            let response = transport.call(TASK_STATUS_ENDPOINT, &params).await?;
            let status = status_body(&response);

            let Some(state) = state_of(status) else {
                debug!(task_id, attempt, "Task has no state yet");
                continue;
            };

            match state {
                TaskState::Completed => {
                    return status
                        .get("customId")
                        .and_then(scalar_to_string)
                        .ok_or_else(|| {
                            Error::MalformedResponse(format!(
                                "Task '{task_id}' completed without a customId"
                            ))
                        });
                }
                TaskState::Cancelled => {
                    return Err(Error::TaskCancelled {
                        task_id: task_id.to_string(),
                        description: description_of(status),
                    });
                }
                TaskState::Failed => {
                    return Err(Error::TaskFailed {
                        task_id: task_id.to_string(),
                        description: description_of(status),
                    });
                }
                in_progress => {
                    debug!(task_id, attempt, state = in_progress.code(), "Task in progress");
                }
            }
        }

        Err(Error::TaskTimeout {
            task_id: task_id.to_string(),
            attempts: self.max_attempts,
        })
    }
}

impl Default for TaskPoller {
    fn default() -> Self {
        Self::new()
    }
}
