//! Error types for the scheduler.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::engine::TriggerHandle;

/// Errors raised by a [`TriggerEngine`](crate::engine::TriggerEngine).
#[derive(Debug, Error)]
pub enum EngineError {
    /// The calendar expression could not be parsed.
    #[error("Invalid cron expression '{expression}': {reason}")]
    InvalidExpression { expression: String, reason: String },

    /// No live entry carries this handle.
    #[error("Unknown trigger handle: {0}")]
    UnknownHandle(TriggerHandle),

    /// Registration was attempted outside a tokio runtime.
    #[error("No tokio runtime available to drive triggers")]
    NoRuntime,
}

/// Errors that can occur while managing tasks.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// A task with this name is already registered.
    #[error("Task already exists: {0}")]
    DuplicateName(String),

    /// No task with this name is registered.
    #[error("Task not found: {0}")]
    UnknownName(String),

    /// The task's expire time has already passed.
    #[error("Task {name} already expired at {}", .expire_time.to_rfc3339())]
    AlreadyExpired {
        name: String,
        expire_time: DateTime<Utc>,
    },

    /// The trigger engine rejected the registration.
    #[error("Failed to register task {name}: {source}")]
    RegistrationFailed {
        name: String,
        #[source]
        source: EngineError,
    },

    /// The trigger engine could not cancel the task's handle.
    #[error("Failed to cancel task {name}: {source}")]
    CancelFailed {
        name: String,
        #[source]
        source: EngineError,
    },

    /// The task's own action returned an error or panicked.
    #[error("Task {name} failed: {message}")]
    ActionFailed { name: String, message: String },

    /// A one-shot task was handed to the batch registration path.
    #[error("Task {0} has no spec; batch registration only accepts recurring tasks")]
    MissingSpec(String),

    /// A batch registration function failed.
    #[error("Registration hook #{index} failed: {message}")]
    HookFailed { index: usize, message: String },
}

/// Result type for scheduler operations.
pub type SchedulerResult<T> = Result<T, SchedulerError>;
