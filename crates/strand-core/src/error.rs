use thiserror::Error;

use crate::domain::QueueId;

/// Synchronous, caller-facing errors.
///
/// These are reported directly by the offending call (`dispatch`, `with`,
/// `destroy`, ...). Failures inside a job body never surface here; they are
/// contained in the job's lifecycle as [`JobError`].
#[derive(Debug, Error)]
pub enum StrandError {
    #[error("queue {0} is destroyed")]
    QueueDestroyed(QueueId),

    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    #[error("payload not serializable: {0}")]
    NotSerializable(#[from] serde_json::Error),
}

/// A failure captured from a job body.
///
/// Cloneable on purpose: the value is both delivered to the `error` callback
/// and retained on the job for later queries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    /// The body returned an error.
    #[error("{0}")]
    Failed(String),

    /// The body panicked; the payload is captured as a message.
    #[error("job panicked: {0}")]
    Panicked(String),

    /// An exports write was rejected at the serialization boundary.
    #[error("export not serializable: {0}")]
    NotSerializable(String),
}

impl JobError {
    pub fn failed(message: impl Into<String>) -> Self {
        JobError::Failed(message.into())
    }

    /// The human-readable message, regardless of variant.
    pub fn message(&self) -> &str {
        match self {
            JobError::Failed(m) | JobError::Panicked(m) | JobError::NotSerializable(m) => m,
        }
    }
}

impl From<String> for JobError {
    fn from(message: String) -> Self {
        JobError::Failed(message)
    }
}

impl From<&str> for JobError {
    fn from(message: &str) -> Self {
        JobError::Failed(message.to_string())
    }
}
