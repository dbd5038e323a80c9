//! Outcome model: how a finished job is recorded.
//!
//! This module does not assume queues or lanes; it only defines the shape of
//! a terminal result.

use crate::boundary::Payload;
use crate::error::JobError;

/// The terminal result of a job, as an explicit tagged sum.
///
/// Output and failure can never coexist: a job ends as exactly one of
/// success-with-payload, failure-with-error, or cancelled-before-running.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    /// The body returned normally; carries the materialized exports.
    Success(Payload),

    /// The body failed or panicked; carries the captured error.
    Failure(JobError),

    /// The job was removed from its queue before it ever ran.
    Cancelled,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Success(_))
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, JobOutcome::Failure(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, JobOutcome::Cancelled)
    }

    /// The output payload, present only on success.
    pub fn output(&self) -> Option<&Payload> {
        match self {
            JobOutcome::Success(payload) => Some(payload),
            _ => None,
        }
    }

    /// The captured error, present only on failure.
    pub fn error(&self) -> Option<&JobError> {
        match self {
            JobOutcome::Failure(error) => Some(error),
            _ => None,
        }
    }
}
