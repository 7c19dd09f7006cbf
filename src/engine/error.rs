// src/engine/error.rs

use thiserror::Error;

use crate::repository::StoreError;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session has terminated")]
    Terminated,

    #[error("a submission is already in flight")]
    SubmissionInFlight,

    #[error("cannot {action} while {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: &'static str,
    },

    #[error("question index {index} is outside 0..{count}")]
    InvalidQuestion { index: usize, count: usize },

    #[error("test has no active questions")]
    EmptyQuestionSet,

    /// Only returned when the caller asked for a save explicitly.
    /// Background saves log and publish instead.
    #[error("progress could not be saved: {0}")]
    Persistence(StoreError),

    /// Retryable. Answers remain in memory.
    #[error("submission failed: {0}")]
    Submission(StoreError),
}
