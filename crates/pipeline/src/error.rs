use genbroker_core::error::CoreError;
use genbroker_core::ports::{BlobError, CollaboratorError, StoreError};
use genbroker_providers::AdapterError;

/// Errors surfaced synchronously to the caller of [`crate::Broker`].
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Admission failures of the bounded job queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("Job queue is full")]
    Full,

    #[error("Job queue is shut down")]
    Closed,
}

/// Why a claimed job ended in `failed`. The display text becomes the job's
/// `error_message`.
#[derive(Debug, thiserror::Error)]
pub enum JobFailure {
    /// Source URL, references, prompt, or settings could not be resolved.
    #[error("{0}")]
    Resolution(String),

    #[error("{0}")]
    Adapter(#[from] AdapterError),

    #[error("provider reported failure: {0}")]
    PollFailed(String),

    #[error("provider did not finish after {attempts} status checks")]
    PollTimeout { attempts: u32 },

    #[error("persisting artifact failed: {0}")]
    Persistence(String),
}

impl JobFailure {
    /// Failure class logged as a structured field.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Resolution(_) => "resolution",
            Self::Adapter(_) => "adapter",
            Self::PollFailed(_) => "poll_failed",
            Self::PollTimeout { .. } => "poll_timeout",
            Self::Persistence(_) => "persistence",
        }
    }
}

impl From<CollaboratorError> for JobFailure {
    fn from(err: CollaboratorError) -> Self {
        Self::Resolution(err.to_string())
    }
}

impl From<StoreError> for JobFailure {
    fn from(err: StoreError) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<BlobError> for JobFailure {
    fn from(err: BlobError) -> Self {
        Self::Persistence(err.to_string())
    }
}
