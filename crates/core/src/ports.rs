//! Port traits for the collaborators the pipeline drives.
//!
//! The durable store, blob store, and the opaque external capabilities
//! (reference lookup, prompt writing, playable-URL resolution) are consumed
//! through these traits so production adapters and test fakes are
//! interchangeable.

use async_trait::async_trait;

use crate::artifact::Artifact;
use crate::job::{Job, JobStatus};
use crate::reference::ReferenceImage;
use crate::types::{ArtifactId, JobId, Timestamp};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Durable store failure.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A unique index rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A stored row could not be mapped back into a domain record.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// The store could not be reached or the statement failed.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Blob store or media download failure.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Upload failed: {0}")]
    Upload(String),

    #[error("Download failed ({status}): {message}")]
    Download { status: u16, message: String },

    #[error("Download request failed: {0}")]
    Request(String),
}

/// Failure of an opaque external capability (reference lookup, prompt
/// writing, URL resolution).
#[derive(Debug, thiserror::Error)]
#[error("{capability} failed: {message}")]
pub struct CollaboratorError {
    pub capability: &'static str,
    pub message: String,
}

impl CollaboratorError {
    pub fn new(capability: &'static str, message: impl Into<String>) -> Self {
        Self {
            capability,
            message: message.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Durable store
// ---------------------------------------------------------------------------

/// The `jobs` table.
///
/// Transition methods are conditional single-row updates: they move the row
/// only from an allowed predecessor status and report whether it moved.
#[async_trait]
pub trait JobStore: Send + Sync {
    async fn insert(&self, job: &Job) -> Result<(), StoreError>;

    async fn find(&self, id: JobId) -> Result<Option<Job>, StoreError>;

    /// Oldest first.
    async fn list_by_status(&self, status: JobStatus, limit: i64) -> Result<Vec<Job>, StoreError> {
        self.list_by_status_after(status, None, limit).await
    }

    /// Oldest first, starting strictly after `after`. Pass the cursor of the
    /// last job of one page to fetch the next.
    async fn list_by_status_after(
        &self,
        status: JobStatus,
        after: Option<JobCursor>,
        limit: i64,
    ) -> Result<Vec<Job>, StoreError>;

    /// `pending -> processing`. Acts as the in-progress marker: only one
    /// caller can win it for a given job.
    async fn mark_processing(&self, id: JobId, at: Timestamp) -> Result<bool, StoreError>;

    /// `processing -> completed` with the artifact backlink.
    async fn mark_completed(
        &self,
        id: JobId,
        artifact_id: ArtifactId,
        at: Timestamp,
    ) -> Result<bool, StoreError>;

    /// `processing -> failed` with the error message.
    async fn mark_failed(&self, id: JobId, error: &str, at: Timestamp) -> Result<bool, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

/// Position in the `(created_at, id)` order of a status listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobCursor {
    pub created_at: Timestamp,
    pub id: JobId,
}

impl JobCursor {
    pub fn of(job: &Job) -> Self {
        Self {
            created_at: job.created_at,
            id: job.id,
        }
    }
}

/// The `media_generations` table, unique on `job_id`.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Fails with [`StoreError::Conflict`] if the job already has one.
    async fn insert(&self, artifact: &Artifact) -> Result<(), StoreError>;

    async fn find(&self, id: ArtifactId) -> Result<Option<Artifact>, StoreError>;

    async fn find_by_job(&self, job_id: JobId) -> Result<Option<Artifact>, StoreError>;
}

// ---------------------------------------------------------------------------
// Blob storage
// ---------------------------------------------------------------------------

/// Durable object storage for produced media.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` at `path` and return the public URL.
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, BlobError>;

    /// Whether `url` already points into this store.
    fn owns(&self, url: &str) -> bool;
}

/// Downloaded media and its reported content type.
#[derive(Debug, Clone)]
pub struct FetchedMedia {
    pub bytes: Vec<u8>,
    pub content_type: Option<String>,
}

/// Downloads provider output from wherever the provider left it.
#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedMedia, BlobError>;
}

// ---------------------------------------------------------------------------
// External capabilities
// ---------------------------------------------------------------------------

/// Persona reference assets (face/body images).
#[async_trait]
pub trait ReferenceResolver: Send + Sync {
    async fn resolve(&self, persona_id: &str) -> Result<Vec<ReferenceImage>, CollaboratorError>;
}

/// Produces the prompt text sent to the provider.
#[async_trait]
pub trait PromptWriter: Send + Sync {
    async fn write_prompt(&self, job: &Job) -> Result<String, CollaboratorError>;
}

/// Turns a platform page URL into a directly playable/downloadable URL.
#[async_trait]
pub trait SourceResolver: Send + Sync {
    async fn resolve(&self, platform: &str, url: &str) -> Result<String, CollaboratorError>;
}
