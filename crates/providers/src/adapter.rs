//! The adapter contract shared by every provider integration.

use std::time::Duration;

use async_trait::async_trait;
use genbroker_core::job::MediaMode;
use genbroker_core::provider::ProviderId;
use genbroker_core::reference::{first_with_role, ReferenceImage, ReferenceRole};
use genbroker_core::settings::GenerationSettings;

/// Poll cadence and attempt budget for one provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollPolicy {
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }
}

/// Everything an adapter needs to submit one generation.
#[derive(Debug, Clone)]
pub struct AdapterRequest {
    pub mode: MediaMode,
    /// Directly fetchable source image or video.
    pub source_url: String,
    pub references: Vec<ReferenceImage>,
    pub prompt: String,
    /// Normalized framing, `None` for the adapter default.
    pub shot_type: Option<String>,
    pub settings: serde_json::Value,
}

impl AdapterRequest {
    pub fn settings(&self) -> GenerationSettings<'_> {
        GenerationSettings::new(&self.settings)
    }

    pub fn reference_url(&self, role: ReferenceRole) -> Option<&str> {
        first_with_role(&self.references, role).map(|r| r.url.as_str())
    }

    /// Face reference, falling back to the source when the persona has none.
    pub fn face_or_source(&self) -> &str {
        self.reference_url(ReferenceRole::Face)
            .unwrap_or(&self.source_url)
    }
}

/// Opaque provider task handle carried through polling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskHandle {
    pub id: String,
    /// Provider-supplied status endpoint, when the provider returns one.
    pub status_url: Option<String>,
    /// Provider-supplied result endpoint, when distinct from the status one.
    pub result_url: Option<String>,
}

impl TaskHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status_url: None,
            result_url: None,
        }
    }
}

/// Outcome of a submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterResult {
    /// The provider returned the media synchronously.
    Immediate { artifact_url: String },
    /// The provider queued the work; poll `task` every `poll_interval`.
    Pending {
        task: TaskHandle,
        poll_interval: Duration,
    },
}

/// Provider-agnostic status of a queued task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    Pending,
    Succeeded { url: String },
    Failed { reason: String },
}

/// Errors from a provider call.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider answered with a non-2xx status or an error envelope.
    #[error("{status}: {body}")]
    Upstream { status: u16, body: String },

    /// The response carried neither a result nor a task handle.
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),

    /// The provider rejected the task outright at submission.
    #[error("provider rejected task: {0}")]
    Rejected(String),

    /// No credentials were configured for the selected provider.
    #[error("provider {0} is not configured")]
    NotConfigured(ProviderId),
}

impl AdapterError {
    /// Upstream HTTP status, when the provider returned one.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::Upstream { status, .. } => Some(*status),
            Self::Request(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// One external generation backend.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn id(&self) -> ProviderId;

    /// Model identifier recorded on the produced artifact.
    fn model(&self) -> &str;

    fn poll_policy(&self) -> PollPolicy;

    /// Submit once. Never retries.
    async fn submit(&self, request: &AdapterRequest) -> Result<AdapterResult, AdapterError>;

    async fn check_status(&self, task: &TaskHandle) -> Result<TaskStatus, AdapterError>;
}
