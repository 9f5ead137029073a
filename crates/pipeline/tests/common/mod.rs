//! Shared harness: an orchestrator wired to in-memory stores and scripted
//! provider/blob/fetch fakes.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use genbroker_core::artifact::Artifact;
use genbroker_core::clock::FixedClock;
use genbroker_core::ids::SequentialIdGenerator;
use genbroker_core::job::{Job, JobStatus};
use genbroker_core::ports::{
    ArtifactStore, BlobError, BlobStore, FetchedMedia, JobCursor, JobStore, MediaFetcher,
    StoreError,
};
use genbroker_core::provider::ProviderId;
use genbroker_core::types::{ArtifactId, JobId, Timestamp};
use genbroker_pipeline::collaborators::{
    PassthroughSourceResolver, StaticReferenceResolver, TemplatePromptWriter,
};
use genbroker_pipeline::config::PipelineConfig;
use genbroker_pipeline::memory::{MemoryArtifactStore, MemoryJobStore};
use genbroker_pipeline::{Orchestrator, OrchestratorDeps};
use genbroker_providers::{
    AdapterError, AdapterRequest, AdapterResult, PollPolicy, ProviderAdapter, ProviderRegistry,
    TaskHandle, TaskStatus,
};

pub const BLOB_BASE: &str = "https://blobs.test/media";

// ---------------------------------------------------------------------------
// Provider fake
// ---------------------------------------------------------------------------

pub enum SubmitScript {
    Immediate(String),
    Pending(Vec<TaskStatus>),
    Fail { status: u16, body: String },
}

/// Scripted adapter. Pending tasks replay `statuses` in order, then report
/// pending forever.
pub struct FakeAdapter {
    id: ProviderId,
    script: SubmitScript,
    statuses: Mutex<VecDeque<TaskStatus>>,
    poll: PollPolicy,
    submit_delay: Duration,
    pub submits: AtomicUsize,
    pub checks: AtomicUsize,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub last_request: Mutex<Option<AdapterRequest>>,
}

impl FakeAdapter {
    pub fn new(id: ProviderId, script: SubmitScript) -> Self {
        let statuses = match &script {
            SubmitScript::Pending(statuses) => statuses.clone().into(),
            _ => VecDeque::new(),
        };
        Self {
            id,
            script,
            statuses: Mutex::new(statuses),
            poll: PollPolicy::new(Duration::from_millis(10), 5),
            submit_delay: Duration::ZERO,
            submits: AtomicUsize::new(0),
            checks: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn immediate(id: ProviderId, url: &str) -> Self {
        Self::new(id, SubmitScript::Immediate(url.into()))
    }

    pub fn pending(id: ProviderId, statuses: Vec<TaskStatus>) -> Self {
        Self::new(id, SubmitScript::Pending(statuses))
    }

    pub fn failing(id: ProviderId, status: u16, body: &str) -> Self {
        Self::new(
            id,
            SubmitScript::Fail {
                status,
                body: body.into(),
            },
        )
    }

    pub fn with_poll(mut self, poll: PollPolicy) -> Self {
        self.poll = poll;
        self
    }

    pub fn with_submit_delay(mut self, delay: Duration) -> Self {
        self.submit_delay = delay;
        self
    }

    pub fn submits(&self) -> usize {
        self.submits.load(Ordering::SeqCst)
    }

    pub fn checks(&self) -> usize {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for FakeAdapter {
    fn id(&self) -> ProviderId {
        self.id
    }

    fn model(&self) -> &str {
        "fake-model-v1"
    }

    fn poll_policy(&self) -> PollPolicy {
        self.poll
    }

    async fn submit(&self, request: &AdapterRequest) -> Result<AdapterResult, AdapterError> {
        self.submits.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.submit_delay.is_zero() {
            tokio::time::sleep(self.submit_delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match &self.script {
            SubmitScript::Immediate(url) => Ok(AdapterResult::Immediate {
                artifact_url: url.clone(),
            }),
            SubmitScript::Pending(_) => Ok(AdapterResult::Pending {
                task: TaskHandle::new("task-1"),
                poll_interval: self.poll.interval,
            }),
            SubmitScript::Fail { status, body } => Err(AdapterError::Upstream {
                status: *status,
                body: body.clone(),
            }),
        }
    }

    async fn check_status(&self, _task: &TaskHandle) -> Result<TaskStatus, AdapterError> {
        self.checks.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .statuses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(TaskStatus::Pending))
    }
}

// ---------------------------------------------------------------------------
// Blob and fetch fakes
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct FakeBlobStore {
    pub puts: Mutex<Vec<(String, String)>>,
}

impl FakeBlobStore {
    pub fn paths(&self) -> Vec<String> {
        self.puts.lock().unwrap().iter().map(|(p, _)| p.clone()).collect()
    }
}

#[async_trait]
impl BlobStore for FakeBlobStore {
    async fn put(&self, path: &str, _bytes: Vec<u8>, content_type: &str) -> Result<String, BlobError> {
        self.puts
            .lock()
            .unwrap()
            .push((path.to_string(), content_type.to_string()));
        Ok(format!("{BLOB_BASE}/{path}"))
    }

    fn owns(&self, url: &str) -> bool {
        url.starts_with(BLOB_BASE)
    }
}

#[derive(Default)]
pub struct FakeFetcher {
    pub fetched: Mutex<Vec<String>>,
}

#[async_trait]
impl MediaFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedMedia, BlobError> {
        self.fetched.lock().unwrap().push(url.to_string());
        let content_type = if url.ends_with(".mp4") {
            "video/mp4"
        } else {
            "image/png"
        };
        Ok(FetchedMedia {
            bytes: b"media".to_vec(),
            content_type: Some(content_type.into()),
        })
    }
}

/// Artifact store whose first `failures` inserts report `Unavailable`.
/// With `write_through`, the failed inserts still land, like a commit whose
/// acknowledgement was lost.
pub struct FlakyArtifactStore {
    inner: MemoryArtifactStore,
    failures: AtomicUsize,
    write_through: bool,
    pub inserts: AtomicUsize,
}

impl FlakyArtifactStore {
    pub fn new(failures: usize, write_through: bool) -> Self {
        Self {
            inner: MemoryArtifactStore::new(),
            failures: AtomicUsize::new(failures),
            write_through,
            inserts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ArtifactStore for FlakyArtifactStore {
    async fn insert(&self, artifact: &Artifact) -> Result<(), StoreError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            if self.write_through {
                self.inner.insert(artifact).await?;
            }
            return Err(StoreError::Unavailable("connection reset".into()));
        }
        self.inner.insert(artifact).await
    }

    async fn find(&self, id: ArtifactId) -> Result<Option<Artifact>, StoreError> {
        self.inner.find(id).await
    }

    async fn find_by_job(&self, job_id: JobId) -> Result<Option<Artifact>, StoreError> {
        self.inner.find_by_job(job_id).await
    }
}

/// Job store whose first `failures` completions report `Unavailable`
/// without touching the row. Everything else goes to the shared inner store.
pub struct FlakyCompletionJobStore {
    inner: Arc<MemoryJobStore>,
    failures: AtomicUsize,
    pub completions: AtomicUsize,
}

impl FlakyCompletionJobStore {
    pub fn new(inner: Arc<MemoryJobStore>, failures: usize) -> Self {
        Self {
            inner,
            failures: AtomicUsize::new(failures),
            completions: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl JobStore for FlakyCompletionJobStore {
    async fn insert(&self, job: &Job) -> Result<(), StoreError> {
        self.inner.insert(job).await
    }

    async fn find(&self, id: JobId) -> Result<Option<Job>, StoreError> {
        self.inner.find(id).await
    }

    async fn list_by_status_after(
        &self,
        status: JobStatus,
        after: Option<JobCursor>,
        limit: i64,
    ) -> Result<Vec<Job>, StoreError> {
        self.inner.list_by_status_after(status, after, limit).await
    }

    async fn mark_processing(&self, id: JobId, at: Timestamp) -> Result<bool, StoreError> {
        self.inner.mark_processing(id, at).await
    }

    async fn mark_completed(
        &self,
        id: JobId,
        artifact_id: ArtifactId,
        at: Timestamp,
    ) -> Result<bool, StoreError> {
        self.completions.fetch_add(1, Ordering::SeqCst);
        let remaining = self.failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures.store(remaining - 1, Ordering::SeqCst);
            return Err(StoreError::Unavailable("connection reset".into()));
        }
        self.inner.mark_completed(id, artifact_id, at).await
    }

    async fn mark_failed(&self, id: JobId, error: &str, at: Timestamp) -> Result<bool, StoreError> {
        self.inner.mark_failed(id, error, at).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub orchestrator: Arc<Orchestrator>,
    /// The underlying rows, bypassing any wrapper the orchestrator sees.
    pub jobs: Arc<MemoryJobStore>,
    /// Present when built with `completion_failures`.
    pub flaky_jobs: Option<Arc<FlakyCompletionJobStore>>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub blobs: Arc<FakeBlobStore>,
    pub fetcher: Arc<FakeFetcher>,
    pub clock: Arc<FixedClock>,
}

pub struct HarnessBuilder {
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    artifacts: Option<Arc<dyn ArtifactStore>>,
    completion_failures: Option<usize>,
    references: StaticReferenceResolver,
    config: PipelineConfig,
}

impl Default for HarnessBuilder {
    fn default() -> Self {
        Self {
            adapters: Vec::new(),
            artifacts: None,
            completion_failures: None,
            references: StaticReferenceResolver::default(),
            config: PipelineConfig {
                persist_attempts: 3,
                persist_retry_delay_ms: 1,
                ..PipelineConfig::default()
            },
        }
    }
}

impl HarnessBuilder {
    pub fn adapter(mut self, adapter: Arc<FakeAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    pub fn artifacts(mut self, store: Arc<dyn ArtifactStore>) -> Self {
        self.artifacts = Some(store);
        self
    }

    /// Make the orchestrator's first `failures` job completions fail.
    pub fn completion_failures(mut self, failures: usize) -> Self {
        self.completion_failures = Some(failures);
        self
    }

    pub fn references(mut self, references: StaticReferenceResolver) -> Self {
        self.references = references;
        self
    }

    pub fn persist_attempts(mut self, attempts: u32) -> Self {
        self.config.persist_attempts = attempts;
        self
    }

    pub fn build(self) -> Harness {
        let jobs = Arc::new(MemoryJobStore::new());
        let flaky_jobs = self
            .completion_failures
            .map(|failures| Arc::new(FlakyCompletionJobStore::new(jobs.clone(), failures)));
        let orchestrator_jobs: Arc<dyn JobStore> = match &flaky_jobs {
            Some(flaky) => flaky.clone() as Arc<dyn JobStore>,
            None => jobs.clone() as Arc<dyn JobStore>,
        };
        let artifacts = self
            .artifacts
            .unwrap_or_else(|| Arc::new(MemoryArtifactStore::new()) as Arc<dyn ArtifactStore>);
        let blobs = Arc::new(FakeBlobStore::default());
        let fetcher = Arc::new(FakeFetcher::default());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap(),
        ));

        let deps = OrchestratorDeps {
            jobs: orchestrator_jobs,
            artifacts: artifacts.clone(),
            blobs: blobs.clone(),
            fetcher: fetcher.clone(),
            references: Arc::new(self.references),
            prompts: Arc::new(TemplatePromptWriter),
            sources: Arc::new(PassthroughSourceResolver),
            providers: ProviderRegistry::new(self.adapters),
            ids: Arc::new(SequentialIdGenerator::new()),
            clock: clock.clone(),
        };

        Harness {
            orchestrator: Arc::new(Orchestrator::new(deps, &self.config)),
            jobs,
            flaky_jobs,
            artifacts,
            blobs,
            fetcher,
            clock,
        }
    }
}

pub fn harness() -> HarnessBuilder {
    HarnessBuilder::default()
}
