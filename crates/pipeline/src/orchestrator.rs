//! The job state machine: `pending -> processing -> {completed | failed}`.
//!
//! All job mutation funnels through this module. Adapters and the poller
//! return results; only the orchestrator writes the job row.

use std::sync::Arc;
use std::time::Duration;

use genbroker_core::artifact::{Artifact, ARTIFACT_STATUS_READY};
use genbroker_core::clock::Clock;
use genbroker_core::ids::IdGenerator;
use genbroker_core::job::{Job, JobStatus, JobView};
use genbroker_core::naming::{artifact_path, content_type_for_extension, infer_extension};
use genbroker_core::ports::{
    ArtifactStore, BlobStore, JobStore, MediaFetcher, PromptWriter, ReferenceResolver,
    SourceResolver, StoreError,
};
use genbroker_core::provider::{select_provider, ProviderId};
use genbroker_core::request::GenerationRequest;
use genbroker_core::settings::GenerationSettings;
use genbroker_core::types::{ArtifactId, JobId};
use genbroker_providers::{AdapterRequest, AdapterResult, ProviderRegistry};

use crate::config::PipelineConfig;
use crate::error::{JobFailure, PipelineError};
use crate::poller::{PollOutcome, Poller};

/// Message recorded on jobs found mid-flight after a restart.
pub const INTERRUPTED_MESSAGE: &str = "interrupted before completion";

/// Collaborators the orchestrator drives, injected once at startup.
#[derive(Clone)]
pub struct OrchestratorDeps {
    pub jobs: Arc<dyn JobStore>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub blobs: Arc<dyn BlobStore>,
    pub fetcher: Arc<dyn MediaFetcher>,
    pub references: Arc<dyn ReferenceResolver>,
    pub prompts: Arc<dyn PromptWriter>,
    pub sources: Arc<dyn SourceResolver>,
    pub providers: ProviderRegistry,
    pub ids: Arc<dyn IdGenerator>,
    pub clock: Arc<dyn Clock>,
}

/// How a worker run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Completed(ArtifactId),
    Failed(String),
    /// The artifact is recorded but the job could not be completed. The job
    /// stays `processing` for [`crate::Reconciler::recover`] to settle.
    Unsettled(ArtifactId),
    /// Another worker holds the job, it is no longer pending, or it does
    /// not exist.
    Skipped,
}

/// Media produced by a provider, before it is made durable.
#[derive(Debug)]
struct Generated {
    provider: ProviderId,
    model: String,
    prompt: String,
    url: String,
}

/// Why persistence gave up.
#[derive(Debug)]
enum PersistError {
    /// No artifact row references the job.
    Failed(JobFailure),
    /// The artifact row exists; only the job update is missing.
    Unsettled {
        artifact_id: ArtifactId,
        failure: JobFailure,
    },
}

pub struct Orchestrator {
    deps: OrchestratorDeps,
    default_persona: String,
    persist_attempts: u32,
    persist_retry_delay: Duration,
}

impl Orchestrator {
    pub fn new(deps: OrchestratorDeps, config: &PipelineConfig) -> Self {
        Self {
            deps,
            default_persona: config.default_persona.clone(),
            persist_attempts: config.persist_attempts.max(1),
            persist_retry_delay: config.persist_retry_delay(),
        }
    }

    /// Validate a request and create its `pending` row.
    ///
    /// Nothing is written when validation fails.
    pub async fn accept(&self, request: GenerationRequest) -> Result<Job, PipelineError> {
        let job = self.prepare(request)?;
        self.record(&job).await?;
        Ok(job)
    }

    /// Validate and normalize a request into a `pending` job without
    /// writing it.
    pub fn prepare(&self, request: GenerationRequest) -> Result<Job, PipelineError> {
        let validated = request.validate(&self.default_persona)?;
        Ok(Job::pending(
            self.deps.ids.job_id(),
            validated,
            self.deps.clock.now(),
        ))
    }

    /// Insert a prepared `pending` job.
    pub async fn record(&self, job: &Job) -> Result<(), StoreError> {
        self.deps.jobs.insert(job).await?;
        tracing::info!(
            job_id = %job.id,
            mode = job.mode.as_str(),
            platform = %job.platform,
            persona_id = %job.persona_id,
            "Generation job accepted",
        );
        Ok(())
    }

    /// Worker body for one job. Never returns an error: every failure after
    /// the claim is written to the job as `failed`, unless the artifact is
    /// already recorded, in which case `failed` would contradict it.
    pub async fn run_job(&self, id: JobId) -> RunOutcome {
        match self.deps.jobs.mark_processing(id, self.deps.clock.now()).await {
            Ok(true) => {}
            Ok(false) => {
                tracing::info!(job_id = %id, "Job not pending or already claimed, skipping");
                return RunOutcome::Skipped;
            }
            Err(e) => {
                tracing::error!(job_id = %id, error = %e, "Failed to claim job");
                return RunOutcome::Skipped;
            }
        }

        let job = match self.deps.jobs.find(id).await {
            Ok(Some(job)) => job,
            Ok(None) => {
                tracing::error!(job_id = %id, "Claimed job disappeared");
                return RunOutcome::Skipped;
            }
            Err(e) => {
                let failure = JobFailure::from(e);
                return self.fail(id, &failure).await;
            }
        };

        let generated = match self.generate(&job).await {
            Ok(generated) => generated,
            Err(failure) => return self.fail(id, &failure).await,
        };

        match self.persist(&job, &generated).await {
            Ok(artifact_id) => {
                tracing::info!(
                    job_id = %id,
                    provider = %generated.provider,
                    artifact_id = %artifact_id,
                    "Job completed",
                );
                RunOutcome::Completed(artifact_id)
            }
            Err(PersistError::Failed(failure)) => self.fail(id, &failure).await,
            Err(PersistError::Unsettled {
                artifact_id,
                failure,
            }) => {
                tracing::error!(
                    job_id = %id,
                    artifact_id = %artifact_id,
                    error = %failure,
                    "Artifact recorded but job completion failed, leaving job processing for recovery",
                );
                RunOutcome::Unsettled(artifact_id)
            }
        }
    }

    /// Job plus its artifact, if one is linked.
    pub async fn job_view(&self, id: JobId) -> Result<Option<JobView>, StoreError> {
        let Some(job) = self.deps.jobs.find(id).await? else {
            return Ok(None);
        };
        let artifact = match job.media_generation_id {
            Some(artifact_id) => self.deps.artifacts.find(artifact_id).await?,
            None => None,
        };
        Ok(Some(JobView { job, artifact }))
    }

    pub async fn list_jobs(&self, status: JobStatus, limit: i64) -> Result<Vec<Job>, StoreError> {
        self.deps.jobs.list_by_status(status, limit).await
    }

    pub async fn store_health(&self) -> Result<(), StoreError> {
        self.deps.jobs.ping().await
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.deps.providers
    }

    // ---- generation ----

    async fn generate(&self, job: &Job) -> Result<Generated, JobFailure> {
        let settings = GenerationSettings::new(&job.settings);
        let video_style = settings
            .video_style()
            .map_err(|e| JobFailure::Resolution(e.to_string()))?;
        let provider = select_provider(job.mode, settings.nsfw(), video_style);
        let adapter = self.deps.providers.resolve(provider)?;

        let source_url = self
            .deps
            .sources
            .resolve(&job.platform, &job.source_url)
            .await?;
        let references = self.deps.references.resolve(&job.persona_id).await?;
        let prompt = self.deps.prompts.write_prompt(job).await?;

        let request = AdapterRequest {
            mode: job.mode,
            source_url,
            references,
            prompt: prompt.clone(),
            shot_type: job.shot_type.clone(),
            settings: job.settings.clone(),
        };

        tracing::info!(job_id = %job.id, provider = %provider, model = adapter.model(), "Submitting to provider");
        let url = match adapter.submit(&request).await? {
            AdapterResult::Immediate { artifact_url } => artifact_url,
            AdapterResult::Pending {
                task,
                poll_interval,
            } => {
                let policy = adapter.poll_policy();
                tracing::info!(
                    job_id = %job.id,
                    provider = %provider,
                    task_id = %task.id,
                    poll_interval_ms = poll_interval.as_millis() as u64,
                    max_attempts = policy.max_attempts,
                    "Provider task pending, polling",
                );
                let outcome = Poller::await_completion(
                    &task,
                    || adapter.check_status(&task),
                    poll_interval,
                    policy.max_attempts,
                )
                .await;
                match outcome {
                    PollOutcome::Completed(url) => url,
                    PollOutcome::Failed(reason) => return Err(JobFailure::PollFailed(reason)),
                    PollOutcome::TimedOut { attempts } => {
                        return Err(JobFailure::PollTimeout { attempts })
                    }
                }
            }
        };

        Ok(Generated {
            provider,
            model: adapter.model().to_string(),
            prompt,
            url,
        })
    }

    // ---- persistence ----

    /// Copy the media to durable storage, insert the artifact, then complete
    /// the job. Retried independently of generation; each step that succeeded
    /// is not repeated on the next attempt.
    async fn persist(&self, job: &Job, generated: &Generated) -> Result<ArtifactId, PersistError> {
        let mut durable_url: Option<String> = None;
        let mut recorded: Option<ArtifactId> = None;
        let mut attempt = 1;
        loop {
            match self
                .try_persist(job, generated, &mut durable_url, &mut recorded)
                .await
            {
                Ok(artifact_id) => return Ok(artifact_id),
                Err(failure) if attempt < self.persist_attempts => {
                    tracing::warn!(
                        job_id = %job.id,
                        attempt,
                        max_attempts = self.persist_attempts,
                        error = %failure,
                        "Artifact persistence failed, retrying",
                    );
                    tokio::time::sleep(self.persist_retry_delay).await;
                    attempt += 1;
                }
                Err(failure) => {
                    if let Some(artifact_id) = recorded {
                        return Err(PersistError::Unsettled {
                            artifact_id,
                            failure,
                        });
                    }
                    tracing::error!(
                        job_id = %job.id,
                        orphaned_url = %durable_url.as_deref().unwrap_or(&generated.url),
                        provider_url = %generated.url,
                        attempts = attempt,
                        error = %failure,
                        "Artifact persistence exhausted retries, media is orphaned",
                    );
                    return Err(PersistError::Failed(failure));
                }
            }
        }
    }

    async fn try_persist(
        &self,
        job: &Job,
        generated: &Generated,
        durable_url: &mut Option<String>,
        recorded: &mut Option<ArtifactId>,
    ) -> Result<ArtifactId, JobFailure> {
        let artifact_id = match *recorded {
            Some(artifact_id) => artifact_id,
            None => {
                let artifact_id = self.record_artifact(job, generated, durable_url).await?;
                *recorded = Some(artifact_id);
                artifact_id
            }
        };
        self.complete(job.id, artifact_id).await?;
        Ok(artifact_id)
    }

    async fn record_artifact(
        &self,
        job: &Job,
        generated: &Generated,
        durable_url: &mut Option<String>,
    ) -> Result<ArtifactId, JobFailure> {
        let url = match durable_url {
            Some(url) => url.clone(),
            None => {
                let url = self.make_durable(job, &generated.url).await?;
                *durable_url = Some(url.clone());
                url
            }
        };

        let settings = GenerationSettings::new(&job.settings);
        let artifact = Artifact {
            id: self.deps.ids.artifact_id(),
            job_id: job.id,
            kind: job.mode,
            url,
            model: generated.model.clone(),
            prompt: generated.prompt.clone(),
            settings: job.settings.clone(),
            quality: settings.quality(),
            status: ARTIFACT_STATUS_READY.to_string(),
            created_at: self.deps.clock.now(),
        };

        let artifact_id = match self.deps.artifacts.insert(&artifact).await {
            Ok(()) => artifact.id,
            Err(StoreError::Conflict(_)) => {
                // A previous attempt got the row in before failing.
                let existing = self
                    .deps
                    .artifacts
                    .find_by_job(job.id)
                    .await?
                    .ok_or_else(|| {
                        JobFailure::Persistence(format!(
                            "artifact for job {} conflicted but was not found",
                            job.id
                        ))
                    })?;
                tracing::debug!(job_id = %job.id, artifact_id = %existing.id, "Reusing existing artifact");
                existing.id
            }
            Err(e) => return Err(e.into()),
        };
        Ok(artifact_id)
    }

    /// Link the artifact and move the job to `completed`.
    ///
    /// A job that already left `processing` only counts as completed when it
    /// carries this artifact.
    async fn complete(&self, id: JobId, artifact_id: ArtifactId) -> Result<(), JobFailure> {
        if self
            .deps
            .jobs
            .mark_completed(id, artifact_id, self.deps.clock.now())
            .await?
        {
            return Ok(());
        }
        match self.deps.jobs.find(id).await? {
            Some(job)
                if job.status == JobStatus::Completed
                    && job.media_generation_id == Some(artifact_id) =>
            {
                Ok(())
            }
            Some(job) => Err(JobFailure::Persistence(format!(
                "job {id} left processing before completion (now {})",
                job.status.as_str()
            ))),
            None => Err(JobFailure::Persistence(format!(
                "job {id} disappeared before completion"
            ))),
        }
    }

    /// Return a URL in the blob store for `url`, copying it there unless it
    /// already is.
    async fn make_durable(&self, job: &Job, url: &str) -> Result<String, JobFailure> {
        if self.deps.blobs.owns(url) {
            return Ok(url.to_string());
        }

        let media = self.deps.fetcher.fetch(url).await?;
        let ext = infer_extension(media.content_type.as_deref(), url, job.mode);
        let content_type = media
            .content_type
            .clone()
            .unwrap_or_else(|| content_type_for_extension(&ext).to_string());
        let path = artifact_path(&job.persona_id, job.mode, job.created_at, job.id, &ext);

        let stored = self.deps.blobs.put(&path, media.bytes, &content_type).await?;
        tracing::debug!(job_id = %job.id, path = %path, "Media copied to blob store");
        Ok(stored)
    }

    // ---- failure ----

    async fn fail(&self, id: JobId, failure: &JobFailure) -> RunOutcome {
        let message = failure.to_string();
        let upstream_status = match failure {
            JobFailure::Adapter(e) => e.upstream_status(),
            _ => None,
        };
        tracing::error!(
            job_id = %id,
            failure_class = failure.class(),
            upstream_status,
            error = %message,
            "Job failed",
        );

        match self
            .deps
            .jobs
            .mark_failed(id, &message, self.deps.clock.now())
            .await
        {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(job_id = %id, "Job was not processing when marking failed");
            }
            Err(e) => {
                tracing::error!(job_id = %id, error = %e, "Failed to record job failure");
            }
        }
        RunOutcome::Failed(message)
    }
}
