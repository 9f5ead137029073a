//! Shared harness: the production router over in-memory stores and fake
//! provider, blob, and fetch collaborators.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Method, Request, Response};
use axum::Router;
use genbroker_api::config::{ServerConfig, StoreBackend};
use genbroker_api::router::build_app_router;
use genbroker_api::state::AppState;
use genbroker_core::clock::SystemClock;
use genbroker_core::ids::UuidV7Generator;
use genbroker_core::job::JobStatus;
use genbroker_core::ports::{BlobError, BlobStore, FetchedMedia, JobStore, MediaFetcher};
use genbroker_core::provider::ProviderId;
use genbroker_core::types::JobId;
use genbroker_pipeline::collaborators::{
    PassthroughSourceResolver, StaticReferenceResolver, TemplatePromptWriter,
};
use genbroker_pipeline::config::PipelineConfig;
use genbroker_pipeline::memory::{MemoryArtifactStore, MemoryJobStore};
use genbroker_pipeline::{Broker, Orchestrator, OrchestratorDeps, WorkerPool};
use genbroker_providers::{
    AdapterError, AdapterRequest, AdapterResult, PollPolicy, ProviderAdapter, ProviderRegistry,
    TaskHandle, TaskStatus,
};
use http_body_util::BodyExt;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

pub const BLOB_BASE: &str = "https://blobs.test/media";

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
        store_backend: StoreBackend::Memory,
        database_url: None,
        db_max_connections: 1,
    }
}

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

/// Adapter that answers every submission the same way.
pub enum FakeAdapter {
    Immediate(ProviderId, String),
    Upstream(ProviderId, u16, String),
}

#[async_trait]
impl ProviderAdapter for FakeAdapter {
    fn id(&self) -> ProviderId {
        match self {
            Self::Immediate(id, _) | Self::Upstream(id, _, _) => *id,
        }
    }

    fn model(&self) -> &str {
        "fake-model-v1"
    }

    fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(Duration::from_millis(10), 3)
    }

    async fn submit(&self, _request: &AdapterRequest) -> Result<AdapterResult, AdapterError> {
        match self {
            Self::Immediate(_, url) => Ok(AdapterResult::Immediate {
                artifact_url: url.clone(),
            }),
            Self::Upstream(_, status, body) => Err(AdapterError::Upstream {
                status: *status,
                body: body.clone(),
            }),
        }
    }

    async fn check_status(&self, _task: &TaskHandle) -> Result<TaskStatus, AdapterError> {
        Ok(TaskStatus::Pending)
    }
}

struct FakeBlobStore;

#[async_trait]
impl BlobStore for FakeBlobStore {
    async fn put(&self, path: &str, _bytes: Vec<u8>, _content_type: &str) -> Result<String, BlobError> {
        Ok(format!("{BLOB_BASE}/{path}"))
    }

    fn owns(&self, url: &str) -> bool {
        url.starts_with(BLOB_BASE)
    }
}

struct FakeFetcher;

#[async_trait]
impl MediaFetcher for FakeFetcher {
    async fn fetch(&self, _url: &str) -> Result<FetchedMedia, BlobError> {
        Ok(FetchedMedia {
            bytes: b"media".to_vec(),
            content_type: Some("image/png".into()),
        })
    }
}

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

pub struct TestApp {
    pub router: Router,
    pub broker: Broker,
    pub jobs: Arc<MemoryJobStore>,
    pub pool: WorkerPool,
}

/// App whose image provider returns `https://fal.media/out.png` at once.
pub fn build_test_app() -> TestApp {
    build_test_app_with(vec![Arc::new(FakeAdapter::Immediate(
        ProviderId::FalImage,
        "https://fal.media/out.png".into(),
    ))])
}

/// Mirrors the wiring in `main.rs` with the memory backend.
pub fn build_test_app_with(adapters: Vec<Arc<dyn ProviderAdapter>>) -> TestApp {
    let config = test_config();
    let jobs = Arc::new(MemoryJobStore::new());

    let orchestrator = Arc::new(Orchestrator::new(
        OrchestratorDeps {
            jobs: jobs.clone(),
            artifacts: Arc::new(MemoryArtifactStore::new()),
            blobs: Arc::new(FakeBlobStore),
            fetcher: Arc::new(FakeFetcher),
            references: Arc::new(StaticReferenceResolver::new(HashMap::new())),
            prompts: Arc::new(TemplatePromptWriter),
            sources: Arc::new(PassthroughSourceResolver),
            providers: ProviderRegistry::new(adapters),
            ids: Arc::new(UuidV7Generator),
            clock: Arc::new(SystemClock),
        },
        &PipelineConfig::default(),
    ));

    let (queue, pool) = WorkerPool::start(orchestrator.clone(), 4, 2, CancellationToken::new());
    let broker = Broker::new(orchestrator, queue);

    let state = AppState {
        broker: broker.clone(),
        config: Arc::new(config.clone()),
    };

    TestApp {
        router: build_app_router(state, &config),
        broker,
        jobs,
        pool,
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::builder()
        .method(Method::GET)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("Content-Type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Poll the store until the job leaves `pending`/`processing`.
pub async fn wait_for_terminal(jobs: &MemoryJobStore, id: JobId) -> JobStatus {
    for _ in 0..200 {
        let job = jobs.find(id).await.unwrap().unwrap();
        if job.status.is_terminal() {
            return job.status;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {id} did not reach a terminal status");
}
