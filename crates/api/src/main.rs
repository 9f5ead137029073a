use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use genbroker_api::config::{ServerConfig, StoreBackend};
use genbroker_api::router::build_app_router;
use genbroker_api::state::AppState;
use genbroker_core::clock::{Clock, SystemClock};
use genbroker_core::ids::UuidV7Generator;
use genbroker_core::ports::{ArtifactStore, JobStore, ReferenceResolver};
use genbroker_db::stores::{PgArtifactStore, PgJobStore, PgReferenceResolver};
use genbroker_pipeline::collaborators::{
    PassthroughSourceResolver, StaticReferenceResolver, TemplatePromptWriter,
};
use genbroker_pipeline::config::{PipelineConfig, StorageConfig};
use genbroker_pipeline::fetcher::HttpMediaFetcher;
use genbroker_pipeline::memory::{MemoryArtifactStore, MemoryJobStore};
use genbroker_pipeline::{blob, Broker, Orchestrator, OrchestratorDeps, Reconciler, WorkerPool};
use genbroker_providers::http::build_client;
use genbroker_providers::{ProviderConfig, ProviderRegistry};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Job, artifact, and reference backends selected by `STORE_BACKEND`.
struct Stores {
    jobs: Arc<dyn JobStore>,
    artifacts: Arc<dyn ArtifactStore>,
    references: Arc<dyn ReferenceResolver>,
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "genbroker_api=debug,genbroker_pipeline=debug,tower_http=debug".into()
            }),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer()))
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    let pipeline_config = PipelineConfig::from_env();
    let provider_config = ProviderConfig::from_env();
    let storage_config = StorageConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        store_backend = ?config.store_backend,
        "Loaded server configuration",
    );

    // --- Stores ---
    let stores = connect_stores(&config).await;

    // --- Collaborators ---
    let blobs = blob::from_config(&storage_config).await;
    let http_client = build_client(provider_config.request_timeout())
        .expect("Failed to build media download client");
    let providers =
        ProviderRegistry::from_config(&provider_config).expect("Failed to build provider clients");
    let configured: Vec<String> = providers.configured().iter().map(|p| p.to_string()).collect();
    tracing::info!(providers = ?configured, "Provider registry built");

    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let orchestrator = Arc::new(Orchestrator::new(
        OrchestratorDeps {
            jobs: Arc::clone(&stores.jobs),
            artifacts: Arc::clone(&stores.artifacts),
            blobs,
            fetcher: Arc::new(HttpMediaFetcher::new(http_client)),
            references: stores.references,
            prompts: Arc::new(TemplatePromptWriter),
            sources: Arc::new(PassthroughSourceResolver),
            providers,
            ids: Arc::new(UuidV7Generator),
            clock: Arc::clone(&clock),
        },
        &pipeline_config,
    ));

    // --- Worker pool ---
    let cancel = CancellationToken::new();
    let (queue, pool) = WorkerPool::start(
        Arc::clone(&orchestrator),
        pipeline_config.queue_capacity,
        pipeline_config.worker_concurrency,
        cancel.clone(),
    );

    // --- Startup recovery ---
    let reconciler = Reconciler::new(
        stores.jobs,
        stores.artifacts,
        queue.clone(),
        clock,
        pipeline_config.reconcile_limit,
    );
    // Runs to completion before the listener accepts new jobs, so every
    // `processing` row it sees is left over from a previous process.
    if let Err(e) = reconciler.recover().await {
        tracing::error!(error = %e, "Startup recovery failed");
    }

    // --- Router ---
    let state = AppState {
        broker: Broker::new(orchestrator, queue),
        config: Arc::new(config.clone()),
    };
    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!(
        active_jobs = pool.active_jobs(),
        "Server stopped accepting connections, draining workers",
    );
    let drained = pool.shutdown(pipeline_config.shutdown_timeout()).await;
    tracing::info!(drained, "Graceful shutdown complete");
}

async fn connect_stores(config: &ServerConfig) -> Stores {
    match config.store_backend {
        StoreBackend::Postgres => {
            let database_url = config
                .database_url
                .as_deref()
                .expect("DATABASE_URL must be set");

            let pool = genbroker_db::create_pool(database_url, config.db_max_connections)
                .await
                .expect("Failed to connect to database");
            tracing::info!("Database connection pool created");

            genbroker_db::health_check(&pool)
                .await
                .expect("Database health check failed");

            genbroker_db::run_migrations(&pool)
                .await
                .expect("Failed to run database migrations");
            tracing::info!("Database migrations applied");

            Stores {
                jobs: Arc::new(PgJobStore::new(pool.clone())),
                artifacts: Arc::new(PgArtifactStore::new(pool.clone())),
                references: Arc::new(PgReferenceResolver::new(pool)),
            }
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory stores; jobs are lost on restart");
            Stores {
                jobs: Arc::new(MemoryJobStore::new()),
                artifacts: Arc::new(MemoryArtifactStore::new()),
                references: Arc::new(StaticReferenceResolver::new(HashMap::new())),
            }
        }
    }
}

/// Wait for a termination signal to initiate graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
