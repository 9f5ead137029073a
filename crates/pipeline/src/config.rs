use std::path::PathBuf;
use std::time::Duration;

/// Worker pool, persistence retry, and recovery settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum jobs waiting for a worker (default: `256`).
    pub queue_capacity: usize,
    /// Jobs processed concurrently (default: `8`).
    pub worker_concurrency: usize,
    /// How long shutdown waits for in-flight jobs (default: `30`).
    pub shutdown_timeout_secs: u64,
    /// Attempts for the artifact persistence step (default: `3`).
    pub persist_attempts: u32,
    /// Fixed delay between persistence attempts (default: `1000`).
    pub persist_retry_delay_ms: u64,
    /// Persona used when a request omits one (default: `default`).
    pub default_persona: String,
    /// Page size for the startup reconciler's status sweeps (default: `500`).
    pub reconcile_limit: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 256,
            worker_concurrency: 8,
            shutdown_timeout_secs: 30,
            persist_attempts: 3,
            persist_retry_delay_ms: 1_000,
            default_persona: "default".into(),
            reconcile_limit: 500,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default   |
    /// |--------------------------|-----------|
    /// | `QUEUE_CAPACITY`         | `256`     |
    /// | `WORKER_CONCURRENCY`     | `8`       |
    /// | `SHUTDOWN_TIMEOUT_SECS`  | `30`      |
    /// | `PERSIST_ATTEMPTS`       | `3`       |
    /// | `PERSIST_RETRY_DELAY_MS` | `1000`    |
    /// | `DEFAULT_PERSONA`        | `default` |
    /// | `RECONCILE_LIMIT`        | `500`     |
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let queue_capacity: usize = std::env::var("QUEUE_CAPACITY")
            .unwrap_or_else(|_| defaults.queue_capacity.to_string())
            .parse()
            .expect("QUEUE_CAPACITY must be a valid usize");
        assert!(queue_capacity > 0, "QUEUE_CAPACITY must be positive");

        let worker_concurrency: usize = std::env::var("WORKER_CONCURRENCY")
            .unwrap_or_else(|_| defaults.worker_concurrency.to_string())
            .parse()
            .expect("WORKER_CONCURRENCY must be a valid usize");
        assert!(worker_concurrency > 0, "WORKER_CONCURRENCY must be positive");

        let shutdown_timeout_secs: u64 = std::env::var("SHUTDOWN_TIMEOUT_SECS")
            .unwrap_or_else(|_| defaults.shutdown_timeout_secs.to_string())
            .parse()
            .expect("SHUTDOWN_TIMEOUT_SECS must be a valid u64");

        let persist_attempts: u32 = std::env::var("PERSIST_ATTEMPTS")
            .unwrap_or_else(|_| defaults.persist_attempts.to_string())
            .parse()
            .expect("PERSIST_ATTEMPTS must be a valid u32");

        let persist_retry_delay_ms: u64 = std::env::var("PERSIST_RETRY_DELAY_MS")
            .unwrap_or_else(|_| defaults.persist_retry_delay_ms.to_string())
            .parse()
            .expect("PERSIST_RETRY_DELAY_MS must be a valid u64");

        let default_persona =
            std::env::var("DEFAULT_PERSONA").unwrap_or(defaults.default_persona);

        let reconcile_limit: i64 = std::env::var("RECONCILE_LIMIT")
            .unwrap_or_else(|_| defaults.reconcile_limit.to_string())
            .parse()
            .expect("RECONCILE_LIMIT must be a valid i64");

        Self {
            queue_capacity,
            worker_concurrency,
            shutdown_timeout_secs,
            persist_attempts: persist_attempts.max(1),
            persist_retry_delay_ms,
            default_persona,
            reconcile_limit,
        }
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    pub fn persist_retry_delay(&self) -> Duration {
        Duration::from_millis(self.persist_retry_delay_ms)
    }
}

/// Where produced media is copied to.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    Local {
        root: PathBuf,
        public_base_url: String,
    },
    S3 {
        bucket: String,
        region: String,
        /// Custom endpoint for S3-compatible stores (MinIO, R2).
        endpoint_url: Option<String>,
        force_path_style: bool,
        key_prefix: String,
        public_base_url: String,
    },
}

impl StorageConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                  | Default                          |
    /// |--------------------------|----------------------------------|
    /// | `STORAGE_BACKEND`        | `local` (`local` or `s3`)        |
    /// | `STORAGE_ROOT`           | `./media`                        |
    /// | `MEDIA_PUBLIC_BASE_URL`  | `http://localhost:3000/media`    |
    /// | `S3_BUCKET`              | required for `s3`                |
    /// | `S3_REGION`              | `us-east-1`                      |
    /// | `S3_ENDPOINT_URL`        | unset                            |
    /// | `S3_FORCE_PATH_STYLE`    | `false`                          |
    /// | `S3_KEY_PREFIX`          | empty                            |
    pub fn from_env() -> Self {
        let backend = std::env::var("STORAGE_BACKEND").unwrap_or_else(|_| "local".into());
        let public_base_url = std::env::var("MEDIA_PUBLIC_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:3000/media".into())
            .trim_end_matches('/')
            .to_string();

        match backend.as_str() {
            "local" => Self::Local {
                root: std::env::var("STORAGE_ROOT")
                    .unwrap_or_else(|_| "./media".into())
                    .into(),
                public_base_url,
            },
            "s3" => Self::S3 {
                bucket: std::env::var("S3_BUCKET")
                    .expect("S3_BUCKET must be set for STORAGE_BACKEND=s3"),
                region: std::env::var("S3_REGION").unwrap_or_else(|_| "us-east-1".into()),
                endpoint_url: std::env::var("S3_ENDPOINT_URL").ok().filter(|s| !s.is_empty()),
                force_path_style: std::env::var("S3_FORCE_PATH_STYLE")
                    .unwrap_or_else(|_| "false".into())
                    .parse()
                    .expect("S3_FORCE_PATH_STYLE must be true or false"),
                key_prefix: std::env::var("S3_KEY_PREFIX").unwrap_or_default(),
                public_base_url,
            },
            other => panic!("STORAGE_BACKEND must be 'local' or 's3', got '{other}'"),
        }
    }
}
