use std::time::Duration;

use crate::adapter::PollPolicy;

/// Credentials, endpoints, and poll budgets for every provider.
///
/// Built once at startup and handed to [`crate::ProviderRegistry`]. A
/// provider whose credential is absent is simply not registered; selecting
/// it fails the job with `NotConfigured`.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Outbound request timeout in seconds (default: `60`).
    pub request_timeout_secs: u64,
    pub fal: FalConfig,
    pub replicate: ReplicateConfig,
    pub kling: KlingConfig,
}

#[derive(Debug, Clone)]
pub struct FalConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub poll: PollPolicy,
}

#[derive(Debug, Clone)]
pub struct ReplicateConfig {
    pub api_token: Option<String>,
    pub base_url: String,
    /// Model version for the image model.
    pub image_version: String,
    /// Model version for the swap-style video model.
    pub video_version: String,
    pub image_poll: PollPolicy,
    pub video_poll: PollPolicy,
}

#[derive(Debug, Clone)]
pub struct KlingConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub poll: PollPolicy,
}

impl ProviderConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default                         |
    /// |-------------------------------|---------------------------------|
    /// | `PROVIDER_TIMEOUT_SECS`       | `60`                            |
    /// | `FAL_API_KEY`                 | unset (provider disabled)       |
    /// | `FAL_BASE_URL`                | `https://queue.fal.run`         |
    /// | `FAL_MODEL`                   | `fal-ai/flux-pulid`             |
    /// | `FAL_POLL_INTERVAL_MS`        | `2000`                          |
    /// | `FAL_POLL_MAX_ATTEMPTS`       | `90`                            |
    /// | `REPLICATE_API_TOKEN`         | unset (provider disabled)       |
    /// | `REPLICATE_BASE_URL`          | `https://api.replicate.com/v1`  |
    /// | `REPLICATE_IMAGE_VERSION`     | empty                           |
    /// | `REPLICATE_VIDEO_VERSION`     | empty                           |
    /// | `REPLICATE_IMAGE_POLL_INTERVAL_MS` | `3000`                     |
    /// | `REPLICATE_IMAGE_POLL_MAX_ATTEMPTS` | `100`                     |
    /// | `REPLICATE_VIDEO_POLL_INTERVAL_MS` | `5000`                     |
    /// | `REPLICATE_VIDEO_POLL_MAX_ATTEMPTS` | `240`                     |
    /// | `KLING_API_KEY`               | unset (provider disabled)       |
    /// | `KLING_BASE_URL`              | `https://api.klingai.com`       |
    /// | `KLING_MODEL`                 | `kling-v1-6`                    |
    /// | `KLING_POLL_INTERVAL_MS`      | `10000`                         |
    /// | `KLING_POLL_MAX_ATTEMPTS`     | `90`                            |
    pub fn from_env() -> Self {
        let request_timeout_secs: u64 = env_or("PROVIDER_TIMEOUT_SECS", "60")
            .parse()
            .expect("PROVIDER_TIMEOUT_SECS must be a valid u64");

        let fal = FalConfig {
            api_key: env_secret("FAL_API_KEY"),
            base_url: env_or("FAL_BASE_URL", "https://queue.fal.run"),
            model: env_or("FAL_MODEL", "fal-ai/flux-pulid"),
            poll: poll_from_env("FAL", 2_000, 90),
        };

        let replicate = ReplicateConfig {
            api_token: env_secret("REPLICATE_API_TOKEN"),
            base_url: env_or("REPLICATE_BASE_URL", "https://api.replicate.com/v1"),
            image_version: env_or("REPLICATE_IMAGE_VERSION", ""),
            video_version: env_or("REPLICATE_VIDEO_VERSION", ""),
            image_poll: poll_from_env("REPLICATE_IMAGE", 3_000, 100),
            video_poll: poll_from_env("REPLICATE_VIDEO", 5_000, 240),
        };

        let kling = KlingConfig {
            api_key: env_secret("KLING_API_KEY"),
            base_url: env_or("KLING_BASE_URL", "https://api.klingai.com"),
            model: env_or("KLING_MODEL", "kling-v1-6"),
            poll: poll_from_env("KLING", 10_000, 90),
        };

        Self {
            request_timeout_secs,
            fal,
            replicate,
            kling,
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.into())
}

/// Treat an empty variable the same as an unset one.
fn env_secret(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn poll_from_env(prefix: &str, default_interval_ms: u64, default_attempts: u32) -> PollPolicy {
    let interval_ms: u64 = std::env::var(format!("{prefix}_POLL_INTERVAL_MS"))
        .ok()
        .map(|v| {
            v.parse()
                .unwrap_or_else(|_| panic!("{prefix}_POLL_INTERVAL_MS must be a valid u64"))
        })
        .unwrap_or(default_interval_ms);
    let max_attempts: u32 = std::env::var(format!("{prefix}_POLL_MAX_ATTEMPTS"))
        .ok()
        .map(|v| {
            v.parse()
                .unwrap_or_else(|_| panic!("{prefix}_POLL_MAX_ATTEMPTS must be a valid u32"))
        })
        .unwrap_or(default_attempts);
    PollPolicy::new(Duration::from_millis(interval_ms), max_attempts)
}
