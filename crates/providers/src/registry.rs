//! Immutable provider lookup built once at startup.

use std::collections::HashMap;
use std::sync::Arc;

use genbroker_core::provider::ProviderId;

use crate::adapter::{AdapterError, ProviderAdapter};
use crate::config::ProviderConfig;
use crate::fal::FalImageAdapter;
use crate::http::build_client;
use crate::kling::KlingVideoAdapter;
use crate::replicate::ReplicateAdapter;

/// Maps each [`ProviderId`] to its adapter.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    adapters: HashMap<ProviderId, Arc<dyn ProviderAdapter>>,
}

impl ProviderRegistry {
    /// Register adapters keyed by their own `id()`. A later adapter with the
    /// same id replaces an earlier one.
    pub fn new(adapters: impl IntoIterator<Item = Arc<dyn ProviderAdapter>>) -> Self {
        Self {
            adapters: adapters.into_iter().map(|a| (a.id(), a)).collect(),
        }
    }

    /// Build every adapter whose credentials are present in `config`.
    pub fn from_config(config: &ProviderConfig) -> Result<Self, reqwest::Error> {
        let client = build_client(config.request_timeout())?;
        let mut adapters: Vec<Arc<dyn ProviderAdapter>> = Vec::new();

        if let Some(key) = &config.fal.api_key {
            adapters.push(Arc::new(FalImageAdapter::new(
                client.clone(),
                key.clone(),
                &config.fal,
            )));
        }

        if let Some(token) = &config.replicate.api_token {
            let replicate = &config.replicate;
            for (id, version, poll) in [
                (
                    ProviderId::ReplicateImage,
                    &replicate.image_version,
                    replicate.image_poll,
                ),
                (
                    ProviderId::ReplicateVideo,
                    &replicate.video_version,
                    replicate.video_poll,
                ),
            ] {
                if version.is_empty() {
                    tracing::warn!(provider = %id, "Replicate token set but no model version; provider disabled");
                    continue;
                }
                adapters.push(Arc::new(ReplicateAdapter::new(
                    id,
                    client.clone(),
                    token.clone(),
                    &replicate.base_url,
                    version.clone(),
                    poll,
                )));
            }
        }

        if let Some(key) = &config.kling.api_key {
            adapters.push(Arc::new(KlingVideoAdapter::new(
                client.clone(),
                key.clone(),
                &config.kling,
            )));
        }

        let registry = Self::new(adapters);
        for id in ProviderId::ALL {
            if !registry.is_configured(id) {
                tracing::warn!(provider = %id, "Provider not configured");
            }
        }
        Ok(registry)
    }

    pub fn resolve(&self, id: ProviderId) -> Result<Arc<dyn ProviderAdapter>, AdapterError> {
        self.adapters
            .get(&id)
            .cloned()
            .ok_or(AdapterError::NotConfigured(id))
    }

    pub fn is_configured(&self, id: ProviderId) -> bool {
        self.adapters.contains_key(&id)
    }

    /// Configured provider ids in a stable order.
    pub fn configured(&self) -> Vec<ProviderId> {
        ProviderId::ALL
            .into_iter()
            .filter(|id| self.is_configured(*id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use assert_matches::assert_matches;

    use super::*;
    use crate::adapter::PollPolicy;
    use crate::config::{FalConfig, KlingConfig, ReplicateConfig};

    fn config() -> ProviderConfig {
        let poll = PollPolicy::new(Duration::from_millis(10), 3);
        ProviderConfig {
            request_timeout_secs: 5,
            fal: FalConfig {
                api_key: Some("fal-key".into()),
                base_url: "http://127.0.0.1:1".into(),
                model: "fal-ai/test".into(),
                poll,
            },
            replicate: ReplicateConfig {
                api_token: Some("r8".into()),
                base_url: "http://127.0.0.1:1".into(),
                image_version: "img-v1".into(),
                video_version: String::new(),
                image_poll: poll,
                video_poll: poll,
            },
            kling: KlingConfig {
                api_key: None,
                base_url: "http://127.0.0.1:1".into(),
                model: "kling-v1-6".into(),
                poll,
            },
        }
    }

    #[test]
    fn only_credentialed_providers_are_registered() {
        let registry = ProviderRegistry::from_config(&config()).unwrap();
        assert_eq!(
            registry.configured(),
            vec![ProviderId::FalImage, ProviderId::ReplicateImage]
        );
        assert_eq!(
            registry.resolve(ProviderId::ReplicateImage).unwrap().model(),
            "img-v1"
        );
        assert_matches!(
            registry.resolve(ProviderId::KlingVideo).err(),
            Some(AdapterError::NotConfigured(ProviderId::KlingVideo))
        );
        assert_matches!(
            registry.resolve(ProviderId::ReplicateVideo).err(),
            Some(AdapterError::NotConfigured(_))
        );
    }

    #[test]
    fn empty_registry_resolves_nothing() {
        let registry = ProviderRegistry::default();
        assert!(registry.configured().is_empty());
    }
}
