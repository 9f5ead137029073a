//! Durable blob stores for produced media.

pub mod local;
pub mod s3;

use std::sync::Arc;

use genbroker_core::ports::BlobStore;

pub use local::LocalBlobStore;
pub use s3::S3BlobStore;

use crate::config::StorageConfig;

/// Build the configured blob store.
pub async fn from_config(config: &StorageConfig) -> Arc<dyn BlobStore> {
    match config {
        StorageConfig::Local {
            root,
            public_base_url,
        } => Arc::new(LocalBlobStore::new(root.clone(), public_base_url.clone())),
        StorageConfig::S3 {
            bucket,
            region,
            endpoint_url,
            force_path_style,
            key_prefix,
            public_base_url,
        } => Arc::new(
            S3BlobStore::connect(
                bucket.clone(),
                region.clone(),
                endpoint_url.clone(),
                *force_path_style,
                key_prefix.clone(),
                public_base_url.clone(),
            )
            .await,
        ),
    }
}

/// Reject absolute paths and parent traversal in a relative blob path.
pub(crate) fn is_safe_relative_path(path: &str) -> bool {
    !path.is_empty()
        && !path.starts_with('/')
        && !path.contains('\\')
        && path.split('/').all(|seg| !seg.is_empty() && seg != "." && seg != "..")
}
