use async_trait::async_trait;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use genbroker_core::ports::{BlobError, BlobStore};

use super::is_safe_relative_path;

/// S3 or S3-compatible blob store.
pub struct S3BlobStore {
    client: aws_sdk_s3::Client,
    bucket: String,
    key_prefix: String,
    public_base_url: String,
}

impl S3BlobStore {
    /// Load credentials from the default AWS provider chain and build a
    /// client, optionally against a custom endpoint.
    pub async fn connect(
        bucket: String,
        region: String,
        endpoint_url: Option<String>,
        force_path_style: bool,
        key_prefix: String,
        public_base_url: String,
    ) -> Self {
        let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared).force_path_style(force_path_style);
        if let Some(endpoint) = endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }

        Self::with_client(
            aws_sdk_s3::Client::from_conf(builder.build()),
            bucket,
            key_prefix,
            public_base_url,
        )
    }

    pub fn with_client(
        client: aws_sdk_s3::Client,
        bucket: String,
        key_prefix: String,
        public_base_url: String,
    ) -> Self {
        Self {
            client,
            bucket,
            key_prefix: key_prefix.trim_matches('/').to_string(),
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn object_key(&self, path: &str) -> String {
        if self.key_prefix.is_empty() {
            path.to_string()
        } else {
            format!("{}/{path}", self.key_prefix)
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, path: &str, bytes: Vec<u8>, content_type: &str) -> Result<String, BlobError> {
        if !is_safe_relative_path(path) {
            return Err(BlobError::Upload(format!("invalid blob path '{path}'")));
        }

        let key = self.object_key(path);
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| BlobError::Upload(DisplayErrorContext(&e).to_string()))?;

        tracing::debug!(bucket = %self.bucket, key = %key, "Object uploaded");
        Ok(format!("{}/{key}", self.public_base_url))
    }

    fn owns(&self, url: &str) -> bool {
        url.strip_prefix(&self.public_base_url)
            .is_some_and(|rest| rest.starts_with('/'))
    }
}
