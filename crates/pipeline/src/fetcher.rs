//! Downloads provider output so it can be copied into the blob store.

use async_trait::async_trait;
use genbroker_core::ports::{BlobError, FetchedMedia, MediaFetcher};

pub struct HttpMediaFetcher {
    client: reqwest::Client,
}

impl HttpMediaFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedMedia, BlobError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BlobError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(BlobError::Download {
                status: status.as_u16(),
                message,
            });
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());
        let bytes = response
            .bytes()
            .await
            .map_err(|e| BlobError::Request(e.to_string()))?;

        tracing::debug!(url, size = bytes.len(), "Media downloaded");
        Ok(FetchedMedia {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}
