use std::path::PathBuf;

use async_trait::async_trait;
use genbroker_core::ports::{BlobError, BlobStore};

use super::is_safe_relative_path;

/// Filesystem blob store served under a public base URL.
pub struct LocalBlobStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalBlobStore {
    pub fn new(root: PathBuf, public_base_url: String) -> Self {
        Self {
            root,
            public_base_url: public_base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, path: &str, bytes: Vec<u8>, _content_type: &str) -> Result<String, BlobError> {
        if !is_safe_relative_path(path) {
            return Err(BlobError::Upload(format!("invalid blob path '{path}'")));
        }

        let target = self.root.join(path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, bytes).await?;

        tracing::debug!(path = %target.display(), "Blob written");
        Ok(format!("{}/{path}", self.public_base_url))
    }

    fn owns(&self, url: &str) -> bool {
        url.strip_prefix(&self.public_base_url)
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_root(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("genbroker-blob-{name}-{}", std::process::id()))
    }

    #[tokio::test]
    async fn put_writes_file_and_returns_public_url() {
        let root = temp_root("put");
        let store = LocalBlobStore::new(root.clone(), "http://cdn.local/media/".into());

        let url = store
            .put("ava/image_1.png", b"png-bytes".to_vec(), "image/png")
            .await
            .unwrap();

        assert_eq!(url, "http://cdn.local/media/ava/image_1.png");
        assert!(store.owns(&url));
        let written = tokio::fs::read(root.join("ava/image_1.png")).await.unwrap();
        assert_eq!(written, b"png-bytes");

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn put_rejects_traversal() {
        let store = LocalBlobStore::new(temp_root("traversal"), "http://cdn.local".into());
        let err = store.put("../x.png", vec![], "image/png").await.unwrap_err();
        assert!(matches!(err, BlobError::Upload(_)));
    }

    #[test]
    fn owns_only_urls_under_base() {
        let store = LocalBlobStore::new(PathBuf::from("/tmp"), "http://cdn.local/media".into());
        assert!(store.owns("http://cdn.local/media/ava/x.png"));
        assert!(!store.owns("http://cdn.local/mediax/ava/x.png"));
        assert!(!store.owns("https://fal.media/x.png"));
    }
}
