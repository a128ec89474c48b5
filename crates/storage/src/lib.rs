//! Object-storage access for the paperdex retrieval service
//!
//! A single bucket holds everything the service reads at startup and at
//! serve time: `Index/*` artifacts, `Models/<name>/*` encoder files, and
//! per-paper `<doc_id>-corrected.mmd` cleaned markdown. The store handle is
//! an `Arc<dyn ObjectStore>` so production uses GCS while tests plug in the
//! in-memory backend.

use std::path::Path;
use std::sync::Arc;

use futures::TryStreamExt;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Object store error: {0}")]
    Store(#[from] object_store::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid artifact {path}: {message}")]
    Invalid { path: String, message: String },
}

/// Client for the paper-corpus bucket
#[derive(Clone)]
pub struct ArtifactStore {
    store: Arc<dyn ObjectStore>,
}

impl ArtifactStore {
    /// Wrap an existing object store (tests use `object_store::memory::InMemory`)
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Connect to the GCS bucket using ambient credentials
    /// (GOOGLE_APPLICATION_CREDENTIALS or instance metadata)
    pub fn gcs(bucket: &str) -> Result<Self, StorageError> {
        let store = GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(bucket)
            .build()?;
        Ok(Self {
            store: Arc::new(store),
        })
    }

    /// Fetch a single object as a UTF-8 string
    pub async fn fetch_string(&self, remote: &str) -> Result<String, StorageError> {
        let path = ObjectPath::from(remote);
        let result = self.store.get(&path).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => StorageError::NotFound(remote.to_string()),
            other => StorageError::Store(other),
        })?;
        let bytes = result.bytes().await?;
        String::from_utf8(bytes.to_vec()).map_err(|e| StorageError::Invalid {
            path: remote.to_string(),
            message: format!("not valid UTF-8: {}", e),
        })
    }

    /// Stream a single object into a local file
    pub async fn fetch_to_file(&self, remote: &str, local: &Path) -> Result<(), StorageError> {
        let path = ObjectPath::from(remote);
        let result = self.store.get(&path).await.map_err(|e| match e {
            object_store::Error::NotFound { .. } => StorageError::NotFound(remote.to_string()),
            other => StorageError::Store(other),
        })?;

        if let Some(parent) = local.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(local).await?;
        let mut stream = result.into_stream();
        while let Some(chunk) = stream.try_next().await? {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        tracing::debug!(remote, local = %local.display(), "Downloaded artifact");
        Ok(())
    }

    /// Download every object under `prefix` into `local_dir`, keeping the
    /// final path segment as the filename. Used for the encoder model
    /// directory (config.json, tokenizer.json, model.safetensors, ...).
    pub async fn fetch_prefix(&self, prefix: &str, local_dir: &Path) -> Result<usize, StorageError> {
        let prefix_path = ObjectPath::from(prefix);
        let objects: Vec<_> = self
            .store
            .list(Some(&prefix_path))
            .try_collect()
            .await?;

        if objects.is_empty() {
            return Err(StorageError::NotFound(prefix.to_string()));
        }

        tokio::fs::create_dir_all(local_dir).await?;

        let mut count = 0;
        for meta in objects {
            let Some(name) = meta.location.filename() else {
                continue;
            };
            self.fetch_to_file(meta.location.as_ref(), &local_dir.join(name))
                .await?;
            count += 1;
        }

        tracing::info!(prefix, files = count, dir = %local_dir.display(), "Downloaded model directory");
        Ok(count)
    }

    /// Fetch the cleaned (OCR-corrected) markdown body of a paper
    pub async fn document_markdown(&self, document_id: &str) -> Result<String, StorageError> {
        self.fetch_string(&format!("{}-corrected.mmd", document_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;
    use object_store::PutPayload;

    async fn seeded_store(objects: &[(&str, &str)]) -> ArtifactStore {
        let memory = InMemory::new();
        for (path, body) in objects {
            memory
                .put(
                    &ObjectPath::from(*path),
                    PutPayload::from(body.as_bytes().to_vec()),
                )
                .await
                .unwrap();
        }
        ArtifactStore::new(Arc::new(memory))
    }

    #[tokio::test]
    async fn test_fetch_string() {
        let store = seeded_store(&[("paper-1-corrected.mmd", "# Title\n\nbody")]).await;
        let md = store.document_markdown("paper-1").await.unwrap();
        assert_eq!(md, "# Title\n\nbody");
    }

    #[tokio::test]
    async fn test_fetch_string_not_found() {
        let store = seeded_store(&[]).await;
        let err = store.fetch_string("Index/sparse_index.db").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_fetch_to_file() {
        let store = seeded_store(&[("Index/sparse_index.db", "sqlite-bytes")]).await;
        let dir = tempfile::tempdir().unwrap();
        let local = dir.path().join("sparse_index.db");

        store
            .fetch_to_file("Index/sparse_index.db", &local)
            .await
            .unwrap();

        let contents = std::fs::read_to_string(&local).unwrap();
        assert_eq!(contents, "sqlite-bytes");
    }

    #[tokio::test]
    async fn test_fetch_prefix() {
        let store = seeded_store(&[
            ("Models/splade/config.json", "{}"),
            ("Models/splade/tokenizer.json", "{}"),
            ("Models/splade/model.safetensors", "weights"),
            ("Models/other/config.json", "{}"),
        ])
        .await;
        let dir = tempfile::tempdir().unwrap();

        let count = store
            .fetch_prefix("Models/splade", dir.path())
            .await
            .unwrap();

        assert_eq!(count, 3);
        assert!(dir.path().join("config.json").exists());
        assert!(dir.path().join("tokenizer.json").exists());
        assert!(dir.path().join("model.safetensors").exists());
        assert!(!dir.path().join("other").exists());
    }

    #[tokio::test]
    async fn test_fetch_prefix_empty_is_error() {
        let store = seeded_store(&[]).await;
        let dir = tempfile::tempdir().unwrap();
        let err = store.fetch_prefix("Models/missing", dir.path()).await;
        assert!(matches!(err, Err(StorageError::NotFound(_))));
    }
}
