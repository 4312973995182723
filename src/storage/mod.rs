//! Storage abstraction over named blob containers.
//!
//! Provides a unified interface for the five containers the pipeline talks
//! to (landing zone, quarantine, data, deletion requests, logs), backed by
//! Azure Blob Storage or the local filesystem. Clients are constructed
//! explicitly and injected into the orchestrator; there is no process-wide
//! storage state.

mod azure;
mod local;
mod retry;
mod url_parser;

pub use azure::AzureConfig;
pub use local::LocalConfig;
pub use retry::RetryPolicy;
pub use url_parser::BackendConfig;

use bytes::Bytes;
use futures::StreamExt;
use object_store::path::Path;
use object_store::{ObjectStore, PutPayload};
use std::borrow::Cow;
use std::sync::Arc;

use crate::emit;
use crate::error::StorageError;
use crate::metrics::events::{RequestStatus, StorageOperation, StorageRequest};

use retry::with_retry;

/// A reference-counted storage provider.
pub type StorageProviderRef = Arc<StorageProvider>;

/// Storage provider bound to one container (or local directory).
#[derive(Clone)]
pub struct StorageProvider {
    pub(crate) config: BackendConfig,
    pub(crate) object_store: Arc<dyn ObjectStore>,
    pub(crate) canonical_url: String,
    pub(crate) retry: RetryPolicy,
}

impl std::fmt::Debug for StorageProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "StorageProvider<{}>", self.canonical_url)
    }
}

impl StorageProvider {
    /// Create a storage provider for the given URL with the default retry
    /// policy.
    pub async fn for_url(url: &str) -> Result<Self, StorageError> {
        Self::for_url_with_retry(url, RetryPolicy::default()).await
    }

    /// Create a storage provider for the given URL.
    pub async fn for_url_with_retry(url: &str, retry: RetryPolicy) -> Result<Self, StorageError> {
        let config = BackendConfig::parse_url(url)?;

        match config {
            BackendConfig::Azure(config) => Self::construct_azure(config, retry).await,
            BackendConfig::Local(config) => Self::construct_local(config, retry).await,
        }
    }

    /// The canonical URL this provider is bound to.
    pub fn canonical_url(&self) -> &str {
        &self.canonical_url
    }

    /// Qualify a path with the configured key prefix.
    fn qualify_path<'a>(&self, path: &'a Path) -> Cow<'a, Path> {
        match self.config.key() {
            Some(prefix) => Cow::Owned(prefix.parts().chain(path.parts()).collect()),
            None => Cow::Borrowed(path),
        }
    }

    /// List all files in the container, as sorted paths relative to the
    /// configured key prefix.
    pub async fn list_files(&self) -> Result<Vec<String>, StorageError> {
        let result = self.list_files_inner().await;
        emit!(StorageRequest {
            operation: StorageOperation::List,
            status: RequestStatus::from_result(&result),
        });
        result
    }

    async fn list_files_inner(&self) -> Result<Vec<String>, StorageError> {
        let key_path: Option<Path> = self.config.key().map(|key| key.to_string().into());
        let key_part_count = key_path
            .as_ref()
            .map(|key| key.parts().count())
            .unwrap_or_default();

        let mut stream = self.object_store.list(key_path.as_ref());
        let mut files = Vec::new();

        while let Some(result) = stream.next().await {
            match result {
                Ok(meta) => {
                    // Strip the prefix so callers get container-relative paths.
                    let relative: Path = meta.location.parts().skip(key_part_count).collect();
                    files.push(relative.to_string());
                }
                Err(source) => return Err(StorageError::ObjectStore { source }),
            }
        }

        files.sort();
        Ok(files)
    }

    /// Get the contents of a file. Transient failures are retried.
    pub async fn get(&self, path: &str) -> Result<Bytes, StorageError> {
        let qualified = self.qualify_path(&Path::from(path)).into_owned();
        let result = with_retry(&self.retry, "get", || {
            let qualified = qualified.clone();
            async move { self.object_store.get(&qualified).await?.bytes().await }
        })
        .await;

        emit!(StorageRequest {
            operation: StorageOperation::Get,
            status: RequestStatus::from_result(&result),
        });
        result
    }

    /// Get the contents of a file, or `None` if it does not exist.
    pub async fn get_opt(&self, path: &str) -> Result<Option<Bytes>, StorageError> {
        match self.get(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Put bytes to a path. Transient failures are retried.
    pub async fn put(&self, path: &str, content: Vec<u8>) -> Result<(), StorageError> {
        let qualified = self.qualify_path(&Path::from(path)).into_owned();
        let bytes = Bytes::from(content);
        let result = with_retry(&self.retry, "put", || {
            let qualified = qualified.clone();
            let payload = PutPayload::from(bytes.clone());
            async move { self.object_store.put(&qualified, payload).await.map(|_| ()) }
        })
        .await;

        emit!(StorageRequest {
            operation: StorageOperation::Put,
            status: RequestStatus::from_result(&result),
        });
        result
    }

    /// Delete a file at the given path. Transient failures are retried.
    pub async fn delete(&self, path: &str) -> Result<(), StorageError> {
        let qualified = self.qualify_path(&Path::from(path)).into_owned();
        let result = with_retry(&self.retry, "delete", || {
            let qualified = qualified.clone();
            async move { self.object_store.delete(&qualified).await }
        })
        .await;

        emit!(StorageRequest {
            operation: StorageOperation::Delete,
            status: RequestStatus::from_result(&result),
        });
        result
    }

    /// Server-side rename (move) operation.
    pub async fn rename(&self, from: &str, to: &str) -> Result<(), StorageError> {
        let from_qualified = self.qualify_path(&Path::from(from)).into_owned();
        let to_qualified = self.qualify_path(&Path::from(to)).into_owned();
        let result = with_retry(&self.retry, "rename", || {
            let from_qualified = from_qualified.clone();
            let to_qualified = to_qualified.clone();
            async move {
                self.object_store
                    .rename(&from_qualified, &to_qualified)
                    .await
            }
        })
        .await;

        emit!(StorageRequest {
            operation: StorageOperation::Rename,
            status: RequestStatus::from_result(&result),
        });
        result
    }

    /// Atomically write content to a path using temp file + rename.
    ///
    /// The target is never partially written: content goes to `{path}.tmp`
    /// first, then the temp object is renamed over the target. If either step
    /// fails, the original object (if any) is unchanged.
    pub async fn atomic_write(&self, path: &str, content: Vec<u8>) -> Result<(), StorageError> {
        let temp_path = format!("{path}.tmp");
        self.put(&temp_path, content).await?;
        self.rename(&temp_path, path).await
    }
}
