//! Pipeline orchestration.
//!
//! Wires the five containers into the ingestion processor and the
//! standalone deletion pass.

mod processor;

pub use processor::IngestProcessor;

use std::sync::Arc;

use crate::config::Config;
use crate::error::StorageError;
use crate::storage::{StorageProvider, StorageProviderRef};

/// The five containers the pipeline talks to.
pub struct Containers {
    pub landing_zone: StorageProviderRef,
    pub quarantine: StorageProviderRef,
    pub data: StorageProviderRef,
    pub deletion_requests: StorageProviderRef,
    pub logs: StorageProviderRef,
}

impl Containers {
    /// Construct storage providers for every configured container URL.
    pub async fn from_config(config: &Config) -> Result<Self, StorageError> {
        let provider = |url: &str| {
            let url = url.to_string();
            let retry = config.retry.clone();
            async move {
                StorageProvider::for_url_with_retry(&url, retry)
                    .await
                    .map(Arc::new)
            }
        };

        Ok(Self {
            landing_zone: provider(&config.containers.landing_zone).await?,
            quarantine: provider(&config.containers.quarantine).await?,
            data: provider(&config.containers.data).await?,
            deletion_requests: provider(&config.containers.deletion_requests).await?,
            logs: provider(&config.containers.logs).await?,
        })
    }
}
