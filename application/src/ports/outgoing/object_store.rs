use std::sync::Arc;

use crate::error::AppResult;

/// Durable object storage with overwrite-on-retry semantics and stable
/// public URLs.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ObjectStorePort: Send + Sync {
    /// Uploads with upsert semantics and returns the public URL.
    async fn upload(&self, key: &str, content_type: &str, bytes: Vec<u8>) -> AppResult<String>;

    /// Downloads `source_url` and re-uploads it under `key`; idempotent per
    /// key. Returns the public URL of the mirrored copy.
    async fn mirror(&self, key: &str, source_url: &str) -> AppResult<String>;
}

pub type DynObjectStorePort = Arc<dyn ObjectStorePort>;
