use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use tracing::{debug, instrument};

use reelforge_application::{
    error::{AppError, AppResult},
    infrastructure_config::StorageConfig,
    ports::outgoing::object_store::ObjectStorePort,
};

/// Bucket-backed object storage over a Supabase-style HTTP API. Uploads use
/// upsert so a retried key overwrites instead of erroring.
pub struct HttpObjectStoreAdapter {
    http: reqwest::Client,
    base_url: String,
    bucket: String,
    service_key: String,
    timeout: Duration,
}

impl HttpObjectStoreAdapter {
    #[must_use]
    pub fn new(http: reqwest::Client, config: &StorageConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            bucket: config.bucket.clone(),
            service_key: config.api_key.expose().to_string(),
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }

    fn public_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url, self.bucket, key
        )
    }
}

#[async_trait::async_trait]
impl ObjectStorePort for HttpObjectStoreAdapter {
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    async fn upload(&self, key: &str, content_type: &str, bytes: Vec<u8>) -> AppResult<String> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, self.bucket, key);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
            .header("x-upsert", "true")
            .header(CONTENT_TYPE, content_type)
            .timeout(self.timeout)
            .body(bytes)
            .send()
            .await
            .map_err(|e| AppError::StorageFailure {
                message: format!("upload request failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::StorageFailure {
                message: format!("upload returned {status}: {body}"),
            });
        }

        debug!(key, "object uploaded");
        Ok(self.public_url(key))
    }

    #[instrument(skip(self))]
    async fn mirror(&self, key: &str, source_url: &str) -> AppResult<String> {
        let response = self
            .http
            .get(source_url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AppError::StorageFailure {
                message: format!("source fetch failed: {e}"),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::StorageFailure {
                message: format!("source fetch returned {status}"),
            });
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::StorageFailure {
                message: format!("source read failed: {e}"),
            })?;

        self.upload(key, &content_type, bytes.to_vec()).await
    }
}
