use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use domain::{
    job::{ExternalJobId, JobStatus},
    provider::{PollOutcome, PollQuery, ProviderAccept, ProviderKind, ProviderResult, SubmissionRequest},
};
use reelforge_application::{
    error::{AppError, AppResult},
    infrastructure_config::{ApiKey, ProvidersConfig},
    ports::outgoing::provider_gateway::GenerationProviderPort,
};

use super::wire;

const PROVIDER: &str = "freepik";

/// Freepik's upscaler tasks. The API takes the source image inline as
/// base64, so submission first pulls the image down.
pub struct FreepikAdapter {
    http: reqwest::Client,
    base_url: String,
    api_key: ApiKey,
    submit_timeout: Duration,
    poll_timeout: Duration,
}

impl FreepikAdapter {
    #[must_use]
    pub fn new(http: reqwest::Client, config: &ProvidersConfig) -> Self {
        let endpoint = config.endpoint(ProviderKind::Freepik);
        Self {
            http,
            base_url: wire::trimmed_base(&endpoint.base_url),
            api_key: endpoint.api_key.clone(),
            submit_timeout: Duration::from_secs(config.submit_timeout_seconds),
            poll_timeout: Duration::from_secs(config.poll_timeout_seconds),
        }
    }

    async fn fetch_image_base64(&self, url: &str) -> AppResult<String> {
        let response = self
            .http
            .get(url)
            .timeout(self.submit_timeout)
            .send()
            .await
            .map_err(|e| wire::submit_send_error(PROVIDER, &e))?;

        if !response.status().is_success() {
            return Err(AppError::ProviderSubmissionFailed {
                details: format!(
                    "{PROVIDER}: source image fetch returned {}",
                    response.status()
                ),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| wire::submit_send_error(PROVIDER, &e))?;
        Ok(BASE64.encode(&bytes))
    }
}

#[derive(Serialize)]
struct UpscaleBody<'a> {
    image: String,
    scale_factor: &'static str,
    optimized_for: &'static str,
    prompt: &'a str,
    creativity: i32,
    hdr: i32,
    resemblance: i32,
    fractality: i32,
    engine: &'static str,
}

#[derive(Deserialize)]
struct TaskEnvelope {
    data: TaskData,
}

#[derive(Deserialize)]
struct TaskData {
    task_id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    generated: Vec<String>,
}

#[async_trait::async_trait]
impl GenerationProviderPort for FreepikAdapter {
    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn submit(&self, request: &SubmissionRequest) -> AppResult<ProviderAccept> {
        let source_url = request
            .inputs
            .source_image_url
            .as_deref()
            .ok_or_else(|| AppError::InvalidParameters {
                message: "source image is required for upscaling".to_string(),
            })?;
        let image = self.fetch_image_base64(source_url).await?;

        let scale_factor = match request.inputs.size.as_deref() {
            Some("4x") | Some("4K") => "4x",
            _ => "2x",
        };
        let body = UpscaleBody {
            image,
            scale_factor,
            optimized_for: "standard",
            prompt: &request.prompt,
            creativity: 1,
            hdr: 0,
            resemblance: 0,
            fractality: 0,
            engine: "magnific_sparkle",
        };

        let url = format!("{}/v1/ai/{}", self.base_url, request.model);
        let response = self
            .http
            .post(&url)
            .header("x-freepik-api-key", self.api_key.expose())
            .timeout(self.submit_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| wire::submit_send_error(PROVIDER, &e))?;

        let (status, raw) = wire::response_parts(PROVIDER, response).await?;
        if !status.is_success() {
            return Err(wire::submission_error(PROVIDER, status, &raw));
        }

        let envelope: TaskEnvelope =
            serde_json::from_str(&raw).map_err(|e| wire::decode_error(PROVIDER, &e))?;
        let initial_status = envelope
            .data
            .status
            .as_deref()
            .map_or(JobStatus::Starting, map_status);

        debug!(task_id = %envelope.data.task_id, "upscale task accepted");
        Ok(ProviderAccept {
            external_job_id: ExternalJobId(envelope.data.task_id),
            initial_status,
        })
    }

    #[instrument(skip(self, query), fields(task_id = %query.external_job_id.as_str()))]
    async fn poll(&self, query: &PollQuery) -> AppResult<PollOutcome> {
        let url = format!(
            "{}/v1/ai/{}/{}",
            self.base_url,
            query.model,
            query.external_job_id.as_str()
        );
        let response = self
            .http
            .get(&url)
            .header("x-freepik-api-key", self.api_key.expose())
            .timeout(self.poll_timeout)
            .send()
            .await
            .map_err(|e| wire::poll_send_error(PROVIDER, &e))?;

        let (status, raw) = wire::response_parts(PROVIDER, response).await?;
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(wire::transient(PROVIDER, status, &raw));
        }
        if !status.is_success() {
            return Err(AppError::ExternalServiceError {
                message: format!("{PROVIDER} status check returned {status}: {raw}"),
            });
        }

        let envelope: TaskEnvelope =
            serde_json::from_str(&raw).map_err(|e| wire::decode_error(PROVIDER, &e))?;

        match envelope.data.status.as_deref() {
            Some("COMPLETED") => Ok(PollOutcome::Succeeded(ProviderResult {
                output_url: envelope.data.generated.into_iter().next(),
                ..ProviderResult::default()
            })),
            Some("FAILED") => Ok(PollOutcome::Failed { reason: None }),
            Some(other) => Ok(PollOutcome::Pending(map_status(other))),
            None => Ok(PollOutcome::Pending(JobStatus::Processing)),
        }
    }
}

fn map_status(raw: &str) -> JobStatus {
    match raw {
        "CREATED" => JobStatus::Starting,
        "COMPLETED" => JobStatus::Succeeded,
        "FAILED" => JobStatus::Failed,
        _ => JobStatus::Processing,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_statuses_map_to_job_statuses() {
        assert_eq!(map_status("CREATED"), JobStatus::Starting);
        assert_eq!(map_status("IN_PROGRESS"), JobStatus::Processing);
        assert_eq!(map_status("COMPLETED"), JobStatus::Succeeded);
        assert_eq!(map_status("FAILED"), JobStatus::Failed);
    }
}
