use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
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

const PROVIDER: &str = "replicate";

/// Replicate's model-scoped predictions API. Submission targets the named
/// model; polling uses the global prediction handle.
pub struct ReplicateAdapter {
    http: reqwest::Client,
    base_url: String,
    api_key: ApiKey,
    submit_timeout: Duration,
    poll_timeout: Duration,
}

impl ReplicateAdapter {
    #[must_use]
    pub fn new(http: reqwest::Client, config: &ProvidersConfig) -> Self {
        let endpoint = config.endpoint(ProviderKind::Replicate);
        Self {
            http,
            base_url: wire::trimmed_base(&endpoint.base_url),
            api_key: endpoint.api_key.clone(),
            submit_timeout: Duration::from_secs(config.submit_timeout_seconds),
            poll_timeout: Duration::from_secs(config.poll_timeout_seconds),
        }
    }
}

#[derive(Serialize)]
struct PredictionInput<'a> {
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_image: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_image: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    aspect_ratio: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolution: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    size: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_images: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generate_audio: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    image_input: Vec<&'a str>,
}

#[derive(Serialize)]
struct PredictionBody<'a> {
    input: PredictionInput<'a>,
}

#[derive(Deserialize)]
struct PredictionResponse {
    id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    output: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[async_trait::async_trait]
impl GenerationProviderPort for ReplicateAdapter {
    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn submit(&self, request: &SubmissionRequest) -> AppResult<ProviderAccept> {
        let inputs = &request.inputs;
        let body = PredictionBody {
            input: PredictionInput {
                prompt: &request.prompt,
                start_image: inputs.source_image_url.as_deref(),
                end_image: inputs.end_image_url.as_deref(),
                duration: inputs.duration_sec,
                aspect_ratio: inputs.aspect_ratio.as_deref(),
                resolution: inputs.resolution.as_deref(),
                size: inputs.size.as_deref(),
                max_images: inputs.output_count,
                generate_audio: inputs.generate_audio,
                seed: inputs.seed,
                image_input: inputs.reference_image_urls.iter().map(String::as_str).collect(),
            },
        };

        let url = format!("{}/v1/models/{}/predictions", self.base_url, request.model);
        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose())
            .timeout(self.submit_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| wire::submit_send_error(PROVIDER, &e))?;

        let (status, raw) = wire::response_parts(PROVIDER, response).await?;
        if !status.is_success() {
            return Err(wire::submission_error(PROVIDER, status, &raw));
        }

        let prediction: PredictionResponse =
            serde_json::from_str(&raw).map_err(|e| wire::decode_error(PROVIDER, &e))?;
        let initial_status = prediction
            .status
            .as_deref()
            .map_or(JobStatus::Starting, map_status);

        debug!(prediction_id = %prediction.id, "prediction accepted");
        Ok(ProviderAccept {
            external_job_id: ExternalJobId(prediction.id),
            initial_status,
        })
    }

    #[instrument(skip(self, query), fields(prediction_id = %query.external_job_id.as_str()))]
    async fn poll(&self, query: &PollQuery) -> AppResult<PollOutcome> {
        let url = format!(
            "{}/v1/predictions/{}",
            self.base_url,
            query.external_job_id.as_str()
        );
        let response = self
            .http
            .get(&url)
            .bearer_auth(self.api_key.expose())
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

        let prediction: PredictionResponse =
            serde_json::from_str(&raw).map_err(|e| wire::decode_error(PROVIDER, &e))?;

        match prediction.status.as_deref() {
            Some("succeeded") => Ok(PollOutcome::Succeeded(ProviderResult {
                output_url: first_output_url(prediction.output.as_ref()),
                ..ProviderResult::default()
            })),
            Some("failed") | Some("canceled") => Ok(PollOutcome::Failed {
                reason: prediction.error.map(|e| e.to_string()),
            }),
            Some(other) => Ok(PollOutcome::Pending(map_status(other))),
            None => Ok(PollOutcome::Pending(JobStatus::Processing)),
        }
    }
}

fn map_status(raw: &str) -> JobStatus {
    match raw {
        "starting" => JobStatus::Starting,
        "succeeded" => JobStatus::Succeeded,
        "failed" | "canceled" => JobStatus::Failed,
        _ => JobStatus::Processing,
    }
}

/// Predictions output either a single URL or an array of them.
fn first_output_url(output: Option<&Value>) -> Option<String> {
    match output? {
        Value::String(url) => Some(url.clone()),
        Value::Array(items) => items
            .iter()
            .find_map(|item| item.as_str().map(str::to_string)),
        _ => None,
    }
}
