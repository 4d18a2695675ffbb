use std::time::Duration;

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

const PROVIDER: &str = "runway";
const API_VERSION: &str = "2024-11-06";

const ALLOWED_RATIOS: [&str; 8] = [
    "1280:720", "720:1280", "1104:832", "960:960", "832:832", "1584:672", "848:480", "640:480",
];

/// Runway's task API: each model has its own submission endpoint, while
/// status for all of them lives under `/v1/tasks`.
pub struct RunwayAdapter {
    http: reqwest::Client,
    base_url: String,
    api_key: ApiKey,
    submit_timeout: Duration,
    poll_timeout: Duration,
}

impl RunwayAdapter {
    #[must_use]
    pub fn new(http: reqwest::Client, config: &ProvidersConfig) -> Self {
        let endpoint = config.endpoint(ProviderKind::Runway);
        Self {
            http,
            base_url: wire::trimmed_base(&endpoint.base_url),
            api_key: endpoint.api_key.clone(),
            submit_timeout: Duration::from_secs(config.submit_timeout_seconds),
            poll_timeout: Duration::from_secs(config.poll_timeout_seconds),
        }
    }

    async fn post_task(&self, url: &str, body: &serde_json::Value) -> AppResult<ProviderAccept> {
        let response = self
            .http
            .post(url)
            .bearer_auth(self.api_key.expose())
            .header("X-Runway-Version", API_VERSION)
            .timeout(self.submit_timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| wire::submit_send_error(PROVIDER, &e))?;

        let (status, raw) = wire::response_parts(PROVIDER, response).await?;
        if !status.is_success() {
            return Err(wire::submission_error(PROVIDER, status, &raw));
        }

        let task: TaskHandle =
            serde_json::from_str(&raw).map_err(|e| wire::decode_error(PROVIDER, &e))?;
        debug!(task_id = %task.id, "task accepted");
        Ok(ProviderAccept {
            external_job_id: ExternalJobId(task.id),
            initial_status: JobStatus::Processing,
        })
    }
}

#[derive(Deserialize)]
struct TaskHandle {
    id: String,
}

#[derive(Deserialize)]
struct TaskStatus {
    status: String,
    #[serde(default)]
    output: Vec<String>,
    #[serde(default)]
    failure: Option<String>,
}

#[derive(Serialize)]
struct MediaRef<'a> {
    r#type: &'static str,
    uri: &'a str,
}

#[async_trait::async_trait]
impl GenerationProviderPort for RunwayAdapter {
    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn submit(&self, request: &SubmissionRequest) -> AppResult<ProviderAccept> {
        let inputs = &request.inputs;
        match request.model.as_str() {
            "gen4_aleph" => {
                let video_uri =
                    inputs
                        .source_video_url
                        .as_deref()
                        .ok_or_else(|| AppError::InvalidParameters {
                            message: "source video is required for video-to-video".to_string(),
                        })?;
                let ratio = normalize_ratio(inputs.aspect_ratio.as_deref());

                let mut body = serde_json::json!({
                    "model": "gen4_aleph",
                    "videoUri": video_uri,
                    "promptText": request.prompt,
                    "ratio": ratio,
                });
                if let Some(seed) = inputs.seed {
                    body["seed"] = serde_json::json!(seed);
                }
                if let Some(reference) = inputs.reference_image_urls.first() {
                    body["references"] = serde_json::json!([MediaRef {
                        r#type: "image",
                        uri: reference,
                    }]);
                }

                self.post_task(&format!("{}/v1/video_to_video", self.base_url), &body)
                    .await
            }
            "act_two" => {
                let character_uri =
                    inputs
                        .source_image_url
                        .as_deref()
                        .ok_or_else(|| AppError::InvalidParameters {
                            message: "character image is required for performance transfer"
                                .to_string(),
                        })?;
                let reference_uri =
                    inputs
                        .source_video_url
                        .as_deref()
                        .ok_or_else(|| AppError::InvalidParameters {
                            message: "reference video is required for performance transfer"
                                .to_string(),
                        })?;

                let mut body = serde_json::json!({
                    "model": "act_two",
                    "character": MediaRef { r#type: "image", uri: character_uri },
                    "reference": MediaRef { r#type: "video", uri: reference_uri },
                });
                if !request.prompt.is_empty() {
                    body["promptText"] = serde_json::json!(request.prompt);
                }

                self.post_task(
                    &format!("{}/v1/character_performance", self.base_url),
                    &body,
                )
                .await
            }
            other => Err(AppError::InvalidParameters {
                message: format!("unsupported runway model: {other}"),
            }),
        }
    }

    #[instrument(skip(self, query), fields(task_id = %query.external_job_id.as_str()))]
    async fn poll(&self, query: &PollQuery) -> AppResult<PollOutcome> {
        let url = format!("{}/v1/tasks/{}", self.base_url, query.external_job_id.as_str());
        let response = self
            .http
            .get(&url)
            .bearer_auth(self.api_key.expose())
            .header("X-Runway-Version", API_VERSION)
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

        let task: TaskStatus =
            serde_json::from_str(&raw).map_err(|e| wire::decode_error(PROVIDER, &e))?;

        match task.status.as_str() {
            "SUCCEEDED" => Ok(PollOutcome::Succeeded(ProviderResult {
                output_url: task.output.into_iter().next(),
                ..ProviderResult::default()
            })),
            "FAILED" | "CANCELLED" => Ok(PollOutcome::Failed {
                reason: task.failure,
            }),
            "PENDING" | "THROTTLED" => Ok(PollOutcome::Pending(JobStatus::Starting)),
            _ => Ok(PollOutcome::Pending(JobStatus::Processing)),
        }
    }
}

/// Runway only accepts an explicit set of pixel ratios; common aspect
/// shorthands get mapped, anything else falls back to landscape.
fn normalize_ratio(raw: Option<&str>) -> &str {
    let requested = match raw.map(str::trim) {
        Some("16:9") | None | Some("") => "1280:720",
        Some("9:16") => "720:1280",
        Some("1:1") => "960:960",
        Some(other) => other,
    };
    if ALLOWED_RATIOS.contains(&requested) {
        requested
    } else {
        "1280:720"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aspect_shorthands_map_to_pixel_ratios() {
        assert_eq!(normalize_ratio(Some("16:9")), "1280:720");
        assert_eq!(normalize_ratio(Some("9:16")), "720:1280");
        assert_eq!(normalize_ratio(Some("1:1")), "960:960");
    }

    #[test]
    fn exact_supported_ratios_pass_through() {
        assert_eq!(normalize_ratio(Some("1584:672")), "1584:672");
    }

    #[test]
    fn unknown_ratios_fall_back_to_landscape() {
        assert_eq!(normalize_ratio(Some("4:3")), "1280:720");
        assert_eq!(normalize_ratio(None), "1280:720");
    }
}
