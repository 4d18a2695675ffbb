use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::{debug, instrument};

use domain::{
    job::{ExternalJobId, JobStatus},
    provider::{
        GenerationInputs, PollOutcome, PollQuery, ProviderAccept, ProviderKind, ProviderResult,
        SubmissionRequest,
    },
};
use reelforge_application::{
    error::{AppError, AppResult},
    infrastructure_config::{ApiKey, ProvidersConfig},
    ports::outgoing::provider_gateway::GenerationProviderPort,
};

use super::wire;

const PROVIDER: &str = "fal";

/// fal.ai's queue API. Submission posts to the full model path; status and
/// result endpoints are keyed by the model's first two path segments only.
pub struct FalQueueAdapter {
    http: reqwest::Client,
    base_url: String,
    api_key: ApiKey,
    submit_timeout: Duration,
    poll_timeout: Duration,
}

impl FalQueueAdapter {
    #[must_use]
    pub fn new(http: reqwest::Client, config: &ProvidersConfig) -> Self {
        let endpoint = config.endpoint(ProviderKind::FalQueue);
        Self {
            http,
            base_url: wire::trimmed_base(&endpoint.base_url),
            api_key: endpoint.api_key.clone(),
            submit_timeout: Duration::from_secs(config.submit_timeout_seconds),
            poll_timeout: Duration::from_secs(config.poll_timeout_seconds),
        }
    }

    fn auth_header(&self) -> String {
        format!("Key {}", self.api_key.expose())
    }

    async fn fetch_result(&self, model_base: &str, request_id: &str) -> AppResult<PollOutcome> {
        let url = format!("{}/{}/requests/{}", self.base_url, model_base, request_id);
        let response = self
            .http
            .get(&url)
            .header(AUTHORIZATION, self.auth_header())
            .timeout(self.poll_timeout)
            .send()
            .await
            .map_err(|e| wire::poll_send_error(PROVIDER, &e))?;

        let (status, raw) = wire::response_parts(PROVIDER, response).await?;
        if !status.is_success() {
            return Err(wire::transient(PROVIDER, status, &raw));
        }

        let payload: Value =
            serde_json::from_str(&raw).map_err(|e| wire::decode_error(PROVIDER, &e))?;
        Ok(PollOutcome::Succeeded(normalize_result(&payload)))
    }
}

#[derive(Deserialize)]
struct QueueAccept {
    request_id: String,
}

#[derive(Deserialize)]
struct QueueStatus {
    status: String,
}

#[async_trait::async_trait]
impl GenerationProviderPort for FalQueueAdapter {
    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn submit(&self, request: &SubmissionRequest) -> AppResult<ProviderAccept> {
        let body = build_input(&request.prompt, &request.inputs);

        let url = format!("{}/{}", self.base_url, request.model);
        let response = self
            .http
            .post(&url)
            .header(AUTHORIZATION, self.auth_header())
            .timeout(self.submit_timeout)
            .json(&body)
            .send()
            .await
            .map_err(|e| wire::submit_send_error(PROVIDER, &e))?;

        let (status, raw) = wire::response_parts(PROVIDER, response).await?;
        if !status.is_success() {
            return Err(wire::submission_error(PROVIDER, status, &raw));
        }

        let accept: QueueAccept =
            serde_json::from_str(&raw).map_err(|e| wire::decode_error(PROVIDER, &e))?;
        debug!(request_id = %accept.request_id, "queue submission accepted");
        Ok(ProviderAccept {
            external_job_id: ExternalJobId(accept.request_id),
            initial_status: JobStatus::Starting,
        })
    }

    #[instrument(skip(self, query), fields(request_id = %query.external_job_id.as_str()))]
    async fn poll(&self, query: &PollQuery) -> AppResult<PollOutcome> {
        let model_base = model_base(&query.model);
        let request_id = query.external_job_id.as_str();
        let url = format!(
            "{}/{}/requests/{}/status?logs=0",
            self.base_url, model_base, request_id
        );
        let response = self
            .http
            .get(&url)
            .header(AUTHORIZATION, self.auth_header())
            .timeout(self.poll_timeout)
            .send()
            .await
            .map_err(|e| wire::poll_send_error(PROVIDER, &e))?;

        let (status, raw) = wire::response_parts(PROVIDER, response).await?;
        // The queue briefly 404s right after submission and 409s during
        // internal handoffs; both mean "ask again later".
        if status.as_u16() == 404 || status.as_u16() == 409 || status.is_server_error() {
            return Err(wire::transient(PROVIDER, status, &raw));
        }
        if !status.is_success() {
            return Err(AppError::ExternalServiceError {
                message: format!("{PROVIDER} status check returned {status}: {raw}"),
            });
        }

        let queue_status: QueueStatus =
            serde_json::from_str(&raw).map_err(|e| wire::decode_error(PROVIDER, &e))?;

        match queue_status.status.as_str() {
            "COMPLETED" => self.fetch_result(&model_base, request_id).await,
            "IN_QUEUE" => Ok(PollOutcome::Pending(JobStatus::Starting)),
            _ => Ok(PollOutcome::Pending(JobStatus::Processing)),
        }
    }
}

/// Status and result URLs drop any model subpath: only the first two
/// segments identify the queue.
fn model_base(model: &str) -> String {
    model
        .split('/')
        .filter(|segment| !segment.is_empty())
        .take(2)
        .collect::<Vec<_>>()
        .join("/")
}

fn build_input(prompt: &str, inputs: &GenerationInputs) -> Value {
    let mut body = Map::new();
    if !prompt.is_empty() {
        body.insert("prompt".to_string(), json!(prompt));
    }
    if let Some(video_url) = &inputs.source_video_url {
        body.insert("video_url".to_string(), json!(video_url));
    }
    if let Some(image_url) = &inputs.source_image_url {
        body.insert("input_image_url".to_string(), json!(image_url));
    }
    if !inputs.reference_image_urls.is_empty() {
        body.insert(
            "image_urls".to_string(),
            json!(inputs.reference_image_urls),
        );
    }
    if let Some(duration) = inputs.duration_sec {
        // The queue API expects durations as whole-second strings.
        body.insert(
            "duration".to_string(),
            json!(format!("{}", duration.round() as i64)),
        );
    }
    if let Some(mode) = &inputs.mode {
        body.insert("mode".to_string(), json!(mode));
    }
    if let Some(seed) = inputs.seed {
        body.insert("seed".to_string(), json!(seed));
    }
    Value::Object(body)
}

/// Output shapes vary per model family; probe the known spots and fall
/// back through 3D asset URLs and the thumbnail.
fn normalize_result(payload: &Value) -> ProviderResult {
    let output_url = string_at(payload, &["video", "url"])
        .or_else(|| string_at(payload, &["video_url"]))
        .or_else(|| string_at(payload, &["url"]))
        .or_else(|| string_at(payload, &["output", "url"]))
        .or_else(|| string_at(payload, &["result", "url"]));
    let model_glb_url = string_at(payload, &["model_urls", "glb", "url"])
        .or_else(|| string_at(payload, &["model_glb", "url"]))
        .or_else(|| string_at(payload, &["glb", "url"]));
    let model_obj_url = string_at(payload, &["model_urls", "obj", "url"])
        .or_else(|| string_at(payload, &["model_obj", "url"]))
        .or_else(|| string_at(payload, &["obj", "url"]));
    let thumbnail_url = string_at(payload, &["thumbnail", "url"])
        .or_else(|| string_at(payload, &["preview", "url"]));

    ProviderResult {
        output_url,
        model_glb_url,
        model_obj_url,
        thumbnail_url,
    }
}

fn string_at(payload: &Value, path: &[&str]) -> Option<String> {
    let mut current = payload;
    for key in path {
        current = current.get(key)?;
    }
    current.as_str().map(str::to_string)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn model_base_strips_the_subpath() {
        assert_eq!(
            model_base("fal-ai/kling-video/o1/standard/video-to-video"),
            "fal-ai/kling-video"
        );
        assert_eq!(model_base("fal-ai/hunyuan3d-v3/image-to-3d"), "fal-ai/hunyuan3d-v3");
        assert_eq!(model_base("fal-ai/flux"), "fal-ai/flux");
    }

    #[test]
    fn video_results_pick_the_nested_url() {
        let payload = json!({
            "video": { "url": "https://fal.media/out.mp4" }
        });
        let result = normalize_result(&payload);
        assert_eq!(result.canonical_url(), Some("https://fal.media/out.mp4"));
    }

    #[test]
    fn mesh_results_keep_all_asset_formats() {
        let payload = json!({
            "model_urls": {
                "glb": { "url": "https://fal.media/mesh.glb" },
                "obj": { "url": "https://fal.media/mesh.obj" }
            },
            "thumbnail": { "url": "https://fal.media/thumb.png" }
        });
        let result = normalize_result(&payload);
        assert_eq!(result.canonical_url(), Some("https://fal.media/mesh.glb"));
        assert_eq!(result.assets().len(), 3);
    }

    #[test]
    fn duration_goes_on_the_wire_as_a_string() {
        let inputs = GenerationInputs {
            duration_sec: Some(5.0),
            source_video_url: Some("https://cdn.example/in.mp4".to_string()),
            ..GenerationInputs::default()
        };
        let body = build_input("edit the video", &inputs);
        assert_eq!(body["duration"], json!("5"));
        assert_eq!(body["video_url"], json!("https://cdn.example/in.mp4"));
    }
}
