use serde::{Deserialize, Serialize};

use crate::{error::DomainError, job::{ExternalJobId, JobStatus}};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Replicate,
    Runway,
    Freepik,
    FalQueue,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Replicate => "replicate",
            Self::Runway => "runway",
            Self::Freepik => "freepik",
            Self::FalQueue => "fal_queue",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        match raw {
            "replicate" => Ok(Self::Replicate),
            "runway" => Ok(Self::Runway),
            "freepik" => Ok(Self::Freepik),
            "fal_queue" => Ok(Self::FalQueue),
            other => Err(DomainError::UnknownProvider(other.to_string())),
        }
    }
}

/// Normalized generation parameters after request validation. Adapters
/// translate these into each provider's wire format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationInputs {
    pub duration_sec: Option<f64>,
    pub aspect_ratio: Option<String>,
    pub resolution: Option<String>,
    pub size: Option<String>,
    pub output_count: Option<i64>,
    pub generate_audio: Option<bool>,
    pub seed: Option<i64>,
    pub source_image_url: Option<String>,
    pub end_image_url: Option<String>,
    pub source_video_url: Option<String>,
    pub reference_image_urls: Vec<String>,
    pub mode: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub model: String,
    pub prompt: String,
    pub inputs: GenerationInputs,
}

/// What a provider hands back when it accepts a submission.
#[derive(Debug, Clone)]
pub struct ProviderAccept {
    pub external_job_id: ExternalJobId,
    pub initial_status: JobStatus,
}

/// Everything a status poll needs; queue-based providers key their status
/// endpoints by model as well as by the job handle.
#[derive(Debug, Clone)]
pub struct PollQuery {
    pub external_job_id: ExternalJobId,
    pub model: String,
}

#[derive(Debug, Clone)]
pub enum PollOutcome {
    Pending(JobStatus),
    Succeeded(ProviderResult),
    Failed { reason: Option<String> },
}

/// Terminal success payload, normalized across providers. A primary output
/// may be absent while alternate-format assets are present.
#[derive(Debug, Clone, Default)]
pub struct ProviderResult {
    pub output_url: Option<String>,
    pub model_glb_url: Option<String>,
    pub model_obj_url: Option<String>,
    pub thumbnail_url: Option<String>,
}

impl ProviderResult {
    /// Canonical output: primary URL, falling back through alternate
    /// formats and finally the thumbnail.
    pub fn canonical_url(&self) -> Option<&str> {
        self.output_url
            .as_deref()
            .or(self.model_glb_url.as_deref())
            .or(self.model_obj_url.as_deref())
            .or(self.thumbnail_url.as_deref())
    }

    /// All present assets with a short label, primary first.
    pub fn assets(&self) -> Vec<(&'static str, &str)> {
        let mut out = Vec::new();
        if let Some(url) = self.output_url.as_deref() {
            out.push(("output", url));
        }
        if let Some(url) = self.model_glb_url.as_deref() {
            out.push(("glb", url));
        }
        if let Some(url) = self.model_obj_url.as_deref() {
            out.push(("obj", url));
        }
        if let Some(url) = self.thumbnail_url.as_deref() {
            out.push(("thumbnail", url));
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.canonical_url().is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_url_prefers_primary_output() {
        let result = ProviderResult {
            output_url: Some("https://cdn.example/video.mp4".into()),
            thumbnail_url: Some("https://cdn.example/thumb.png".into()),
            ..ProviderResult::default()
        };
        assert_eq!(result.canonical_url(), Some("https://cdn.example/video.mp4"));
    }

    #[test]
    fn canonical_url_falls_back_to_alternate_formats() {
        let result = ProviderResult {
            model_obj_url: Some("https://cdn.example/mesh.obj".into()),
            ..ProviderResult::default()
        };
        assert_eq!(result.canonical_url(), Some("https://cdn.example/mesh.obj"));
    }

    #[test]
    fn empty_result_has_no_canonical_url() {
        assert!(ProviderResult::default().is_empty());
    }
}
