use serde::Serialize;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
#[cfg(feature = "docs")]
use utoipa::ToSchema;
use uuid::Uuid;

use domain::job::GenerationJob;
use reelforge_application::contracts::generation::{AccountOverview, SubmissionReceipt};

#[cfg_attr(feature = "docs", derive(ToSchema))]
#[cfg_attr(feature = "docs", schema(
    description = "Standard API response wrapper with success indicator, optional error message, and optional data payload",
    example = json!({
        "ok": true,
        "data": { "credits": 12 }
    })
))]
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    #[must_use]
    pub fn success_with_data(data: Option<T>) -> Self {
        Self {
            ok: true,
            error: None,
            data,
        }
    }
}

fn format_datetime(dt: OffsetDateTime) -> String {
    dt.format(&Rfc3339).unwrap_or_else(|_| dt.to_string())
}

#[cfg_attr(feature = "docs", derive(ToSchema))]
#[cfg_attr(feature = "docs", schema(
    description = "One generation job as stored in the library.",
    example = json!({
        "id": 42,
        "external_job_id": "pred-8c31",
        "preset_id": "kling_26",
        "provider": "replicate",
        "model": "kwaivgi/kling-v2.6",
        "status": "processing",
        "cost": 4,
        "created_at": "2026-08-02T10:15:30Z"
    })
))]
#[derive(Debug, Clone, Serialize)]
pub struct JobSummary {
    pub id: i64,
    pub external_job_id: Option<String>,
    pub preset_id: String,
    pub provider: String,
    pub model: String,
    pub prompt: String,
    pub status: String,
    pub cost: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_sec: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generate_audio: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub created_at: String,
}

impl From<GenerationJob> for JobSummary {
    fn from(job: GenerationJob) -> Self {
        Self {
            id: job.id.0,
            external_job_id: job.external_job_id.map(|id| id.0),
            preset_id: job.preset_id,
            provider: job.provider.as_str().to_string(),
            model: job.model,
            prompt: job.prompt,
            status: job.status.as_str().to_string(),
            cost: job.cost,
            duration_sec: job.duration_sec,
            aspect_ratio: job.aspect_ratio,
            generate_audio: job.generate_audio,
            output_url: job.output_url,
            title: job.title,
            created_at: format_datetime(job.created_at),
        }
    }
}

#[cfg_attr(feature = "docs", derive(ToSchema))]
#[cfg_attr(feature = "docs", schema(
    description = "Acceptance receipt for a generation submission.",
    example = json!({
        "job_id": "pred-8c31",
        "status": "starting",
        "provider": "replicate",
        "preset_id": "kling_26",
        "cost": 4,
        "credits_left": 8
    })
))]
#[derive(Debug, Clone, Serialize)]
pub struct SubmitGenerationResponse {
    pub job_id: String,
    pub status: String,
    pub provider: String,
    pub preset_id: String,
    pub cost: i64,
    pub credits_left: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_index: Option<i64>,
    pub job: JobSummary,
}

impl From<SubmissionReceipt> for SubmitGenerationResponse {
    fn from(receipt: SubmissionReceipt) -> Self {
        let job_id = receipt
            .job
            .external_job_id
            .as_ref()
            .map(|id| id.0.clone())
            .unwrap_or_default();
        Self {
            job_id,
            status: receipt.job.status.as_str().to_string(),
            provider: receipt.job.provider.as_str().to_string(),
            preset_id: receipt.job.preset_id.clone(),
            cost: receipt.cost,
            credits_left: receipt.credits_left,
            run_index: receipt.run_index,
            job: JobSummary::from(receipt.job),
        }
    }
}

#[cfg_attr(feature = "docs", derive(ToSchema))]
#[cfg_attr(feature = "docs", schema(
    description = "Current status of a job after reconciliation with its provider.",
    example = json!({
        "status": "succeeded",
        "output_url": "https://cdn.example/outputs/out.mp4"
    })
))]
#[derive(Debug, Clone, Serialize)]
pub struct JobStatusResponse {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_url: Option<String>,
}

#[cfg_attr(feature = "docs", derive(ToSchema))]
#[cfg_attr(feature = "docs", schema(
    description = "Account overview: identity, balance, and a newest-first page of jobs.",
    example = json!({
        "user": { "id": "6f9c9f5e-0000-0000-0000-000000000000", "email": "artist@example.com" },
        "credits": 12,
        "total_jobs": 120,
        "limit": 50,
        "offset": 0
    })
))]
#[derive(Debug, Clone, Serialize)]
pub struct AccountOverviewResponse {
    pub user: UserSummary,
    pub credits: i64,
    pub jobs: Vec<JobSummary>,
    pub total_jobs: i64,
    pub limit: i64,
    pub offset: i64,
}

#[cfg_attr(feature = "docs", derive(ToSchema))]
#[derive(Debug, Clone, Serialize)]
pub struct UserSummary {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl AccountOverviewResponse {
    #[must_use]
    pub fn from_overview(user: UserSummary, overview: AccountOverview) -> Self {
        Self {
            user,
            credits: overview.credits,
            jobs: overview.jobs.into_iter().map(JobSummary::from).collect(),
            total_jobs: overview.total_jobs,
            limit: overview.page.limit,
            offset: overview.page.offset,
        }
    }
}

#[cfg_attr(feature = "docs", derive(ToSchema))]
#[cfg_attr(feature = "docs", schema(
    description = "Result of a promo redemption.",
    example = json!({ "added": 10, "credits": 22 })
))]
#[derive(Debug, Clone, Serialize)]
pub struct PromoResponse {
    pub added: i64,
    pub credits: i64,
}

#[cfg(feature = "docs")]
pub type ApiResponseValue = ApiResponse<serde_json::Value>;
