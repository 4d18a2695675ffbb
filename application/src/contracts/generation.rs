use domain::{
    job::{GenerationJob, JobStatus},
    provider::GenerationInputs,
};

/// Local file carried with a submission; uploaded to object storage before
/// the provider call for presets that require it.
#[derive(Debug, Clone)]
pub struct UploadedAsset {
    pub file_name: Option<String>,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct SubmitGenerationCommand {
    pub preset_id: String,
    pub scene: String,
    pub inputs: GenerationInputs,
    pub upload: Option<UploadedAsset>,
}

#[derive(Debug, Clone)]
pub struct SubmissionReceipt {
    pub job: GenerationJob,
    pub cost: i64,
    pub credits_left: i64,
    /// Present for counted-pricing presets.
    pub run_index: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct ReconcileOutcome {
    pub status: JobStatus,
    pub output_url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PromoRedemption {
    pub added: i64,
    pub credits: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone)]
pub struct AccountOverview {
    pub credits: i64,
    pub jobs: Vec<GenerationJob>,
    pub total_jobs: i64,
    pub page: PageRequest,
}
