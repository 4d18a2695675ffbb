use std::sync::Arc;

use serde_json::Value;

use crate::error::AppResult;
use domain::{
    auth::UserId,
    job::{ExternalJobId, GenerationJob, JobId, JobStatus},
    provider::ProviderKind,
};

#[derive(Debug, Clone)]
pub struct NewJobRecord {
    pub user_id: UserId,
    pub preset_id: String,
    pub external_job_id: ExternalJobId,
    pub provider: ProviderKind,
    pub model: String,
    pub prompt: String,
    pub request_params: Value,
    pub status: JobStatus,
    pub cost: i64,
    pub duration_sec: Option<f64>,
    pub aspect_ratio: Option<String>,
    pub generate_audio: Option<bool>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait JobStorePort: Send + Sync {
    async fn insert_job(&self, record: NewJobRecord) -> AppResult<GenerationJob>;

    async fn find_by_external_id(
        &self,
        user_id: &UserId,
        external_job_id: &ExternalJobId,
    ) -> AppResult<Option<GenerationJob>>;

    /// Writes a terminal status and output URL in one update. Returns false
    /// when no live row matched (deleted or already terminal), which callers
    /// treat as a no-op rather than an error.
    async fn mark_terminal(
        &self,
        user_id: &UserId,
        external_job_id: &ExternalJobId,
        status: JobStatus,
        output_url: Option<String>,
    ) -> AppResult<bool>;

    /// Newest-first page of the user's jobs plus the total count.
    async fn list_recent(
        &self,
        user_id: &UserId,
        limit: i64,
        offset: i64,
    ) -> AppResult<(Vec<GenerationJob>, i64)>;

    async fn set_title(
        &self,
        user_id: &UserId,
        job_id: JobId,
        title: &str,
    ) -> AppResult<Option<GenerationJob>>;

    /// Hard delete, cascading any derived library asset references.
    async fn delete_job(&self, user_id: &UserId, job_id: JobId) -> AppResult<bool>;

    /// Opens the serialized unit for counted pricing: a transaction holding
    /// a per-`(user, preset)` lock, with the user's run index already
    /// counted. Dropping the handle without `commit` rolls everything back,
    /// including any charge taken through it.
    async fn begin_counted_submission(
        &self,
        user_id: &UserId,
        preset_id: &str,
    ) -> AppResult<Box<dyn CountedSubmission>>;
}

#[async_trait::async_trait]
pub trait CountedSubmission: Send {
    /// 1-based index of the submission being attempted.
    fn run_index(&self) -> i64;

    /// Conditional charge inside the serialized unit. Returns the
    /// post-charge balance.
    async fn charge(&mut self, user_id: &UserId, amount: i64) -> AppResult<i64>;

    async fn insert_job(&mut self, record: NewJobRecord) -> AppResult<GenerationJob>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}

pub type DynJobStorePort = Arc<dyn JobStorePort>;
