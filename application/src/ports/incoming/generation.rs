use crate::{
    contracts::generation::{ReconcileOutcome, SubmitGenerationCommand, SubmissionReceipt},
    error::AppResult,
};
use domain::{
    auth::{AuthenticatedUser, UserId},
    job::{ExternalJobId, GenerationJob, JobId},
};

#[async_trait::async_trait]
pub trait SubmitGenerationUseCase: Send + Sync {
    async fn submit_generation(
        &self,
        user: &AuthenticatedUser,
        command: SubmitGenerationCommand,
    ) -> AppResult<SubmissionReceipt>;
}

#[async_trait::async_trait]
pub trait ReconcileJobUseCase: Send + Sync {
    async fn reconcile_job(
        &self,
        user_id: &UserId,
        external_job_id: &ExternalJobId,
    ) -> AppResult<ReconcileOutcome>;
}

#[async_trait::async_trait]
pub trait JobLibraryUseCase: Send + Sync {
    async fn rename_job(
        &self,
        user_id: &UserId,
        job_id: JobId,
        title: &str,
    ) -> AppResult<GenerationJob>;

    async fn delete_job(&self, user_id: &UserId, job_id: JobId) -> AppResult<()>;
}
