use axum::{
    Json,
    extract::{Path, State},
};
use axum_valid::Valid;

use domain::job::{ExternalJobId, JobId};
use reelforge_application::ports::incoming::generation::{
    JobLibraryUseCase, ReconcileJobUseCase, SubmitGenerationUseCase,
};

#[cfg(feature = "docs")]
use crate::incoming::http_axum::dto::responses::ApiResponseValue;
use crate::incoming::http_axum::{
    core::extractors::CurrentUser,
    dto::{
        requests::{SetTitleRequest, SubmitGenerationRequest},
        responses::{ApiResponse, JobStatusResponse, JobSummary, SubmitGenerationResponse},
    },
    error_mapper::HttpError,
};
use crate::shared::app_state::AppState;

#[cfg_attr(feature = "docs", utoipa::path(
    post,
    path = "/generations",
    request_body = SubmitGenerationRequest,
    responses(
        (status = 200, body = ApiResponseValue, description = "Job accepted by the provider"),
        (status = 400, description = "Unknown preset or invalid parameters"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 402, description = "Not enough credits"),
        (status = 422, description = "Request validation failed"),
        (status = 502, description = "Provider rejected the submission; any charge was refunded")
    ),
    security(("bearer_auth" = [])),
    tag = "generations",
    summary = "Start a generation job",
    description = "Quotes the preset's price, charges the account, submits to the provider, and records the job. A rejected submission refunds the charge.",
    operation_id = "submit_generation"
))]
pub async fn submit_generation(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Valid(Json(request)): Valid<Json<SubmitGenerationRequest>>,
) -> Result<Json<ApiResponse<SubmitGenerationResponse>>, HttpError> {
    let command = request.into_command().map_err(HttpError)?;

    let submit_uc: &dyn SubmitGenerationUseCase = &*state.submit_service;
    let receipt = submit_uc
        .submit_generation(&user, command)
        .await
        .map_err(HttpError)?;

    Ok(Json(ApiResponse::success_with_data(Some(
        SubmitGenerationResponse::from(receipt),
    ))))
}

#[cfg_attr(feature = "docs", utoipa::path(
    get,
    path = "/generations/{external_job_id}",
    params(
        ("external_job_id" = String, Path, description = "Provider-assigned job handle")
    ),
    responses(
        (status = 200, body = ApiResponseValue, description = "Current job status"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "No such job for this user"),
        (status = 503, description = "Provider status temporarily unavailable")
    ),
    security(("bearer_auth" = [])),
    tag = "generations",
    summary = "Poll a job's status",
    description = "Queries the provider for the job's current state and persists any terminal transition.",
    operation_id = "get_generation_status"
))]
pub async fn get_generation_status(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(external_job_id): Path<String>,
) -> Result<Json<ApiResponse<JobStatusResponse>>, HttpError> {
    let reconcile_uc: &dyn ReconcileJobUseCase = &*state.reconcile_service;
    let outcome = reconcile_uc
        .reconcile_job(&user.id, &ExternalJobId(external_job_id))
        .await
        .map_err(HttpError)?;

    Ok(Json(ApiResponse::success_with_data(Some(JobStatusResponse {
        status: outcome.status.as_str().to_string(),
        output_url: outcome.output_url,
    }))))
}

#[cfg_attr(feature = "docs", utoipa::path(
    post,
    path = "/library/jobs/{job_id}/title",
    params(
        ("job_id" = i64, Path, description = "Job row id")
    ),
    request_body = SetTitleRequest,
    responses(
        (status = 200, body = ApiResponseValue, description = "Title updated"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "No such job for this user"),
        (status = 422, description = "Request validation failed")
    ),
    security(("bearer_auth" = [])),
    tag = "library",
    summary = "Rename a job",
    operation_id = "rename_job"
))]
pub async fn rename_job(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(job_id): Path<i64>,
    Valid(Json(request)): Valid<Json<SetTitleRequest>>,
) -> Result<Json<ApiResponse<JobSummary>>, HttpError> {
    let library_uc: &dyn JobLibraryUseCase = &*state.library_service;
    let job = library_uc
        .rename_job(&user.id, JobId(job_id), &request.title)
        .await
        .map_err(HttpError)?;

    Ok(Json(ApiResponse::success_with_data(Some(JobSummary::from(
        job,
    )))))
}

#[cfg_attr(feature = "docs", utoipa::path(
    delete,
    path = "/library/jobs/{job_id}",
    params(
        ("job_id" = i64, Path, description = "Job row id")
    ),
    responses(
        (status = 200, body = ApiResponseValue, description = "Job deleted"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 404, description = "No such job for this user")
    ),
    security(("bearer_auth" = [])),
    tag = "library",
    summary = "Delete a job",
    operation_id = "delete_job"
))]
pub async fn delete_job(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(job_id): Path<i64>,
) -> Result<Json<ApiResponse<serde_json::Value>>, HttpError> {
    let library_uc: &dyn JobLibraryUseCase = &*state.library_service;
    library_uc
        .delete_job(&user.id, JobId(job_id))
        .await
        .map_err(HttpError)?;

    Ok(Json(ApiResponse::success_with_data(Some(
        serde_json::json!({ "deleted": job_id }),
    ))))
}
