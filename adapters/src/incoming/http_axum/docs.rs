use crate::incoming::http_axum::{dto, handlers};
use dto::requests::{RedeemPromoRequest, SetTitleRequest, SubmitGenerationRequest, UploadPayload};
use dto::responses::{
    AccountOverviewResponse, JobStatusResponse, JobSummary, PromoResponse,
    SubmitGenerationResponse, UserSummary,
};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::account::account_overview,
        handlers::account::redeem_promo,
        handlers::generation::submit_generation,
        handlers::generation::get_generation_status,
        handlers::generation::rename_job,
        handlers::generation::delete_job,
    ),
    components(
        schemas(
            SubmitGenerationRequest,
            UploadPayload,
            RedeemPromoRequest,
            SetTitleRequest,
            SubmitGenerationResponse,
            JobSummary,
            JobStatusResponse,
            AccountOverviewResponse,
            UserSummary,
            PromoResponse,
        )
    ),
    tags(
        (name = "system", description = "Service health"),
        (name = "account", description = "Balance, promo codes, and the job library"),
        (name = "generations", description = "Submitting and polling generation jobs"),
        (name = "library", description = "Managing stored jobs")
    ),
    info(
        title = "Reelforge API",
        description = "Credit-metered generation jobs across external AI providers."
    )
)]
pub struct ApiDoc;
