use axum::{
    Json,
    extract::{Query, State},
};
use axum_valid::Valid;

use reelforge_application::{
    contracts::generation::PageRequest,
    ports::incoming::billing::BillingUseCase,
};

#[cfg(feature = "docs")]
use crate::incoming::http_axum::dto::responses::ApiResponseValue;
use crate::incoming::http_axum::{
    core::extractors::CurrentUser,
    dto::{
        requests::{PageQuery, RedeemPromoRequest},
        responses::{AccountOverviewResponse, ApiResponse, PromoResponse, UserSummary},
    },
    error_mapper::HttpError,
};
use crate::shared::app_state::AppState;

const DEFAULT_PAGE_SIZE: i64 = 50;

#[cfg_attr(feature = "docs", utoipa::path(
    get,
    path = "/me",
    params(
        ("limit" = Option<i64>, Query, description = "Page size, capped server-side"),
        ("offset" = Option<i64>, Query, description = "Rows to skip")
    ),
    responses(
        (status = 200, body = ApiResponseValue, description = "Balance and recent jobs"),
        (status = 401, description = "Missing or invalid bearer token")
    ),
    security(("bearer_auth" = [])),
    tag = "account",
    summary = "Account overview",
    description = "Returns the caller's identity, credit balance, and a newest-first page of generation jobs.",
    operation_id = "account_overview"
))]
pub async fn account_overview(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(page): Query<PageQuery>,
) -> Result<Json<ApiResponse<AccountOverviewResponse>>, HttpError> {
    let billing_uc: &dyn BillingUseCase = &*state.billing_service;
    let overview = billing_uc
        .account_overview(
            &user,
            PageRequest {
                limit: page.limit.unwrap_or(DEFAULT_PAGE_SIZE),
                offset: page.offset.unwrap_or(0),
            },
        )
        .await
        .map_err(HttpError)?;

    let summary = UserSummary {
        id: *user.id.as_uuid(),
        email: user.email,
    };
    Ok(Json(ApiResponse::success_with_data(Some(
        AccountOverviewResponse::from_overview(summary, overview),
    ))))
}

#[cfg_attr(feature = "docs", utoipa::path(
    post,
    path = "/me/promo",
    request_body = RedeemPromoRequest,
    responses(
        (status = 200, body = ApiResponseValue, description = "Credits added"),
        (status = 401, description = "Missing or invalid bearer token"),
        (status = 409, description = "Code already redeemed by this account"),
        (status = 422, description = "Unknown or malformed code")
    ),
    security(("bearer_auth" = [])),
    tag = "account",
    summary = "Redeem a promo code",
    description = "Grants the promo's credits exactly once per account.",
    operation_id = "redeem_promo"
))]
pub async fn redeem_promo(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Valid(Json(request)): Valid<Json<RedeemPromoRequest>>,
) -> Result<Json<ApiResponse<PromoResponse>>, HttpError> {
    let billing_uc: &dyn BillingUseCase = &*state.billing_service;
    let redemption = billing_uc
        .redeem_promo(&user, &request.code)
        .await
        .map_err(HttpError)?;

    Ok(Json(ApiResponse::success_with_data(Some(PromoResponse {
        added: redemption.added,
        credits: redemption.credits,
    }))))
}
