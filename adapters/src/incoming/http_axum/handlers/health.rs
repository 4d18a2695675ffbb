use axum::{Json, extract::State};

#[cfg(feature = "docs")]
use crate::incoming::http_axum::dto::responses::ApiResponseValue;
use crate::incoming::http_axum::{dto::responses::ApiResponse, error_mapper::HttpError};
use crate::shared::app_state::AppState;

#[cfg_attr(feature = "docs", utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = ApiResponseValue,
         example = json!({
             "ok": true,
             "data": {
                 "environment": "development",
                 "presets": 8
             }
         })
        )
    ),
    tag = "system",
    summary = "Health check",
    description = "Liveness probe with environment name and preset catalog size.",
    operation_id = "health_check"
))]
pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<serde_json::Value>>, HttpError> {
    Ok(Json(ApiResponse::success_with_data(Some(
        serde_json::json!({
            "environment": state.config.environment.env,
            "presets": state.config.generation.presets.len()
        }),
    ))))
}
