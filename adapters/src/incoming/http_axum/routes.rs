use axum::{
    Router,
    routing::{delete, get, post},
};
#[cfg(feature = "docs")]
use utoipa::OpenApi;
#[cfg(feature = "docs")]
use utoipa_swagger_ui::SwaggerUi;

use crate::incoming::http_axum::handlers::{
    account::{account_overview, redeem_promo},
    generation::{delete_job, get_generation_status, rename_job, submit_generation},
    health::health_check,
};
use crate::shared::app_state::AppState;

#[cfg(feature = "docs")]
use crate::incoming::http_axum::docs::ApiDoc;

// Library CRUD lives under its own prefix: a second `/generations/{..}`
// route with a differently named parameter would conflict at registration.
pub fn build_application_router() -> Router<AppState> {
    let router = Router::new()
        .route("/health", get(health_check))
        .route("/me", get(account_overview))
        .route("/me/promo", post(redeem_promo))
        .route("/generations", post(submit_generation))
        .route("/generations/{external_job_id}", get(get_generation_status))
        .route("/library/jobs/{job_id}/title", post(rename_job))
        .route("/library/jobs/{job_id}", delete(delete_job));

    #[cfg(feature = "docs")]
    {
        router.merge(SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi()))
    }

    #[cfg(not(feature = "docs"))]
    {
        router
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Route registration panics on conflicting path parameters, so building
    // the router at all is the assertion.
    #[test]
    fn all_routes_register_without_conflict() {
        let _router = build_application_router();
    }
}
