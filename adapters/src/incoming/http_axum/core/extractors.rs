use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};

use domain::auth::AuthenticatedUser;
use reelforge_application::error::AppError;

use crate::incoming::http_axum::error_mapper::HttpError;
use crate::shared::app_state::AppState;

/// Bearer-token authentication: the token goes to the identity service on
/// every request, nothing is cached locally.
pub struct CurrentUser(pub AuthenticatedUser);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = HttpError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| HttpError(AppError::Unauthorized))?;

        let user = state
            .identity
            .verify_bearer(bearer.token())
            .await
            .map_err(HttpError)?;
        Ok(Self(user))
    }
}
