use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use domain::auth::{AuthenticatedUser, UserId};
use reelforge_application::{
    error::{AppError, AppResult},
    infrastructure_config::IdentityConfig,
    ports::outgoing::identity::IdentityPort,
};

/// Token verification against a GoTrue-style identity service: the bearer
/// token is forwarded as-is, the service answers with the user it belongs to.
pub struct HttpIdentityAdapter {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    timeout: Duration,
}

impl HttpIdentityAdapter {
    #[must_use]
    pub fn new(http: reqwest::Client, config: &IdentityConfig) -> Self {
        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            anon_key: config.api_key.expose().to_string(),
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }
}

#[derive(Deserialize)]
struct UserResponse {
    id: Uuid,
    #[serde(default)]
    email: Option<String>,
}

#[async_trait::async_trait]
impl IdentityPort for HttpIdentityAdapter {
    #[instrument(skip(self, token))]
    async fn verify_bearer(&self, token: &str) -> AppResult<AuthenticatedUser> {
        let url = format!("{}/auth/v1/user", self.base_url);
        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .header("apikey", &self.anon_key)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AppError::ExternalServiceError {
                message: format!("identity service unreachable: {e}"),
            })?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(AppError::Unauthorized);
        }
        if !status.is_success() {
            warn!(%status, "identity service returned an unexpected status");
            return Err(AppError::ExternalServiceError {
                message: format!("identity service returned {status}"),
            });
        }

        let user: UserResponse = response.json().await.map_err(|_| AppError::Unauthorized)?;
        debug!(user_id = %user.id, "bearer token verified");
        Ok(AuthenticatedUser {
            id: UserId(user.id),
            email: user.email,
        })
    }
}
