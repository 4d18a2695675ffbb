use std::sync::Arc;

use crate::error::AppResult;
use domain::auth::AuthenticatedUser;

/// External identity provider: exchanges a bearer token for a user id and
/// email. Anything but a verified user is `Unauthorized`.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait IdentityPort: Send + Sync {
    async fn verify_bearer(&self, token: &str) -> AppResult<AuthenticatedUser>;
}

pub type DynIdentityPort = Arc<dyn IdentityPort>;
