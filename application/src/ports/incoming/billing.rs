use crate::{
    contracts::generation::{AccountOverview, PageRequest, PromoRedemption},
    error::AppResult,
};
use domain::auth::AuthenticatedUser;

#[async_trait::async_trait]
pub trait BillingUseCase: Send + Sync {
    async fn redeem_promo(
        &self,
        user: &AuthenticatedUser,
        code: &str,
    ) -> AppResult<PromoRedemption>;

    async fn account_overview(
        &self,
        user: &AuthenticatedUser,
        page: PageRequest,
    ) -> AppResult<AccountOverview>;
}
