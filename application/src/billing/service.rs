use std::sync::Arc;
use tracing::{info, instrument};

use domain::{
    auth::{AuthenticatedUser, UserId},
    job::{GenerationJob, JobId},
};

use crate::{
    config::PromoSettings,
    contracts::generation::{AccountOverview, PageRequest, PromoRedemption},
    error::{AppError, AppResult},
    ports::{
        incoming::{billing::BillingUseCase, generation::JobLibraryUseCase},
        outgoing::{job_store::DynJobStorePort, ledger_store::DynCreditLedgerPort},
    },
};

const MAX_PAGE_SIZE: i64 = 100;

pub struct BillingServiceDeps {
    pub ledger: DynCreditLedgerPort,
    pub jobs: DynJobStorePort,
}

/// Account surface: promo redemption through the ledger's redeem-once
/// primitive, balance plus job history, and thin library CRUD.
pub struct BillingService {
    promo: PromoSettings,
    ledger: DynCreditLedgerPort,
    jobs: DynJobStorePort,
}

impl BillingService {
    pub fn new(promo: PromoSettings, deps: BillingServiceDeps) -> Arc<Self> {
        Arc::new(Self {
            promo,
            ledger: deps.ledger,
            jobs: deps.jobs,
        })
    }

    #[instrument(skip(self, user, code), fields(user_id = %user.id.as_uuid()))]
    pub async fn redeem(&self, user: &AuthenticatedUser, code: &str) -> AppResult<PromoRedemption> {
        let normalized = code.trim().to_ascii_uppercase();
        if normalized.is_empty() || normalized != self.promo.code.to_ascii_uppercase() {
            return Err(AppError::ValidationError {
                message: "Invalid promo code".to_string(),
            });
        }

        self.ledger.ensure_account(&user.id).await?;
        let credits = self
            .ledger
            .redeem_once(&user.id, &normalized, self.promo.credits)
            .await?;

        info!(added = self.promo.credits, "promo code redeemed");
        Ok(PromoRedemption {
            added: self.promo.credits,
            credits,
        })
    }

    #[instrument(skip(self, user), fields(user_id = %user.id.as_uuid()))]
    pub async fn overview(
        &self,
        user: &AuthenticatedUser,
        page: PageRequest,
    ) -> AppResult<AccountOverview> {
        let page = PageRequest {
            limit: page.limit.clamp(1, MAX_PAGE_SIZE),
            offset: page.offset.max(0),
        };

        self.ledger.ensure_account(&user.id).await?;
        let balance = self.ledger.balance(&user.id).await?;
        let (jobs, total_jobs) = self
            .jobs
            .list_recent(&user.id, page.limit, page.offset)
            .await?;

        Ok(AccountOverview {
            credits: balance.credits,
            jobs,
            total_jobs,
            page,
        })
    }
}

#[async_trait::async_trait]
impl BillingUseCase for BillingService {
    async fn redeem_promo(
        &self,
        user: &AuthenticatedUser,
        code: &str,
    ) -> AppResult<PromoRedemption> {
        self.redeem(user, code).await
    }

    async fn account_overview(
        &self,
        user: &AuthenticatedUser,
        page: PageRequest,
    ) -> AppResult<AccountOverview> {
        self.overview(user, page).await
    }
}

#[async_trait::async_trait]
impl JobLibraryUseCase for BillingService {
    async fn rename_job(
        &self,
        user_id: &UserId,
        job_id: JobId,
        title: &str,
    ) -> AppResult<GenerationJob> {
        let title = title.trim();
        if title.is_empty() {
            return Err(AppError::ValidationError {
                message: "title cannot be empty".to_string(),
            });
        }

        self.jobs
            .set_title(user_id, job_id, title)
            .await?
            .ok_or_else(|| AppError::NotFound {
                message: format!("no job {}", job_id.0),
            })
    }

    async fn delete_job(&self, user_id: &UserId, job_id: JobId) -> AppResult<()> {
        if self.jobs.delete_job(user_id, job_id).await? {
            Ok(())
        } else {
            Err(AppError::NotFound {
                message: format!("no job {}", job_id.0),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use time::OffsetDateTime;

    use domain::credits::CreditBalance;

    use super::*;
    use crate::ports::outgoing::{job_store::MockJobStorePort, ledger_store::MockCreditLedgerPort};

    fn promo() -> PromoSettings {
        PromoSettings {
            code: "WELCOME10".to_string(),
            credits: 10,
        }
    }

    fn user() -> AuthenticatedUser {
        AuthenticatedUser {
            id: UserId::new(),
            email: None,
        }
    }

    fn service(ledger: MockCreditLedgerPort, jobs: MockJobStorePort) -> Arc<BillingService> {
        BillingService::new(
            promo(),
            BillingServiceDeps {
                ledger: Arc::new(ledger),
                jobs: Arc::new(jobs),
            },
        )
    }

    #[tokio::test]
    async fn wrong_promo_code_is_rejected_without_touching_the_ledger() {
        let svc = service(MockCreditLedgerPort::new(), MockJobStorePort::new());

        let err = svc.redeem(&user(), "NOPE").await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError { .. }));
    }

    #[tokio::test]
    async fn promo_code_match_is_case_insensitive() {
        let mut ledger = MockCreditLedgerPort::new();
        ledger.expect_ensure_account().returning(|_| Ok(()));
        ledger
            .expect_redeem_once()
            .withf(|_, code, amount| code == "WELCOME10" && *amount == 10)
            .times(1)
            .returning(|_, _, _| Ok(12));

        let svc = service(ledger, MockJobStorePort::new());

        let redemption = svc.redeem(&user(), " welcome10 ").await.unwrap();
        assert_eq!(redemption.added, 10);
        assert_eq!(redemption.credits, 12);
    }

    #[tokio::test]
    async fn second_redemption_surfaces_already_redeemed() {
        let mut ledger = MockCreditLedgerPort::new();
        ledger.expect_ensure_account().returning(|_| Ok(()));
        ledger
            .expect_redeem_once()
            .returning(|_, _, _| Err(AppError::AlreadyRedeemed));

        let svc = service(ledger, MockJobStorePort::new());

        let err = svc.redeem(&user(), "WELCOME10").await.unwrap_err();
        assert!(matches!(err, AppError::AlreadyRedeemed));
    }

    #[tokio::test]
    async fn overview_clamps_the_page_size() {
        let mut ledger = MockCreditLedgerPort::new();
        ledger.expect_ensure_account().returning(|_| Ok(()));
        ledger
            .expect_balance()
            .returning(|_| Ok(CreditBalance::new(5, OffsetDateTime::UNIX_EPOCH)));

        let mut jobs = MockJobStorePort::new();
        jobs.expect_list_recent()
            .withf(|_, limit, offset| *limit == MAX_PAGE_SIZE && *offset == 0)
            .returning(|_, _, _| Ok((Vec::new(), 0)));

        let svc = service(ledger, jobs);

        let overview = svc
            .overview(
                &user(),
                PageRequest {
                    limit: 10_000,
                    offset: -5,
                },
            )
            .await
            .unwrap();
        assert_eq!(overview.credits, 5);
        assert_eq!(overview.total_jobs, 0);
    }

    #[tokio::test]
    async fn deleting_a_missing_job_is_not_found() {
        let mut jobs = MockJobStorePort::new();
        jobs.expect_delete_job().returning(|_, _| Ok(false));

        let svc = service(MockCreditLedgerPort::new(), jobs);

        let err = svc.delete_job(&UserId::new(), JobId(42)).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound { .. }));
    }

    #[tokio::test]
    async fn renaming_rejects_a_blank_title() {
        let svc = service(MockCreditLedgerPort::new(), MockJobStorePort::new());

        let err = svc
            .rename_job(&UserId::new(), JobId(1), "   ")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError { .. }));
    }
}
