use sqlx::{PgPool, Row};
use time::OffsetDateTime;
use tracing::{debug, instrument};
use uuid::Uuid;

use domain::auth::UserId;
use domain::credits::CreditBalance;
use reelforge_application::{
    error::{AppError, AppResult},
    ports::outgoing::ledger_store::CreditLedgerPort,
};

use super::utils::{PostgresExecutor, begin_transaction, commit_transaction, is_unique_violation};

/// Ledger over `user_balances`. Atomicity comes from SQL shape: the charge
/// is a single conditional UPDATE, refunds are gated by a unique attempt-id
/// marker, and redemption rides a unique `(user_id, code)` constraint.
pub struct PostgresCreditLedgerAdapter {
    pool: PgPool,
    executor: PostgresExecutor,
}

impl PostgresCreditLedgerAdapter {
    pub fn new(pool: PgPool, query_timeout_secs: u64) -> Self {
        Self {
            pool,
            executor: PostgresExecutor::new(query_timeout_secs),
        }
    }
}

#[async_trait::async_trait]
impl CreditLedgerPort for PostgresCreditLedgerAdapter {
    #[instrument(skip(self))]
    async fn ensure_account(&self, user_id: &UserId) -> AppResult<()> {
        self.executor
            .execute_with_timeout(
                || {
                    sqlx::query(
                        r"
                    INSERT INTO user_balances (user_id, credits)
                    VALUES ($1, 0)
                    ON CONFLICT (user_id) DO NOTHING
                    ",
                    )
                    .bind(user_id.as_uuid())
                    .execute(&self.pool)
                },
                &format!("Failed to ensure balance row for user {}", user_id.as_uuid()),
            )
            .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn balance(&self, user_id: &UserId) -> AppResult<CreditBalance> {
        let row = self
            .executor
            .execute_with_timeout(
                || {
                    sqlx::query(
                        r"
                    SELECT credits, updated_at
                    FROM user_balances
                    WHERE user_id = $1
                    ",
                    )
                    .bind(user_id.as_uuid())
                    .fetch_optional(&self.pool)
                },
                &format!("Failed to read balance for user {}", user_id.as_uuid()),
            )
            .await?;

        match row {
            Some(record) => {
                let credits: i64 = record.try_get("credits").map_err(map_column_error)?;
                let updated_at: OffsetDateTime =
                    record.try_get("updated_at").map_err(map_column_error)?;
                Ok(CreditBalance::new(credits, updated_at))
            }
            None => Ok(CreditBalance::new(0, OffsetDateTime::now_utc())),
        }
    }

    #[instrument(skip(self))]
    async fn charge(&self, user_id: &UserId, amount: i64) -> AppResult<i64> {
        if amount <= 0 {
            return Err(AppError::InvalidParameters {
                message: "charge amount must be positive".to_string(),
            });
        }

        let row = self
            .executor
            .execute_with_timeout(
                || {
                    sqlx::query(
                        r"
                    UPDATE user_balances
                    SET credits = credits - $2, updated_at = now()
                    WHERE user_id = $1 AND credits >= $2
                    RETURNING credits
                    ",
                    )
                    .bind(user_id.as_uuid())
                    .bind(amount)
                    .fetch_optional(&self.pool)
                },
                &format!("Failed to charge user {}", user_id.as_uuid()),
            )
            .await?;

        match row {
            Some(record) => {
                let credits: i64 = record.try_get("credits").map_err(map_column_error)?;
                debug!(
                    "Charged {} credits from user {}, {} remaining",
                    amount,
                    user_id.as_uuid(),
                    credits
                );
                Ok(credits)
            }
            None => {
                let balance = self.balance(user_id).await?;
                Err(AppError::InsufficientCredits {
                    balance: balance.credits,
                    required: amount,
                })
            }
        }
    }

    #[instrument(skip(self))]
    async fn refund(&self, user_id: &UserId, attempt_id: Uuid, amount: i64) -> AppResult<i64> {
        let mut tx = begin_transaction(&self.pool).await?;

        // The marker insert decides whether this attempt has been refunded
        // before; a repeated call finds the row and leaves the balance alone.
        let marker = sqlx::query(
            r"
            INSERT INTO job_refunds (attempt_id, user_id, credits_returned)
            VALUES ($1, $2, $3)
            ON CONFLICT (attempt_id) DO NOTHING
            ",
        )
        .bind(attempt_id)
        .bind(user_id.as_uuid())
        .bind(amount)
        .execute(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError {
            message: format!("Failed to record refund marker: {}", e),
        })?;

        let credits: i64 = if marker.rows_affected() == 1 {
            let row = sqlx::query(
                r"
                UPDATE user_balances
                SET credits = credits + $2, updated_at = now()
                WHERE user_id = $1
                RETURNING credits
                ",
            )
            .bind(user_id.as_uuid())
            .bind(amount)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| AppError::DatabaseError {
                message: format!("Failed to apply refund: {}", e),
            })?;
            row.try_get("credits").map_err(map_column_error)?
        } else {
            debug!(%attempt_id, "refund already applied, skipping increment");
            let row = sqlx::query(r"SELECT credits FROM user_balances WHERE user_id = $1")
                .bind(user_id.as_uuid())
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| AppError::DatabaseError {
                    message: format!("Failed to read balance after refund: {}", e),
                })?;
            row.try_get("credits").map_err(map_column_error)?
        };

        commit_transaction(tx).await?;
        Ok(credits)
    }

    #[instrument(skip(self, code))]
    async fn redeem_once(&self, user_id: &UserId, code: &str, amount: i64) -> AppResult<i64> {
        let mut tx = begin_transaction(&self.pool).await?;

        sqlx::query(
            r"
            INSERT INTO promo_redemptions (user_id, code, credits_delta)
            VALUES ($1, $2, $3)
            ",
        )
        .bind(user_id.as_uuid())
        .bind(code)
        .bind(amount)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::AlreadyRedeemed
            } else {
                AppError::DatabaseError {
                    message: format!("Failed to record redemption: {}", e),
                }
            }
        })?;

        let row = sqlx::query(
            r"
            UPDATE user_balances
            SET credits = credits + $2, updated_at = now()
            WHERE user_id = $1
            RETURNING credits
            ",
        )
        .bind(user_id.as_uuid())
        .bind(amount)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError {
            message: format!("Failed to apply redemption: {}", e),
        })?;
        let credits: i64 = row.try_get("credits").map_err(map_column_error)?;

        commit_transaction(tx).await?;
        debug!(
            "Redeemed {} credits for user {}, balance now {}",
            amount,
            user_id.as_uuid(),
            credits
        );
        Ok(credits)
    }
}

fn map_column_error(err: sqlx::Error) -> AppError {
    AppError::DatabaseError {
        message: format!("Failed to decode balance row: {}", err),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use std::env;
    use std::sync::Arc;

    use sqlx::postgres::PgPoolOptions;

    use super::*;

    async fn adapter() -> Arc<PostgresCreditLedgerAdapter> {
        let url = env::var("DATABASE_URL").unwrap();
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(&url)
            .await
            .unwrap();
        sqlx::migrate!("../migrations").run(&pool).await.unwrap();
        Arc::new(PostgresCreditLedgerAdapter::new(pool, 10))
    }

    #[tokio::test(flavor = "multi_thread")]
    #[ignore = "needs a live Postgres via DATABASE_URL"]
    async fn concurrent_charges_never_overdraw() {
        let ledger = adapter().await;
        let user = UserId::new();
        ledger.ensure_account(&user).await.unwrap();
        ledger.refund(&user, Uuid::new_v4(), 10).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let ledger = Arc::clone(&ledger);
            let user = user.clone();
            handles.push(tokio::spawn(
                async move { ledger.charge(&user, 3).await },
            ));
        }

        let mut successes = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => successes += 1,
                Err(AppError::InsufficientCredits { .. }) => {}
                Err(other) => panic!("unexpected charge error: {other}"),
            }
        }

        // 10 credits fund exactly three 3-credit charges.
        assert_eq!(successes, 3);
        assert_eq!(ledger.balance(&user).await.unwrap().credits, 1);
    }
}
