use std::sync::Arc;

use uuid::Uuid;

use crate::error::AppResult;
use domain::{auth::UserId, credits::CreditBalance};

/// Owner of the per-user balance. Charge and redeem must be atomic against
/// concurrent callers; serialization lives in the store, never in-process.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CreditLedgerPort: Send + Sync {
    /// Idempotent row creation with a zero balance.
    async fn ensure_account(&self, user_id: &UserId) -> AppResult<()>;

    async fn balance(&self, user_id: &UserId) -> AppResult<CreditBalance>;

    /// Atomically checks and decrements; fails with `InsufficientCredits`
    /// and no mutation when the balance cannot cover `amount`. Returns the
    /// post-charge balance.
    async fn charge(&self, user_id: &UserId, amount: i64) -> AppResult<i64>;

    /// Compensating increment, idempotent per `attempt_id`: retrying a
    /// refund for the same attempt never double-credits. Returns the
    /// post-refund balance.
    async fn refund(&self, user_id: &UserId, attempt_id: Uuid, amount: i64) -> AppResult<i64>;

    /// Appends a redemption record unique per `(user, code)` and increments
    /// the balance in one atomic unit; fails with `AlreadyRedeemed` on a
    /// repeat, leaving the balance untouched.
    async fn redeem_once(&self, user_id: &UserId, code: &str, amount: i64) -> AppResult<i64>;
}

pub type DynCreditLedgerPort = Arc<dyn CreditLedgerPort>;
