use std::error::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};
use time::OffsetDateTime;

#[derive(Debug, Clone)]
pub struct CreditBalance {
    pub credits: i64,
    pub updated_at: OffsetDateTime,
}

impl CreditBalance {
    pub fn new(credits: i64, updated_at: OffsetDateTime) -> Self {
        Self {
            credits,
            updated_at,
        }
    }

    pub fn can_afford(&self, cost: i64) -> bool {
        self.credits >= cost
    }

    pub fn spend(&mut self, cost: i64, now: OffsetDateTime) -> Result<(), InsufficientCreditsError> {
        if self.credits < cost {
            return Err(InsufficientCreditsError {
                required: cost,
                available: self.credits,
            });
        }

        self.credits -= cost;
        self.updated_at = now;
        Ok(())
    }

    pub fn receive(&mut self, amount: i64, now: OffsetDateTime) {
        self.credits += amount;
        self.updated_at = now;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsufficientCreditsError {
    pub required: i64,
    pub available: i64,
}

impl Display for InsufficientCreditsError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(
            f,
            "Insufficient credits: required {}, available {}",
            self.required, self.available
        )
    }
}

impl Error for InsufficientCreditsError {}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn balance(credits: i64) -> CreditBalance {
        CreditBalance::new(credits, OffsetDateTime::UNIX_EPOCH)
    }

    #[test]
    fn spend_within_balance_succeeds() {
        let mut b = balance(10);
        b.spend(4, OffsetDateTime::UNIX_EPOCH).unwrap();
        assert_eq!(b.credits, 6);
    }

    #[test]
    fn spend_beyond_balance_fails_and_leaves_balance_untouched() {
        let mut b = balance(3);
        let err = b.spend(5, OffsetDateTime::UNIX_EPOCH).unwrap_err();
        assert_eq!(err.required, 5);
        assert_eq!(err.available, 3);
        assert_eq!(b.credits, 3);
    }

    #[test]
    fn refund_after_spend_restores_balance_exactly() {
        let mut b = balance(8);
        b.spend(8, OffsetDateTime::UNIX_EPOCH).unwrap();
        b.receive(8, OffsetDateTime::UNIX_EPOCH);
        assert_eq!(b.credits, 8);
    }
}
