use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// USD-to-credit conversion used by duration-priced models.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CreditExchange {
    pub usd_per_credit: f64,
}

impl Default for CreditExchange {
    fn default() -> Self {
        Self {
            usd_per_credit: 0.10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTier {
    pub bucket: String,
    pub credits: i64,
}

/// How a preset converts request parameters into a credit cost.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PricingStrategy {
    /// Same cost for every call.
    Flat { credits: i64 },
    /// Cost keyed by a discrete size/resolution bucket, multiplied by the
    /// requested output count.
    Tiered {
        tiers: Vec<PriceTier>,
        default_credits: i64,
    },
    /// Linear cost from duration at a provider USD-per-second rate,
    /// converted through the exchange rate, rounded up, floored at 1.
    PerSecondUsd { usd_per_second: f64 },
    /// Every `every`-th call under the same preset is free; the rest cost
    /// `paid_credits`. Needs the caller's run index, counted under the same
    /// serialized unit as the charge.
    EveryNthFree { every: u32, paid_credits: i64 },
}

impl PricingStrategy {
    pub fn requires_run_index(&self) -> bool {
        matches!(self, Self::EveryNthFree { .. })
    }
}

/// Priced dimensions extracted from a validated request.
#[derive(Debug, Clone, Default)]
pub struct QuoteInputs {
    pub duration_sec: Option<f64>,
    pub size_bucket: Option<String>,
    pub output_count: Option<i64>,
    /// 1-based position of this call among the user's jobs for the preset.
    pub run_index: Option<i64>,
}

/// Deterministic cost computation; runs before any charge is attempted.
pub fn quote(
    strategy: &PricingStrategy,
    inputs: &QuoteInputs,
    exchange: CreditExchange,
) -> DomainResult<i64> {
    match strategy {
        PricingStrategy::Flat { credits } => Ok(*credits),
        PricingStrategy::Tiered {
            tiers,
            default_credits,
        } => {
            let per_output = inputs
                .size_bucket
                .as_deref()
                .and_then(|bucket| {
                    tiers
                        .iter()
                        .find(|tier| tier.bucket.eq_ignore_ascii_case(bucket))
                })
                .map_or(*default_credits, |tier| tier.credits);
            let count = inputs.output_count.unwrap_or(1).max(1);
            Ok(per_output * count)
        }
        PricingStrategy::PerSecondUsd { usd_per_second } => {
            let duration = inputs.duration_sec.ok_or_else(|| {
                DomainError::InvalidParameters("duration is required for this model".to_string())
            })?;
            if duration <= 0.0 || !duration.is_finite() {
                return Err(DomainError::InvalidParameters(format!(
                    "duration must be a positive number of seconds, got {duration}"
                )));
            }
            let usd = duration * usd_per_second;
            let credits = (usd / exchange.usd_per_credit).ceil() as i64;
            Ok(credits.max(1))
        }
        PricingStrategy::EveryNthFree {
            every,
            paid_credits,
        } => {
            let run_index = inputs.run_index.ok_or_else(|| {
                DomainError::InvalidParameters(
                    "run index is required for counted pricing".to_string(),
                )
            })?;
            if *every == 0 {
                return Err(DomainError::ConfigError {
                    message: "counted pricing interval must be at least 1".to_string(),
                });
            }
            if run_index % i64::from(*every) == 0 {
                Ok(0)
            } else {
                Ok(*paid_credits)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn exchange() -> CreditExchange {
        CreditExchange {
            usd_per_credit: 0.10,
        }
    }

    #[test]
    fn flat_cost_ignores_inputs() {
        let cost = quote(
            &PricingStrategy::Flat { credits: 6 },
            &QuoteInputs::default(),
            exchange(),
        )
        .unwrap();
        assert_eq!(cost, 6);
    }

    #[test]
    fn tiered_cost_multiplies_by_output_count() {
        let strategy = PricingStrategy::Tiered {
            tiers: vec![
                PriceTier {
                    bucket: "2K".into(),
                    credits: 2,
                },
                PriceTier {
                    bucket: "4K".into(),
                    credits: 4,
                },
            ],
            default_credits: 1,
        };
        let inputs = QuoteInputs {
            size_bucket: Some("4k".into()),
            output_count: Some(3),
            ..QuoteInputs::default()
        };
        assert_eq!(quote(&strategy, &inputs, exchange()).unwrap(), 12);
    }

    #[test]
    fn tiered_cost_falls_back_to_default_bucket() {
        let strategy = PricingStrategy::Tiered {
            tiers: vec![PriceTier {
                bucket: "4K".into(),
                credits: 4,
            }],
            default_credits: 1,
        };
        let inputs = QuoteInputs {
            size_bucket: Some("1K".into()),
            ..QuoteInputs::default()
        };
        assert_eq!(quote(&strategy, &inputs, exchange()).unwrap(), 1);
    }

    #[test]
    fn duration_cost_rounds_up_in_credits() {
        let strategy = PricingStrategy::PerSecondUsd {
            usd_per_second: 0.07,
        };
        let inputs = QuoteInputs {
            duration_sec: Some(5.0),
            ..QuoteInputs::default()
        };
        // 5s * $0.07 = $0.35 → 3.5 credits → 4
        assert_eq!(quote(&strategy, &inputs, exchange()).unwrap(), 4);
    }

    #[test]
    fn duration_cost_is_floored_at_one_credit() {
        let strategy = PricingStrategy::PerSecondUsd {
            usd_per_second: 0.001,
        };
        let inputs = QuoteInputs {
            duration_sec: Some(1.0),
            ..QuoteInputs::default()
        };
        assert_eq!(quote(&strategy, &inputs, exchange()).unwrap(), 1);
    }

    #[test]
    fn duration_cost_requires_a_positive_duration() {
        let strategy = PricingStrategy::PerSecondUsd {
            usd_per_second: 0.07,
        };
        assert!(quote(&strategy, &QuoteInputs::default(), exchange()).is_err());

        let inputs = QuoteInputs {
            duration_sec: Some(0.0),
            ..QuoteInputs::default()
        };
        assert!(quote(&strategy, &inputs, exchange()).is_err());
    }

    #[test]
    fn every_nth_run_is_free() {
        let strategy = PricingStrategy::EveryNthFree {
            every: 4,
            paid_credits: 1,
        };
        let cost_at = |run_index| {
            let inputs = QuoteInputs {
                run_index: Some(run_index),
                ..QuoteInputs::default()
            };
            quote(&strategy, &inputs, exchange()).unwrap()
        };
        assert_eq!(cost_at(1), 1);
        assert_eq!(cost_at(3), 1);
        assert_eq!(cost_at(4), 0);
        assert_eq!(cost_at(8), 0);
        assert_eq!(cost_at(9), 1);
    }

    #[test]
    fn counted_pricing_requires_a_run_index() {
        let strategy = PricingStrategy::EveryNthFree {
            every: 4,
            paid_credits: 1,
        };
        assert!(quote(&strategy, &QuoteInputs::default(), exchange()).is_err());
        assert!(strategy.requires_run_index());
    }
}
