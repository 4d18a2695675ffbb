use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{AppError, AppResult};
use domain::provider::{PollOutcome, PollQuery, ProviderAccept, ProviderKind, SubmissionRequest};

/// One adapter per external provider; translates the normalized request
/// into the provider's wire format and its responses into our taxonomy, so
/// the dispatcher never special-cases a provider by name.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait GenerationProviderPort: Send + Sync {
    async fn submit(&self, request: &SubmissionRequest) -> AppResult<ProviderAccept>;

    /// Queue-based status poll. Transient provider trouble surfaces as
    /// `ProviderTransient`, never as job failure.
    async fn poll(&self, query: &PollQuery) -> AppResult<PollOutcome>;
}

pub type DynGenerationProviderPort = Arc<dyn GenerationProviderPort>;

/// Adapter lookup built once at bootstrap.
pub struct ProviderRegistry {
    adapters: HashMap<ProviderKind, DynGenerationProviderPort>,
}

impl ProviderRegistry {
    #[must_use]
    pub fn new(adapters: HashMap<ProviderKind, DynGenerationProviderPort>) -> Self {
        Self { adapters }
    }

    pub fn get(&self, kind: ProviderKind) -> AppResult<DynGenerationProviderPort> {
        self.adapters
            .get(&kind)
            .map(Arc::clone)
            .ok_or_else(|| AppError::ConfigError {
                message: format!("no adapter registered for provider {}", kind.as_str()),
            })
    }
}
