use std::sync::Arc;

use domain::{preset::PresetCatalog, pricing::CreditExchange};

/// Runtime generation settings resolved once at bootstrap.
#[derive(Debug, Clone)]
pub struct GenerationSettings {
    pub catalog: Arc<PresetCatalog>,
    pub exchange: CreditExchange,
    pub fallback_scene: String,
    /// Re-host provider result assets in our own object storage.
    pub mirror_outputs: bool,
}

#[derive(Debug, Clone)]
pub struct PromoSettings {
    pub code: String,
    pub credits: i64,
}
