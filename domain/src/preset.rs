use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{
    error::{DomainError, DomainResult},
    pricing::PricingStrategy,
    provider::ProviderKind,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationBounds {
    pub min_sec: f64,
    pub max_sec: f64,
}

impl DurationBounds {
    pub fn contains(&self, duration_sec: f64) -> bool {
        duration_sec >= self.min_sec && duration_sec <= self.max_sec
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PresetDefaults {
    pub duration_sec: Option<f64>,
    pub aspect_ratio: Option<String>,
    pub resolution: Option<String>,
    pub generate_audio: Option<bool>,
}

/// Named binding of a provider, model, pricing strategy, and input
/// requirements. The catalog is configuration, not data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Preset {
    pub id: String,
    pub provider: ProviderKind,
    pub model: String,
    #[serde(default = "default_prompt_template")]
    pub prompt_template: String,
    pub pricing: PricingStrategy,
    #[serde(default)]
    pub requires_source_image: bool,
    #[serde(default)]
    pub requires_source_video: bool,
    /// The request carries a local file that must be uploaded to object
    /// storage before the provider call.
    #[serde(default)]
    pub requires_upload: bool,
    #[serde(default)]
    pub duration_bounds: Option<DurationBounds>,
    #[serde(default)]
    pub defaults: PresetDefaults,
}

fn default_prompt_template() -> String {
    "{scene}".to_string()
}

impl Preset {
    pub fn render_prompt(&self, scene: &str, fallback_scene: &str) -> String {
        let scene = scene.trim();
        let scene = if scene.is_empty() { fallback_scene } else { scene };
        self.prompt_template.replace("{scene}", scene)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PresetCatalog {
    presets: HashMap<String, Preset>,
}

impl PresetCatalog {
    pub fn from_presets(presets: Vec<Preset>) -> DomainResult<Self> {
        let mut map = HashMap::with_capacity(presets.len());
        for preset in presets {
            if map.insert(preset.id.clone(), preset).is_some() {
                return Err(DomainError::ConfigError {
                    message: "duplicate preset id in catalog".to_string(),
                });
            }
        }
        Ok(Self { presets: map })
    }

    pub fn get(&self, preset_id: &str) -> Option<&Preset> {
        self.presets.get(preset_id)
    }

    pub fn len(&self) -> usize {
        self.presets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.presets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Preset> {
        self.presets.values()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::pricing::PricingStrategy;

    fn preset(id: &str) -> Preset {
        Preset {
            id: id.to_string(),
            provider: ProviderKind::Replicate,
            model: "vendor/model".to_string(),
            prompt_template: "{scene}, shot on 35mm film".to_string(),
            pricing: PricingStrategy::Flat { credits: 1 },
            requires_source_image: false,
            requires_source_video: false,
            requires_upload: false,
            duration_bounds: None,
            defaults: PresetDefaults::default(),
        }
    }

    #[test]
    fn prompt_template_substitutes_the_scene() {
        let rendered = preset("a").render_prompt("a foggy harbor", "fallback");
        assert_eq!(rendered, "a foggy harbor, shot on 35mm film");
    }

    #[test]
    fn blank_scene_uses_the_fallback() {
        let rendered = preset("a").render_prompt("   ", "cinematic realistic shot");
        assert_eq!(rendered, "cinematic realistic shot, shot on 35mm film");
    }

    #[test]
    fn catalog_rejects_duplicate_ids() {
        let result = PresetCatalog::from_presets(vec![preset("a"), preset("a")]);
        assert!(result.is_err());
    }

    #[test]
    fn duration_bounds_are_inclusive() {
        let bounds = DurationBounds {
            min_sec: 3.0,
            max_sec: 10.0,
        };
        assert!(bounds.contains(3.0));
        assert!(bounds.contains(10.0));
        assert!(!bounds.contains(10.5));
    }
}
