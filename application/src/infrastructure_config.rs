use std::fmt::{Debug, Formatter, Result as FmtResult};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use domain::{
    preset::{DurationBounds, Preset, PresetDefaults},
    pricing::{PriceTier, PricingStrategy},
    provider::ProviderKind,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub db: DbConfig,
    pub identity: IdentityConfig,
    pub providers: ProvidersConfig,
    pub storage: StorageConfig,
    pub promo: PromoConfig,
    pub generation: GenerationConfig,
    pub logging: LoggingConfig,
    pub environment: EnvironmentConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub cors_origin: Option<String>,
}

/// Secret credential that never serializes its value.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl From<&str> for ApiKey {
    fn from(value: &str) -> Self {
        Self(SecretString::from(value))
    }
}

impl Debug for ApiKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("ApiKey([REDACTED])")
    }
}

impl Serialize for ApiKey {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str("[REDACTED]")
    }
}

impl<'de> Deserialize<'de> for ApiKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Ok(Self(SecretString::from(raw)))
    }
}

#[derive(Debug, Clone)]
pub struct DbConfig {
    pub database_url: SecretString,
    pub pool_size: u32,
    pub query_timeout_seconds: u64,
}

impl Serialize for DbConfig {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("DbConfig", 3)?;
        state.serialize_field("database_url", "[REDACTED]")?;
        state.serialize_field("pool_size", &self.pool_size)?;
        state.serialize_field("query_timeout_seconds", &self.query_timeout_seconds)?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for DbConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct DbConfigHelper {
            database_url: String,
            pool_size: u32,
            query_timeout_seconds: u64,
        }

        let helper = DbConfigHelper::deserialize(deserializer)?;
        Ok(DbConfig {
            database_url: SecretString::from(helper.database_url),
            pool_size: helper.pool_size,
            query_timeout_seconds: helper.query_timeout_seconds,
        })
    }
}

impl DbConfig {
    #[must_use]
    pub fn redacted_url(&self) -> String {
        let url_str = self.database_url.expose_secret();
        match url::Url::parse(url_str) {
            Ok(mut url) => {
                if url.password().is_some() {
                    url.set_password(Some("***")).ok();
                }
                url.to_string()
            }
            Err(_) => "[INVALID_URL]".to_string(),
        }
    }

    #[must_use]
    pub fn database_url(&self) -> &str {
        self.database_url.expose_secret()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityConfig {
    pub base_url: String,
    pub api_key: ApiKey,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderEndpointConfig {
    pub base_url: String,
    pub api_key: ApiKey,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    pub replicate: ProviderEndpointConfig,
    pub runway: ProviderEndpointConfig,
    pub freepik: ProviderEndpointConfig,
    pub fal: ProviderEndpointConfig,
    pub submit_timeout_seconds: u64,
    pub poll_timeout_seconds: u64,
}

impl ProvidersConfig {
    #[must_use]
    pub fn endpoint(&self, kind: ProviderKind) -> &ProviderEndpointConfig {
        match kind {
            ProviderKind::Replicate => &self.replicate,
            ProviderKind::Runway => &self.runway,
            ProviderKind::Freepik => &self.freepik,
            ProviderKind::FalQueue => &self.fal,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub base_url: String,
    pub bucket: String,
    pub api_key: ApiKey,
    pub mirror_outputs: bool,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromoConfig {
    pub code: String,
    pub credits: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub usd_per_credit: f64,
    pub fallback_scene: String,
    pub presets: Vec<Preset>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
    pub include_location: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum LogFormat {
    #[serde(rename = "json")]
    Json,
    #[serde(rename = "pretty")]
    Pretty,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub env: String,
}

fn default_presets() -> Vec<Preset> {
    vec![
        Preset {
            id: "kling_26".to_string(),
            provider: ProviderKind::Replicate,
            model: "kwaivgi/kling-v2.6".to_string(),
            prompt_template: "{scene}".to_string(),
            pricing: PricingStrategy::PerSecondUsd {
                usd_per_second: 0.07,
            },
            requires_source_image: true,
            requires_source_video: false,
            requires_upload: false,
            duration_bounds: Some(DurationBounds {
                min_sec: 3.0,
                max_sec: 10.0,
            }),
            defaults: PresetDefaults {
                duration_sec: Some(5.0),
                aspect_ratio: Some("16:9".to_string()),
                resolution: None,
                generate_audio: Some(false),
            },
        },
        Preset {
            id: "runway_aleph".to_string(),
            provider: ProviderKind::Runway,
            model: "gen4_aleph".to_string(),
            prompt_template: "{scene}".to_string(),
            pricing: PricingStrategy::PerSecondUsd {
                usd_per_second: 0.12,
            },
            requires_source_image: false,
            requires_source_video: true,
            requires_upload: false,
            duration_bounds: Some(DurationBounds {
                min_sec: 1.0,
                max_sec: 30.0,
            }),
            defaults: PresetDefaults {
                aspect_ratio: Some("1280:720".to_string()),
                ..PresetDefaults::default()
            },
        },
        Preset {
            id: "runway_act_two".to_string(),
            provider: ProviderKind::Runway,
            model: "act_two".to_string(),
            prompt_template: "{scene}".to_string(),
            pricing: PricingStrategy::PerSecondUsd {
                usd_per_second: 0.10,
            },
            requires_source_image: true,
            requires_source_video: true,
            requires_upload: false,
            duration_bounds: Some(DurationBounds {
                min_sec: 3.0,
                max_sec: 30.0,
            }),
            defaults: PresetDefaults::default(),
        },
        Preset {
            id: "seedream_4".to_string(),
            provider: ProviderKind::Replicate,
            model: "bytedance/seedream-4".to_string(),
            prompt_template: "{scene}, ultra detailed, cinematic lighting".to_string(),
            pricing: PricingStrategy::Tiered {
                tiers: vec![
                    PriceTier {
                        bucket: "1K".to_string(),
                        credits: 1,
                    },
                    PriceTier {
                        bucket: "2K".to_string(),
                        credits: 2,
                    },
                    PriceTier {
                        bucket: "4K".to_string(),
                        credits: 4,
                    },
                ],
                default_credits: 1,
            },
            requires_source_image: false,
            requires_source_video: false,
            requires_upload: false,
            duration_bounds: None,
            defaults: PresetDefaults::default(),
        },
        Preset {
            id: "z_image_turbo".to_string(),
            provider: ProviderKind::Replicate,
            model: "prunaai/z-image-turbo".to_string(),
            prompt_template: "{scene}".to_string(),
            pricing: PricingStrategy::EveryNthFree {
                every: 4,
                paid_credits: 1,
            },
            requires_source_image: false,
            requires_source_video: false,
            requires_upload: false,
            duration_bounds: None,
            defaults: PresetDefaults::default(),
        },
        Preset {
            id: "detail_boost".to_string(),
            provider: ProviderKind::Freepik,
            model: "image-upscaler".to_string(),
            prompt_template: "{scene}".to_string(),
            pricing: PricingStrategy::Flat { credits: 1 },
            requires_source_image: true,
            requires_source_video: false,
            requires_upload: false,
            duration_bounds: None,
            defaults: PresetDefaults::default(),
        },
        Preset {
            id: "kling_o1_edit".to_string(),
            provider: ProviderKind::FalQueue,
            model: "fal-ai/kling-video/o1/standard/video-to-video".to_string(),
            prompt_template: "{scene}".to_string(),
            pricing: PricingStrategy::PerSecondUsd {
                usd_per_second: 0.10,
            },
            requires_source_image: false,
            requires_source_video: true,
            requires_upload: true,
            duration_bounds: Some(DurationBounds {
                min_sec: 1.0,
                max_sec: 15.0,
            }),
            defaults: PresetDefaults {
                duration_sec: Some(5.0),
                ..PresetDefaults::default()
            },
        },
        Preset {
            id: "hunyuan3d_v3".to_string(),
            provider: ProviderKind::FalQueue,
            model: "fal-ai/hunyuan3d-v3/image-to-3d".to_string(),
            prompt_template: "{scene}".to_string(),
            pricing: PricingStrategy::Flat { credits: 6 },
            requires_source_image: true,
            requires_source_video: false,
            requires_upload: false,
            duration_bounds: None,
            defaults: PresetDefaults::default(),
        },
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 3000,
                cors_origin: None,
            },
            db: DbConfig {
                database_url: SecretString::from("postgresql://localhost/reelforge"),
                pool_size: 10,
                query_timeout_seconds: 10,
            },
            identity: IdentityConfig {
                base_url: "http://localhost:9999".to_string(),
                api_key: ApiKey::from(""),
                timeout_seconds: 5,
            },
            providers: ProvidersConfig {
                replicate: ProviderEndpointConfig {
                    base_url: "https://api.replicate.com".to_string(),
                    api_key: ApiKey::from(""),
                },
                runway: ProviderEndpointConfig {
                    base_url: "https://api.dev.runwayml.com".to_string(),
                    api_key: ApiKey::from(""),
                },
                freepik: ProviderEndpointConfig {
                    base_url: "https://api.freepik.com".to_string(),
                    api_key: ApiKey::from(""),
                },
                fal: ProviderEndpointConfig {
                    base_url: "https://queue.fal.run".to_string(),
                    api_key: ApiKey::from(""),
                },
                submit_timeout_seconds: 60,
                poll_timeout_seconds: 20,
            },
            storage: StorageConfig {
                base_url: "http://localhost:8000".to_string(),
                bucket: "generations".to_string(),
                api_key: ApiKey::from(""),
                mirror_outputs: true,
                timeout_seconds: 60,
            },
            promo: PromoConfig {
                code: "WELCOME10".to_string(),
                credits: 10,
            },
            generation: GenerationConfig {
                usd_per_credit: 0.10,
                fallback_scene: "a cinematic realistic shot, film-like contrast".to_string(),
                presets: default_presets(),
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
                format: LogFormat::Pretty,
                include_location: false,
            },
            environment: EnvironmentConfig {
                env: "development".to_string(),
            },
        }
    }
}

impl Config {
    pub fn validate(&self) -> AppResult<()> {
        if self.db.database_url.expose_secret().is_empty() {
            return Err(AppError::ConfigError {
                message: "database_url cannot be empty".to_string(),
            });
        }

        if self.db.pool_size == 0 {
            return Err(AppError::ConfigError {
                message: "db pool_size must be greater than 0".to_string(),
            });
        }

        if self.db.query_timeout_seconds == 0 {
            return Err(AppError::ConfigError {
                message: "query_timeout_seconds must be greater than 0".to_string(),
            });
        }

        if self.identity.base_url.trim().is_empty() {
            return Err(AppError::ConfigError {
                message: "identity base_url cannot be empty".to_string(),
            });
        }

        if self.providers.submit_timeout_seconds == 0 || self.providers.poll_timeout_seconds == 0 {
            return Err(AppError::ConfigError {
                message: "provider timeouts must be greater than 0".to_string(),
            });
        }

        if self.storage.bucket.trim().is_empty() {
            return Err(AppError::ConfigError {
                message: "storage bucket cannot be empty".to_string(),
            });
        }

        if self.promo.credits <= 0 {
            return Err(AppError::ConfigError {
                message: "promo credits must be greater than 0".to_string(),
            });
        }

        if self.generation.usd_per_credit <= 0.0 {
            return Err(AppError::ConfigError {
                message: "usd_per_credit must be greater than 0".to_string(),
            });
        }

        if self.generation.presets.is_empty() {
            return Err(AppError::ConfigError {
                message: "preset catalog cannot be empty".to_string(),
            });
        }

        for preset in &self.generation.presets {
            validate_preset(preset)?;
        }

        Ok(())
    }

    #[must_use]
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

fn validate_preset(preset: &Preset) -> AppResult<()> {
    if preset.id.trim().is_empty() || preset.model.trim().is_empty() {
        return Err(AppError::ConfigError {
            message: "preset id and model cannot be empty".to_string(),
        });
    }

    match &preset.pricing {
        PricingStrategy::Flat { credits } if *credits <= 0 => Err(AppError::ConfigError {
            message: format!("preset {}: flat cost must be greater than 0", preset.id),
        }),
        PricingStrategy::Tiered {
            tiers,
            default_credits,
        } if tiers.iter().any(|t| t.credits <= 0) || *default_credits <= 0 => {
            Err(AppError::ConfigError {
                message: format!("preset {}: tier costs must be greater than 0", preset.id),
            })
        }
        PricingStrategy::PerSecondUsd { usd_per_second } if *usd_per_second <= 0.0 => {
            Err(AppError::ConfigError {
                message: format!("preset {}: usd_per_second must be greater than 0", preset.id),
            })
        }
        PricingStrategy::EveryNthFree {
            every,
            paid_credits,
        } if *every == 0 || *paid_credits <= 0 => Err(AppError::ConfigError {
            message: format!("preset {}: counted pricing needs every >= 1 and a positive paid cost", preset.id),
        }),
        _ => {
            if let Some(bounds) = preset.duration_bounds {
                if bounds.min_sec <= 0.0 || bounds.max_sec < bounds.min_sec {
                    return Err(AppError::ConfigError {
                        message: format!("preset {}: invalid duration bounds", preset.id),
                    });
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn secrets_never_serialize_their_value() {
        let config = Config {
            providers: ProvidersConfig {
                replicate: ProviderEndpointConfig {
                    base_url: "https://api.replicate.com".to_string(),
                    api_key: ApiKey::from("r8_supersecret"),
                },
                ..Config::default().providers
            },
            ..Config::default()
        };
        let rendered = serde_json::to_string(&config).unwrap();
        assert!(!rendered.contains("r8_supersecret"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn zero_priced_preset_is_rejected() {
        let mut config = Config::default();
        config.generation.presets.push(Preset {
            id: "broken".to_string(),
            provider: ProviderKind::Replicate,
            model: "vendor/model".to_string(),
            prompt_template: "{scene}".to_string(),
            pricing: PricingStrategy::Flat { credits: 0 },
            requires_source_image: false,
            requires_source_video: false,
            requires_upload: false,
            duration_bounds: None,
            defaults: PresetDefaults::default(),
        });
        assert!(config.validate().is_err());
    }
}
