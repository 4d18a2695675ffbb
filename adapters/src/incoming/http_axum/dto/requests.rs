use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
#[cfg(feature = "docs")]
use utoipa::ToSchema;
use validator::Validate;

use domain::provider::GenerationInputs;
use reelforge_application::{
    contracts::generation::{SubmitGenerationCommand, UploadedAsset},
    error::AppError,
};

#[cfg_attr(feature = "docs", derive(ToSchema))]
#[cfg_attr(feature = "docs", schema(
    description = "File attached to a submission, base64-encoded. Uploaded to object storage before the provider is called.",
    example = json!({
        "file_name": "clip.mp4",
        "content_type": "video/mp4",
        "data_base64": "AAAAIGZ0eXBpc29t"
    })
))]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadPayload {
    pub file_name: Option<String>,
    pub content_type: String,
    pub data_base64: String,
}

#[cfg_attr(feature = "docs", derive(ToSchema))]
#[cfg_attr(feature = "docs", schema(
    description = "Request to start a generation job from a preset. The scene text is substituted into the preset's prompt template; everything else is optional and falls back to preset defaults.",
    example = json!({
        "preset_id": "kling_26",
        "scene": "a lighthouse in a storm, waves crashing",
        "duration_sec": 5,
        "aspect_ratio": "16:9",
        "image_url": "https://cdn.example/start.jpg"
    })
))]
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SubmitGenerationRequest {
    #[cfg_attr(feature = "docs", schema(example = "kling_26"))]
    #[validate(length(min = 1, max = 64))]
    pub preset_id: String,
    #[serde(default)]
    #[validate(length(max = 2000))]
    pub scene: String,
    pub duration_sec: Option<f64>,
    pub aspect_ratio: Option<String>,
    pub resolution: Option<String>,
    pub size: Option<String>,
    #[validate(range(min = 1, max = 15))]
    pub max_images: Option<i64>,
    pub generate_audio: Option<bool>,
    pub seed: Option<i64>,
    #[validate(url)]
    pub image_url: Option<String>,
    #[validate(url)]
    pub end_image_url: Option<String>,
    #[validate(url)]
    pub video_url: Option<String>,
    #[serde(default)]
    pub reference_image_urls: Vec<String>,
    pub mode: Option<String>,
    pub upload: Option<UploadPayload>,
}

impl SubmitGenerationRequest {
    pub fn into_command(self) -> Result<SubmitGenerationCommand, AppError> {
        let upload = match self.upload {
            Some(payload) => {
                let bytes = BASE64.decode(payload.data_base64.as_bytes()).map_err(|_| {
                    AppError::InvalidParameters {
                        message: "upload data is not valid base64".to_string(),
                    }
                })?;
                Some(UploadedAsset {
                    file_name: payload.file_name,
                    content_type: payload.content_type,
                    bytes,
                })
            }
            None => None,
        };

        Ok(SubmitGenerationCommand {
            preset_id: self.preset_id,
            scene: self.scene,
            inputs: GenerationInputs {
                duration_sec: self.duration_sec,
                aspect_ratio: self.aspect_ratio,
                resolution: self.resolution,
                size: self.size,
                output_count: self.max_images,
                generate_audio: self.generate_audio,
                seed: self.seed,
                source_image_url: self.image_url,
                end_image_url: self.end_image_url,
                source_video_url: self.video_url,
                reference_image_urls: self.reference_image_urls,
                mode: self.mode,
            },
            upload,
        })
    }
}

#[cfg_attr(feature = "docs", derive(ToSchema))]
#[cfg_attr(feature = "docs", schema(
    description = "Promo code redemption request.",
    example = json!({ "code": "WELCOME10" })
))]
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct RedeemPromoRequest {
    #[validate(length(min = 1, max = 64))]
    pub code: String,
}

#[cfg_attr(feature = "docs", derive(ToSchema))]
#[cfg_attr(feature = "docs", schema(
    description = "New display title for a job in the library.",
    example = json!({ "title": "Lighthouse take 3" })
))]
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SetTitleRequest {
    #[validate(length(min = 1, max = 120))]
    pub title: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn base_request() -> SubmitGenerationRequest {
        serde_json::from_value(serde_json::json!({
            "preset_id": "kling_26",
            "scene": "a lighthouse in a storm"
        }))
        .unwrap()
    }

    #[test]
    fn upload_payload_decodes_from_base64() {
        let mut request = base_request();
        request.upload = Some(UploadPayload {
            file_name: Some("clip.mp4".to_string()),
            content_type: "video/mp4".to_string(),
            data_base64: BASE64.encode(b"fake video bytes"),
        });
        let command = request.into_command().unwrap();
        assert_eq!(command.upload.unwrap().bytes, b"fake video bytes");
    }

    #[test]
    fn broken_base64_is_rejected() {
        let mut request = base_request();
        request.upload = Some(UploadPayload {
            file_name: None,
            content_type: "video/mp4".to_string(),
            data_base64: "not base64 !!!".to_string(),
        });
        assert!(request.into_command().is_err());
    }

    #[test]
    fn missing_optional_fields_default_cleanly() {
        let command = base_request().into_command().unwrap();
        assert_eq!(command.preset_id, "kling_26");
        assert!(command.inputs.source_image_url.is_none());
        assert!(command.inputs.reference_image_urls.is_empty());
    }
}
