use serde_json::Value;
use time::OffsetDateTime;

use crate::{auth::UserId, error::DomainError, provider::ProviderKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(pub i64);

/// Provider-assigned identifier for an in-flight generation request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExternalJobId(pub String);

impl ExternalJobId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
}

impl JobStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Starting => "starting",
            Self::Processing => "processing",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        match raw {
            "starting" => Ok(Self::Starting),
            "processing" => Ok(Self::Processing),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            other => Err(DomainError::InvalidJobStatus(other.to_string())),
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// One durable row per accepted provider submission.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    pub id: JobId,
    pub user_id: UserId,
    pub preset_id: String,
    pub external_job_id: Option<ExternalJobId>,
    pub provider: ProviderKind,
    pub model: String,
    pub prompt: String,
    pub request_params: Value,
    pub status: JobStatus,
    pub cost: i64,
    pub duration_sec: Option<f64>,
    pub aspect_ratio: Option<String>,
    pub generate_audio: Option<bool>,
    pub output_url: Option<String>,
    pub title: Option<String>,
    pub created_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn status_round_trips_through_text() {
        for status in [
            JobStatus::Starting,
            JobStatus::Processing,
            JobStatus::Succeeded,
            JobStatus::Failed,
        ] {
            assert_eq!(JobStatus::parse(status.as_str()).unwrap(), status);
        }
    }

    #[test]
    fn unknown_status_text_is_rejected() {
        assert!(JobStatus::parse("queued").is_err());
    }

    #[test]
    fn only_succeeded_and_failed_are_terminal() {
        assert!(!JobStatus::Starting.is_terminal());
        assert!(!JobStatus::Processing.is_terminal());
        assert!(JobStatus::Succeeded.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }
}
