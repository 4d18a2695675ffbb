use reqwest::StatusCode;

use reelforge_application::error::{AppError, AppResult};

const MAX_ERROR_BODY: usize = 600;

/// Splits a response into status and body so error mapping can quote the
/// provider's payload without re-reading the stream.
pub(crate) async fn response_parts(
    provider: &str,
    response: reqwest::Response,
) -> AppResult<(StatusCode, String)> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| AppError::ExternalServiceError {
            message: format!("{provider}: failed to read response body: {e}"),
        })?;
    Ok((status, body))
}

pub(crate) fn submission_error(provider: &str, status: StatusCode, body: &str) -> AppError {
    AppError::ProviderSubmissionFailed {
        details: format!("{provider} returned {status}: {}", clip(body)),
    }
}

/// Network trouble during submission counts as a failed submission, not a
/// transient condition: the dispatcher refunds on this path.
pub(crate) fn submit_send_error(provider: &str, err: &reqwest::Error) -> AppError {
    AppError::ProviderSubmissionFailed {
        details: format!("{provider}: request failed: {err}"),
    }
}

pub(crate) fn poll_send_error(provider: &str, err: &reqwest::Error) -> AppError {
    AppError::ProviderTransient {
        message: format!("{provider}: status request failed: {err}"),
    }
}

pub(crate) fn transient(provider: &str, status: StatusCode, body: &str) -> AppError {
    AppError::ProviderTransient {
        message: format!("{provider} returned {status}: {}", clip(body)),
    }
}

pub(crate) fn decode_error(provider: &str, err: &serde_json::Error) -> AppError {
    AppError::ExternalServiceError {
        message: format!("{provider}: unexpected response shape: {err}"),
    }
}

pub(crate) fn trimmed_base(base_url: &str) -> String {
    base_url.trim_end_matches('/').to_string()
}

fn clip(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    body.chars().take(MAX_ERROR_BODY).collect()
}
