//! Shared HTTP plumbing for every service client.

use std::time::Duration;

use crate::error::ServiceError;

/// Default per-request timeout for remote services.
pub const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub(crate) fn build_client(timeout_secs: u64) -> Result<reqwest::Client, ServiceError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| ServiceError::ClientBuild(e.to_string()))
}

/// Map a transport failure onto a [`ServiceError`].
pub(crate) fn send_error(e: reqwest::Error, timeout_secs: u64) -> ServiceError {
    if e.is_timeout() {
        ServiceError::Timeout(timeout_secs)
    } else {
        ServiceError::NetworkError(e.to_string())
    }
}

/// Turn non-success statuses into typed errors; pass successes through.
pub(crate) async fn check_status(
    response: reqwest::Response,
    resource: &str,
) -> Result<reqwest::Response, ServiceError> {
    let status = response.status().as_u16();
    if status == 429 {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(5)
            * 1000;
        return Err(ServiceError::RateLimited {
            retry_after_ms: retry_after,
        });
    }
    if status == 401 || status == 403 {
        let body = response.text().await.unwrap_or_default();
        return Err(ServiceError::AuthenticationFailed(body));
    }
    if status == 404 {
        return Err(ServiceError::ModelNotFound(resource.to_string()));
    }
    if status >= 400 {
        let message = response.text().await.unwrap_or_default();
        return Err(ServiceError::ApiError { status, message });
    }
    Ok(response)
}

/// Deserialize a JSON body, reporting failures as malformed responses.
pub(crate) async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, ServiceError> {
    response
        .json()
        .await
        .map_err(|e| ServiceError::MalformedResponse(format!("failed to parse response: {e}")))
}
