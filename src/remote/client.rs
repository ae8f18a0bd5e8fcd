//! HTTP implementation of [`JobBackend`].
//!
//! Wire contract (JSON unless noted):
//!
//! | Operation | Request |
//! |---|---|
//! | info lookup | `POST /api/info {url, user_id}` |
//! | job submit | `POST /api/download {url, selected_format, title, user_id}` |
//! | progress | `GET /api/progress/{job_id}` |
//! | file retrieval | `GET /api/download-file/{job_id}` (binary body) |
//! | cancel | `POST /api/cancel/{job_id}` |
//! | credential presence | `POST /api/has-cookies {user_id}` |
//! | credential upload | `POST /api/upload-cookies {user_id, cookies}` |
//! | credential test | `POST /api/test-cookies {user_id, test_url}` |
//!
//! Error responses carry `{"error": "..."}`, which is surfaced verbatim.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use url::Url;

use super::constants::{
    CANCEL_FAILED_MESSAGE, CONNECT_TIMEOUT_SECS, CREDENTIAL_CHECK_FAILED_MESSAGE,
    INFO_FAILED_MESSAGE, READ_TIMEOUT_SECS, SUBMIT_FAILED_MESSAGE, TEST_FAILED_MESSAGE,
    UPLOAD_FAILED_MESSAGE,
};
use super::error::RemoteError;
use super::{FileResponse, JobBackend};
use crate::media::{FormatDescriptor, VideoInfo};
use crate::user_agent;

/// Backend client over HTTP.
///
/// Create once and share; the inner `reqwest::Client` pools connections.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

#[derive(Serialize)]
struct InfoRequest<'a> {
    url: &'a str,
    user_id: &'a str,
}

#[derive(Serialize)]
struct SubmitRequest<'a> {
    url: &'a str,
    selected_format: &'a FormatDescriptor,
    title: &'a str,
    user_id: &'a str,
}

#[derive(Serialize)]
struct IdentityRequest<'a> {
    user_id: &'a str,
}

#[derive(Serialize)]
struct UploadRequest<'a> {
    user_id: &'a str,
    cookies: &'a str,
}

#[derive(Serialize)]
struct TestCookiesRequest<'a> {
    user_id: &'a str,
    test_url: &'a str,
}

#[derive(Deserialize)]
struct TestCookiesResponse {
    #[serde(default)]
    title: Option<String>,
}

#[derive(Deserialize)]
struct SubmitResponse {
    job_id: Option<String>,
}

#[derive(Deserialize)]
struct ProgressResponse {
    progress: Option<f64>,
}

#[derive(Deserialize)]
struct HasCookiesResponse {
    #[serde(default)]
    has_cookies: bool,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<String>,
}

impl HttpBackend {
    /// Creates a client for the backend at `base_url` with default timeouts.
    ///
    /// # Errors
    ///
    /// Returns [`RemoteError::InvalidBackendUrl`] when `base_url` is not an
    /// absolute http(s) URL, or [`RemoteError::Client`] when the HTTP client
    /// cannot be built.
    pub fn new(base_url: &str) -> Result<Self, RemoteError> {
        Self::with_timeouts(base_url, CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a client with explicit connect and read timeouts in seconds.
    ///
    /// # Errors
    ///
    /// Same as [`HttpBackend::new`].
    pub fn with_timeouts(
        base_url: &str,
        connect_timeout_secs: u64,
        read_timeout_secs: u64,
    ) -> Result<Self, RemoteError> {
        let base_url = parse_base_url(base_url)?;
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(user_agent::default_backend_user_agent())
            .build()
            .map_err(RemoteError::Client)?;
        debug!(base_url = %base_url, "backend client ready");
        Ok(Self { client, base_url })
    }

    /// The backend base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // parse_base_url rejects cannot-be-a-base URLs, so this always succeeds.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(
        &self,
        endpoint: &Url,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, RemoteError> {
        request
            .send()
            .await
            .map_err(|e| RemoteError::transport(endpoint.as_str(), e))
    }
}

#[async_trait]
impl JobBackend for HttpBackend {
    #[instrument(skip(self, identity), fields(url = %url))]
    async fn fetch_info(&self, url: &str, identity: &str) -> Result<VideoInfo, RemoteError> {
        let endpoint = self.endpoint(&["api", "info"]);
        let request = self.client.post(endpoint.clone()).json(&InfoRequest {
            url,
            user_id: identity,
        });
        let response = self.send(&endpoint, request).await?;

        if !response.status().is_success() {
            return Err(classify_failure(&endpoint, url, response, INFO_FAILED_MESSAGE).await);
        }

        let info: VideoInfo = response
            .json()
            .await
            .map_err(|e| RemoteError::decode(endpoint.as_str(), e.to_string()))?;
        info!(title = %info.title, formats = info.formats.len(), "fetched video info");
        Ok(info)
    }

    #[instrument(skip(self, format, title, identity), fields(url = %url, format_id = %format.format_id))]
    async fn submit_job(
        &self,
        url: &str,
        format: &FormatDescriptor,
        title: &str,
        identity: &str,
    ) -> Result<String, RemoteError> {
        let endpoint = self.endpoint(&["api", "download"]);
        let request = self.client.post(endpoint.clone()).json(&SubmitRequest {
            url,
            selected_format: format,
            title,
            user_id: identity,
        });
        let response = self.send(&endpoint, request).await?;

        if !response.status().is_success() {
            return Err(classify_failure(&endpoint, url, response, SUBMIT_FAILED_MESSAGE).await);
        }

        let body: SubmitResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::decode(endpoint.as_str(), e.to_string()))?;
        let job_id = body
            .job_id
            .filter(|id| !id.trim().is_empty())
            .ok_or_else(|| RemoteError::decode(endpoint.as_str(), "response has no job_id"))?;
        info!(job_id = %job_id, "download job submitted");
        Ok(job_id)
    }

    #[instrument(level = "debug", skip(self))]
    async fn query_progress(&self, job_id: &str) -> u8 {
        let endpoint = self.endpoint(&["api", "progress", job_id]);
        let response = match self.send(&endpoint, self.client.get(endpoint.clone())).await {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                debug!(status = response.status().as_u16(), "progress query refused; reading as 0");
                return 0;
            }
            Err(error) => {
                debug!(error = %error, "progress query failed; reading as 0");
                return 0;
            }
        };

        match response.json::<ProgressResponse>().await {
            Ok(body) => clamp_percentage(body.progress.unwrap_or(0.0)),
            Err(error) => {
                debug!(error = %error, "progress body unreadable; reading as 0");
                0
            }
        }
    }

    #[instrument(level = "debug", skip(self))]
    async fn fetch_file(&self, job_id: &str) -> Result<FileResponse, RemoteError> {
        let endpoint = self.endpoint(&["api", "download-file", job_id]);
        let response = self
            .send(&endpoint, self.client.get(endpoint.clone()))
            .await?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(std::string::ToString::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| RemoteError::transport(endpoint.as_str(), e))?;

        debug!(status, bytes = body.len(), "file retrieval answered");
        Ok(FileResponse::new(status, content_type, body.to_vec()))
    }

    #[instrument(skip(self))]
    async fn cancel_job(&self, job_id: &str) -> Result<(), RemoteError> {
        let endpoint = self.endpoint(&["api", "cancel", job_id]);
        let response = self
            .send(&endpoint, self.client.post(endpoint.clone()))
            .await?;
        let status = response.status().as_u16();
        if !response.status().is_success() {
            let message = error_message(response, CANCEL_FAILED_MESSAGE).await;
            return Err(RemoteError::unavailable(endpoint.as_str(), status, message));
        }
        info!(job_id, "remote job cancelled");
        Ok(())
    }

    #[instrument(skip(self, identity))]
    async fn has_credentials(&self, identity: &str) -> Result<bool, RemoteError> {
        let endpoint = self.endpoint(&["api", "has-cookies"]);
        let request = self
            .client
            .post(endpoint.clone())
            .json(&IdentityRequest { user_id: identity });
        let response = self.send(&endpoint, request).await?;
        let status = response.status().as_u16();
        if status == 401 {
            let message = error_message(response, CREDENTIAL_CHECK_FAILED_MESSAGE).await;
            return Err(RemoteError::auth_required(endpoint.as_str(), message));
        }
        if !response.status().is_success() {
            let message = error_message(response, CREDENTIAL_CHECK_FAILED_MESSAGE).await;
            return Err(RemoteError::unavailable(endpoint.as_str(), status, message));
        }

        let body: HasCookiesResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::decode(endpoint.as_str(), e.to_string()))?;
        Ok(body.has_cookies)
    }

    #[instrument(skip(self, identity, cookies), fields(bytes = cookies.len()))]
    async fn upload_credentials(&self, identity: &str, cookies: &str) -> Result<(), RemoteError> {
        let endpoint = self.endpoint(&["api", "upload-cookies"]);
        let request = self.client.post(endpoint.clone()).json(&UploadRequest {
            user_id: identity,
            cookies,
        });
        let response = self.send(&endpoint, request).await?;
        let status = response.status().as_u16();
        if !response.status().is_success() {
            let message = error_message(response, UPLOAD_FAILED_MESSAGE).await;
            warn!(status, "cookie upload rejected");
            return Err(RemoteError::UploadRejected { status, message });
        }
        info!("cookies uploaded");
        Ok(())
    }

    #[instrument(skip(self, identity), fields(test_url = %test_url))]
    async fn test_credentials(&self, identity: &str, test_url: &str) -> Result<String, RemoteError> {
        let endpoint = self.endpoint(&["api", "test-cookies"]);
        let request = self.client.post(endpoint.clone()).json(&TestCookiesRequest {
            user_id: identity,
            test_url,
        });
        let response = self.send(&endpoint, request).await?;

        if !response.status().is_success() {
            return Err(
                classify_failure(&endpoint, test_url, response, TEST_FAILED_MESSAGE).await,
            );
        }

        let body: TestCookiesResponse = response
            .json()
            .await
            .map_err(|e| RemoteError::decode(endpoint.as_str(), e.to_string()))?;
        let title = body.title.unwrap_or_default();
        info!(title = %title, "cookie test passed");
        Ok(title)
    }
}

fn parse_base_url(raw: &str) -> Result<Url, RemoteError> {
    let invalid = || RemoteError::InvalidBackendUrl {
        url: raw.to_string(),
    };
    let url = Url::parse(raw.trim()).map_err(|_| invalid())?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(invalid());
    }
    Ok(url)
}

/// Maps a non-success info/submit response to its fault class.
async fn classify_failure(
    endpoint: &Url,
    url: &str,
    response: reqwest::Response,
    fallback: &str,
) -> RemoteError {
    let status = response.status().as_u16();
    let message = error_message(response, fallback).await;
    warn!(status, endpoint = %endpoint, message = %message, "backend call failed");
    match status {
        400 => RemoteError::InvalidUrl {
            url: url.to_string(),
            message,
        },
        401 => RemoteError::auth_required(endpoint.as_str(), message),
        _ => RemoteError::unavailable(endpoint.as_str(), status, message),
    }
}

/// Extracts the backend's `error` field, falling back to `fallback`.
async fn error_message(response: reqwest::Response, fallback: &str) -> String {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|body| body.error)
        .map(|message| message.trim().to_string())
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn clamp_percentage(raw: f64) -> u8 {
    if raw.is_finite() {
        raw.round().clamp(0.0, 100.0) as u8
    } else {
        0
    }
}
