//! Remote job client for the extraction backend.
//!
//! The backend computes video metadata, runs the actual download, and serves
//! the finished file. This module defines the [`JobBackend`] seam the
//! orchestrator and poller are written against, plus [`HttpBackend`], the
//! implementation that talks to the real service over HTTP.
//!
//! # Fault policy
//!
//! - `fetch_info` and `submit_job` fail fast; nothing here retries them.
//!   Submitting twice creates two remote jobs.
//! - `query_progress` swallows every fault to `0`.
//! - `fetch_file` returns the raw status and body; the poller decides what
//!   each status means and swallows transport faults.
//! - `cancel_job` is best-effort; callers log its failures.
//!
//! # Example
//!
//! ```no_run
//! use vidfetch_core::remote::{HttpBackend, JobBackend};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = HttpBackend::new("http://127.0.0.1:5000")?;
//! let info = backend
//!     .fetch_info("https://www.youtube.com/watch?v=abc", "default_user")
//!     .await?;
//! println!("{} ({} formats)", info.title, info.formats.len());
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod error;

pub use client::HttpBackend;
pub use constants::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
pub use error::RemoteError;

use async_trait::async_trait;

use crate::media::{FormatDescriptor, VideoInfo};

/// Raw answer of a file retrieval call.
#[derive(Clone, PartialEq, Eq)]
pub struct FileResponse {
    /// HTTP status code.
    pub status: u16,
    /// Declared `Content-Type`, if any.
    pub content_type: Option<String>,
    /// Response body.
    pub body: Vec<u8>,
}

impl FileResponse {
    /// Creates a response with the given status and body.
    #[must_use]
    pub fn new(status: u16, content_type: Option<String>, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type,
            body,
        }
    }
}

// Bodies can be hundreds of megabytes; never dump them into logs.
impl std::fmt::Debug for FileResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileResponse")
            .field("status", &self.status)
            .field("content_type", &self.content_type)
            .field("body_len", &self.body.len())
            .finish()
    }
}

/// Operations consumed from the extraction backend.
///
/// `identity` is the opaque per-user id the backend keys stored cookies by.
///
/// # Object Safety
///
/// This trait uses `async_trait` so the orchestrator can hold an
/// `Arc<dyn JobBackend>` and tests can inject scripted fakes.
#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Looks up title, duration, thumbnail, and formats for `url`.
    async fn fetch_info(&self, url: &str, identity: &str) -> Result<VideoInfo, RemoteError>;

    /// Starts a download job and returns the backend-assigned job id.
    async fn submit_job(
        &self,
        url: &str,
        format: &FormatDescriptor,
        title: &str,
        identity: &str,
    ) -> Result<String, RemoteError>;

    /// Current progress of `job_id` in percent. Faults read as `0`.
    async fn query_progress(&self, job_id: &str) -> u8;

    /// Attempts to retrieve the finished file for `job_id`.
    async fn fetch_file(&self, job_id: &str) -> Result<FileResponse, RemoteError>;

    /// Asks the backend to stop `job_id`.
    async fn cancel_job(&self, job_id: &str) -> Result<(), RemoteError>;

    /// Whether the backend holds session cookies for `identity`.
    async fn has_credentials(&self, identity: &str) -> Result<bool, RemoteError>;

    /// Stores a Netscape-format cookie file for `identity`.
    async fn upload_credentials(&self, identity: &str, cookies: &str) -> Result<(), RemoteError>;

    /// Resolves `test_url` with the stored cookies and returns the video title.
    async fn test_credentials(&self, identity: &str, test_url: &str) -> Result<String, RemoteError>;
}
