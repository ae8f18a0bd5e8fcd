//! Polling policy and per-attempt classification.

use std::time::Duration;

use crate::remote::FileResponse;

/// Default number of file retrieval attempts.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 30;

/// Default pause after each non-terminal attempt.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(2000);

/// Bodies of this size or smaller are treated as "not ready yet".
pub const MIN_PAYLOAD_BYTES: usize = 1000;

/// Attempt budget and readiness threshold for [`DownloadPoller`](super::DownloadPoller).
///
/// The interval is fixed; there is no backoff and no jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    max_attempts: u32,
    interval: Duration,
    min_payload_bytes: usize,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            interval: DEFAULT_POLL_INTERVAL,
            min_payload_bytes: MIN_PAYLOAD_BYTES,
        }
    }
}

impl PollPolicy {
    /// Creates a policy with custom settings.
    ///
    /// `max_attempts` is raised to at least 1.
    #[must_use]
    pub fn new(max_attempts: u32, interval: Duration, min_payload_bytes: usize) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
            min_payload_bytes,
        }
    }

    /// Total number of file retrieval attempts.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Pause after each non-terminal attempt.
    #[must_use]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Payloads must be strictly larger than this.
    #[must_use]
    pub fn min_payload_bytes(&self) -> usize {
        self.min_payload_bytes
    }
}

/// What a single file retrieval answer means for the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum AttemptVerdict {
    /// The file is ready.
    Ready,
    /// The backend refused the job (cancelled or failed).
    Rejected,
    /// The session cookies are no longer accepted.
    AuthExpired,
    /// Not ready yet; try again.
    Pending,
}

/// Classifies a file retrieval answer.
///
/// | Status | Body | Verdict |
/// |--------|------|---------|
/// | 200 | > threshold | Ready |
/// | 200 | <= threshold | Pending |
/// | 400 | any | Rejected |
/// | 401 | any | AuthExpired |
/// | other | any | Pending |
pub(crate) fn classify_attempt(response: &FileResponse, min_payload_bytes: usize) -> AttemptVerdict {
    match response.status {
        200 if response.body.len() > min_payload_bytes => AttemptVerdict::Ready,
        400 => AttemptVerdict::Rejected,
        401 => AttemptVerdict::AuthExpired,
        _ => AttemptVerdict::Pending,
    }
}
