//! Constants for the remote job client (timeouts, fallback messages).

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default HTTP read timeout (5 minutes; file retrieval streams whole videos).
pub const READ_TIMEOUT_SECS: u64 = 300;

pub(crate) const INFO_FAILED_MESSAGE: &str = "Failed to fetch video info. Please check the URL.";
pub(crate) const SUBMIT_FAILED_MESSAGE: &str = "Download failed to start.";
pub(crate) const CANCEL_FAILED_MESSAGE: &str = "Failed to cancel download.";
pub(crate) const CREDENTIAL_CHECK_FAILED_MESSAGE: &str = "Failed to check stored cookies.";
pub(crate) const UPLOAD_FAILED_MESSAGE: &str = "Unknown error";
pub(crate) const TEST_FAILED_MESSAGE: &str = "Failed to test cookies. Please try again.";
