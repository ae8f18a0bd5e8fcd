//! Download poller: bounded, fixed-interval retrieval of a finished job file.
//!
//! The backend offers no completion push, so the client keeps asking for the
//! file until one of these happens:
//!
//! - the body is large enough to be the real file ([`TerminalOutcome::Completed`])
//! - the backend answers 400 ([`TerminalOutcome::Rejected`])
//! - the backend answers 401 ([`TerminalOutcome::AuthExpired`])
//! - the caller cancels ([`TerminalOutcome::Cancelled`])
//! - the attempt budget runs out ([`TerminalOutcome::TimedOut`])
//!
//! Transport faults and every other status are swallowed and count as one
//! spent attempt. Attempts are strictly sequential.

mod artifact;
mod cancel;
mod policy;

pub use artifact::{Artifact, FALLBACK_EXTENSION, FALLBACK_TITLE, artifact_file_name};
pub use cancel::CancelSignal;
pub use policy::{DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL, MIN_PAYLOAD_BYTES, PollPolicy};

use tracing::{debug, info, instrument, warn};

use crate::remote::JobBackend;
use policy::{AttemptVerdict, classify_attempt};

/// How a poll ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalOutcome {
    /// The file was retrieved.
    Completed(Artifact),
    /// The caller cancelled.
    Cancelled,
    /// The backend answered 400.
    Rejected,
    /// The backend answered 401.
    AuthExpired,
    /// No terminal answer within the attempt budget.
    TimedOut,
}

impl TerminalOutcome {
    /// Short lowercase name for logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed(_) => "completed",
            Self::Cancelled => "cancelled",
            Self::Rejected => "rejected",
            Self::AuthExpired => "auth_expired",
            Self::TimedOut => "timed_out",
        }
    }
}

/// Polls one job's file endpoint under a [`PollPolicy`].
pub struct DownloadPoller<'a> {
    backend: &'a dyn JobBackend,
    policy: PollPolicy,
}

impl<'a> DownloadPoller<'a> {
    /// Creates a poller with the default policy (30 attempts, 2000 ms).
    #[must_use]
    pub fn new(backend: &'a dyn JobBackend) -> Self {
        Self::with_policy(backend, PollPolicy::default())
    }

    /// Creates a poller with a custom policy.
    #[must_use]
    pub fn with_policy(backend: &'a dyn JobBackend, policy: PollPolicy) -> Self {
        Self { backend, policy }
    }

    /// The active policy.
    #[must_use]
    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    /// Polls `job_id` until a terminal outcome.
    ///
    /// `cancel` is checked before each attempt and again as soon as each
    /// network call returns. A pending call or the inter-attempt sleep is
    /// abandoned the moment `cancel` fires.
    #[instrument(skip(self, title, cancel), fields(max_attempts = self.policy.max_attempts()))]
    pub async fn poll(
        &self,
        job_id: &str,
        title: &str,
        ext: Option<&str>,
        cancel: &CancelSignal,
    ) -> TerminalOutcome {
        let max_attempts = self.policy.max_attempts();

        for attempt in 1..=max_attempts {
            if cancel.is_cancelled() {
                return cancelled(attempt);
            }

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return cancelled(attempt),
                result = self.backend.fetch_file(job_id) => result,
            };

            if cancel.is_cancelled() {
                return cancelled(attempt);
            }

            match result {
                Ok(response) => match classify_attempt(&response, self.policy.min_payload_bytes()) {
                    AttemptVerdict::Ready => {
                        let artifact =
                            Artifact::new(title, ext, response.content_type, response.body);
                        info!(
                            attempt,
                            bytes = artifact.len(),
                            file_name = %artifact.file_name,
                            "download ready"
                        );
                        return TerminalOutcome::Completed(artifact);
                    }
                    AttemptVerdict::Rejected => {
                        warn!(attempt, "backend rejected the job");
                        return TerminalOutcome::Rejected;
                    }
                    AttemptVerdict::AuthExpired => {
                        warn!(attempt, "backend reports expired session");
                        return TerminalOutcome::AuthExpired;
                    }
                    AttemptVerdict::Pending => {
                        debug!(
                            attempt,
                            status = response.status,
                            bytes = response.body.len(),
                            "file not ready"
                        );
                    }
                },
                Err(error) => {
                    debug!(attempt, error = %error, "file retrieval failed; retrying");
                }
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => return cancelled(attempt),
                () = tokio::time::sleep(self.policy.interval()) => {}
            }
        }

        warn!(max_attempts, "download timed out");
        TerminalOutcome::TimedOut
    }
}

fn cancelled(attempt: u32) -> TerminalOutcome {
    info!(attempt, "polling cancelled");
    TerminalOutcome::Cancelled
}
