//! Job orchestrator: drives one download from analysis to a terminal state.
//!
//! ```text
//! Idle ─analyze─▶ HasInfo ─select_format─▶ Submitting ─job id─▶ Polling ─terminal─▶ Idle
//! ```
//!
//! The orchestrator owns the single job slot, the job's [`CancelSignal`], and
//! the [`CredentialState`]. Every change is published through a
//! `tokio::sync::watch` channel; presentation code observes it with
//! [`Orchestrator::subscribe`] and never mutates it.
//!
//! Transitions use `watch::Sender::send_if_modified`, so the "is a job
//! active?" check and the slot assignment happen under one lock. Each job
//! carries a generation number; late results from a job that was cancelled
//! are discarded because their generation no longer matches the slot.
//! Analyses are numbered the same way, so only the most recent `analyze`
//! call publishes its info or error.

mod error;
mod state;

pub use error::OrchestratorError;
pub use state::{
    CredentialState, DownloadJob, JobOutcome, JobPhase, OrchestratorState, SelectOutcome, Stage,
};

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::bridge::{PageContext, parse_cookie_text};
use crate::failure::FaultClass;
use crate::media::{FormatDescriptor, VideoInfo};
use crate::poller::{CancelSignal, DownloadPoller, FALLBACK_TITLE, PollPolicy, TerminalOutcome};
use crate::remote::{JobBackend, RemoteError};

/// Default spacing of progress queries while polling.
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_millis(1000);

const CANCELLED_MESSAGE: &str = "Download cancelled.";
const REJECTED_MESSAGE: &str = "Download was cancelled or rejected by the server.";
const AUTH_EXPIRED_MESSAGE: &str = "Session cookies expired. Please re-upload cookies.";
const TIMED_OUT_MESSAGE: &str = "Download timed out or failed.";
const EMPTY_URL_MESSAGE: &str = "Please enter a video URL.";

/// The job lifecycle state machine.
///
/// Share it with `Arc` between the task that drives a job and the task that
/// may cancel it.
pub struct Orchestrator {
    backend: Arc<dyn JobBackend>,
    identity: String,
    policy: PollPolicy,
    progress_interval: Duration,
    state: watch::Sender<OrchestratorState>,
    generation: AtomicU64,
    analysis: AtomicU64,
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("identity", &self.identity)
            .field("policy", &self.policy)
            .field("progress_interval", &self.progress_interval)
            .field("stage", &self.state.borrow().stage())
            .finish_non_exhaustive()
    }
}

impl Orchestrator {
    /// Creates an idle orchestrator acting for `identity`.
    #[must_use]
    pub fn new(backend: Arc<dyn JobBackend>, identity: impl Into<String>) -> Self {
        Self {
            backend,
            identity: identity.into(),
            policy: PollPolicy::default(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            state: watch::channel(OrchestratorState::default()).0,
            generation: AtomicU64::new(0),
            analysis: AtomicU64::new(0),
        }
    }

    /// Replaces the file polling policy.
    #[must_use]
    pub fn with_poll_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Replaces the progress query interval.
    #[must_use]
    pub fn with_progress_interval(mut self, interval: Duration) -> Self {
        self.progress_interval = interval;
        self
    }

    /// The identity sent with every backend call.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Receives every published state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<OrchestratorState> {
        self.state.subscribe()
    }

    /// A copy of the current state.
    #[must_use]
    pub fn snapshot(&self) -> OrchestratorState {
        self.state.borrow().clone()
    }

    /// Fetches video info for `url`, replacing any previous info.
    ///
    /// Allowed in every stage; an active job is left alone. When calls
    /// overlap, only the most recent one publishes; an older call still
    /// returns its own result to its caller.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::EmptyUrl`] without any network call, or
    /// [`OrchestratorError::Remote`] when the lookup fails. Auth faults also
    /// mark the credentials absent.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn analyze(&self, url: &str) -> Result<VideoInfo, OrchestratorError> {
        let ticket = self.analysis.fetch_add(1, Ordering::SeqCst) + 1;
        let url = url.trim();
        if url.is_empty() {
            self.state.send_modify(|s| {
                s.analyzing = false;
                s.last_error = Some(EMPTY_URL_MESSAGE.to_string());
            });
            return Err(OrchestratorError::EmptyUrl);
        }

        self.state.send_modify(|s| {
            s.analyzing = true;
            s.info = None;
            s.source_url = None;
            s.last_error = None;
        });

        match self.backend.fetch_info(url, &self.identity).await {
            Ok(info) => {
                info!(title = %info.title, formats = info.formats.len(), "video analyzed");
                let published = self.state.send_if_modified(|s| {
                    if !self.is_latest_analysis(ticket) {
                        return false;
                    }
                    s.analyzing = false;
                    s.info = Some(info.clone());
                    s.source_url = Some(url.to_string());
                    true
                });
                if !published {
                    debug!(ticket, "stale analysis discarded");
                }
                Ok(info)
            }
            Err(error) => {
                warn!(error = %error, class = error.fault_class().label(), "analysis failed");
                let mut stale = false;
                self.state.send_if_modified(|s| {
                    // The session fault holds regardless of which call saw it.
                    let mut modified = false;
                    if error.is_auth() && s.credentials != CredentialState::Absent {
                        s.credentials = CredentialState::Absent;
                        modified = true;
                    }
                    if !self.is_latest_analysis(ticket) {
                        stale = true;
                        return modified;
                    }
                    s.analyzing = false;
                    s.last_error = Some(error.user_message());
                    true
                });
                if stale {
                    debug!(ticket, "stale analysis error discarded");
                }
                Err(OrchestratorError::Remote(error))
            }
        }
    }

    fn is_latest_analysis(&self, ticket: u64) -> bool {
        self.analysis.load(Ordering::SeqCst) == ticket
    }

    /// Starts a download of `format` and drives it to a terminal state.
    ///
    /// Ignored (returning `Busy`, `NoInfo`, or `UnknownFormat`) unless no
    /// job is active and `format` belongs to the current info. Submission is
    /// never retried. While the poller runs, progress is queried every
    /// progress interval.
    #[instrument(skip(self, format), fields(format_id = %format.format_id))]
    pub async fn select_format(&self, format: &FormatDescriptor) -> SelectOutcome {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let cancel = CancelSignal::new();

        let mut rejected = None;
        let mut accepted = None;
        self.state.send_if_modified(|s| {
            if s.job.is_some() {
                rejected = Some(SelectOutcome::Busy);
                return false;
            }
            let (Some(info), Some(url)) = (s.info.as_ref(), s.source_url.as_ref()) else {
                rejected = Some(SelectOutcome::NoInfo);
                return false;
            };
            if !info.formats.iter().any(|f| f == format) {
                rejected = Some(SelectOutcome::UnknownFormat);
                return false;
            }

            let title = if info.title.trim().is_empty() {
                FALLBACK_TITLE.to_string()
            } else {
                info.title.clone()
            };
            accepted = Some((url.clone(), title.clone()));
            s.job = Some(DownloadJob {
                job_id: None,
                format: format.clone(),
                title,
                progress: 0,
                phase: JobPhase::Submitting,
                generation,
                cancel: cancel.clone(),
            });
            s.last_error = None;
            s.last_outcome = None;
            true
        });

        if let Some(outcome) = rejected {
            debug!(?outcome, "format selection ignored");
            return outcome;
        }
        let Some((url, title)) = accepted else {
            return SelectOutcome::NoInfo;
        };

        let job_id = match self
            .backend
            .submit_job(&url, format, &title, &self.identity)
            .await
        {
            Ok(job_id) => job_id,
            Err(error) => return SelectOutcome::Finished(self.submit_failed(generation, &error)),
        };

        if cancel.is_cancelled() || !self.begin_polling(generation, &job_id) {
            info!(job_id = %job_id, "job id arrived after cancel; cancelling remotely");
            self.cancel_remote(&job_id).await;
            return SelectOutcome::Finished(JobOutcome::Cancelled);
        }

        let terminal = self
            .poll_with_progress(generation, &job_id, &title, format.ext.as_deref(), &cancel)
            .await;
        SelectOutcome::Finished(self.commit(generation, terminal))
    }

    /// Cancels the active job.
    ///
    /// Local state becomes Cancelled immediately. The remote cancel is
    /// best-effort and its failure is only logged. Returns false when no
    /// job was active.
    #[instrument(skip(self))]
    pub async fn cancel(&self) -> bool {
        let mut cancelled = None;
        self.state.send_if_modified(|s| {
            let Some(job) = s.job.take() else {
                return false;
            };
            job.cancel.cancel();
            cancelled = Some(job.job_id);
            s.last_outcome = Some(JobOutcome::Cancelled);
            s.last_error = Some(CANCELLED_MESSAGE.to_string());
            true
        });

        let Some(job_id) = cancelled else {
            debug!("cancel ignored; no active job");
            return false;
        };
        info!(job_id = ?job_id, "download cancelled");
        if let Some(job_id) = job_id {
            self.cancel_remote(&job_id).await;
        }
        true
    }

    /// Asks the backend whether it holds cookies. Any fault reads as absent.
    #[instrument(skip(self))]
    pub async fn startup_check(&self) -> CredentialState {
        let credentials = match self.backend.has_credentials(&self.identity).await {
            Ok(true) => CredentialState::Present,
            Ok(false) => CredentialState::Absent,
            Err(error) => {
                warn!(error = %error, "cookie presence check failed");
                CredentialState::Absent
            }
        };
        info!(?credentials, "cookie presence checked");
        self.set_credentials(credentials);
        credentials
    }

    /// Validates `cookie_text` locally and uploads it.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::InvalidCookies`] when no line parses (nothing is
    /// sent), or [`OrchestratorError::Remote`] when the upload fails, which
    /// also marks the credentials absent.
    #[instrument(skip(self, cookie_text), fields(bytes = cookie_text.len()))]
    pub async fn upload_credentials(&self, cookie_text: &str) -> Result<(), OrchestratorError> {
        let parsed = match parse_cookie_text(cookie_text) {
            Ok(parsed) => parsed,
            Err(error) => {
                self.state.send_modify(|s| {
                    s.last_error = Some(format!("Invalid cookies file: {error}"));
                });
                return Err(OrchestratorError::InvalidCookies(error));
            }
        };
        if !parsed.warnings.is_empty() {
            warn!(skipped = parsed.warnings.len(), "some cookie lines were skipped");
        }

        match self
            .backend
            .upload_credentials(&self.identity, cookie_text)
            .await
        {
            Ok(()) => {
                info!(cookies = parsed.cookies.len(), "cookies uploaded");
                self.state.send_modify(|s| {
                    s.credentials = CredentialState::Present;
                    s.last_error = None;
                });
                Ok(())
            }
            Err(error) => {
                warn!(error = %error, "cookie upload failed");
                self.state.send_modify(|s| {
                    s.credentials = CredentialState::Absent;
                    s.last_error =
                        Some(format!("Failed to upload cookies: {}", error.user_message()));
                });
                Err(OrchestratorError::Remote(error))
            }
        }
    }

    /// Pulls cookies from the browser bridge and uploads them.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::Bridge`] when the bridge fails or times out,
    /// otherwise as [`upload_credentials`](Self::upload_credentials).
    #[instrument(skip(self, page), fields(timeout_secs = timeout.as_secs()))]
    pub async fn sync_browser_credentials(
        &self,
        page: &PageContext,
        timeout: Duration,
    ) -> Result<(), OrchestratorError> {
        let blob = match page.request_cookies(timeout).await {
            Ok(blob) => blob,
            Err(error) => {
                warn!(error = %error, "browser cookie sync failed");
                self.state.send_modify(|s| {
                    s.last_error = Some(format!("{error}. {}", FaultClass::Bridge.suggestion()));
                });
                return Err(OrchestratorError::Bridge(error));
            }
        };
        self.upload_credentials(&blob).await
    }

    /// Checks the stored cookies against a known restricted video.
    ///
    /// Returns the resolved title and marks the credentials present.
    ///
    /// # Errors
    ///
    /// [`OrchestratorError::Remote`]; a 401 also marks the credentials absent.
    #[instrument(skip(self), fields(test_url = %test_url))]
    pub async fn test_credentials(&self, test_url: &str) -> Result<String, OrchestratorError> {
        match self.backend.test_credentials(&self.identity, test_url).await {
            Ok(title) => {
                self.state.send_modify(|s| {
                    s.credentials = CredentialState::Present;
                    s.last_error = None;
                });
                Ok(title)
            }
            Err(error) => {
                warn!(error = %error, "cookie test failed");
                self.state.send_modify(|s| {
                    s.last_error = Some(error.user_message());
                    if error.is_auth() {
                        s.credentials = CredentialState::Absent;
                    }
                });
                Err(OrchestratorError::Remote(error))
            }
        }
    }

    fn set_credentials(&self, credentials: CredentialState) {
        self.state.send_if_modified(|s| {
            let changed = s.credentials != credentials;
            s.credentials = credentials;
            changed
        });
    }

    fn submit_failed(&self, generation: u64, error: &RemoteError) -> JobOutcome {
        warn!(error = %error, class = error.fault_class().label(), "job submission failed");
        let outcome = if error.is_auth() {
            JobOutcome::AuthExpired
        } else {
            JobOutcome::Rejected
        };
        let mut committed = false;
        self.state.send_if_modified(|s| {
            if !s.is_current(generation) {
                return false;
            }
            s.job = None;
            s.last_error = Some(if error.is_auth() {
                AUTH_EXPIRED_MESSAGE.to_string()
            } else {
                error.user_message()
            });
            if error.is_auth() {
                s.credentials = CredentialState::Absent;
            }
            s.last_outcome = Some(outcome.clone());
            committed = true;
            true
        });
        if committed { outcome } else { JobOutcome::Cancelled }
    }

    fn begin_polling(&self, generation: u64, job_id: &str) -> bool {
        let mut started = false;
        self.state.send_if_modified(|s| {
            let Some(job) = s.job.as_mut().filter(|job| job.generation == generation) else {
                return false;
            };
            job.job_id = Some(job_id.to_string());
            job.phase = JobPhase::Polling;
            started = true;
            true
        });
        if started {
            info!(job_id, "polling for file");
        }
        started
    }

    async fn poll_with_progress(
        &self,
        generation: u64,
        job_id: &str,
        title: &str,
        ext: Option<&str>,
        cancel: &CancelSignal,
    ) -> TerminalOutcome {
        let poller = DownloadPoller::with_policy(self.backend.as_ref(), self.policy);
        let poll = poller.poll(job_id, title, ext, cancel);

        let period = self.progress_interval;
        let watch_progress = async {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            while !cancel.is_cancelled() {
                ticker.tick().await;
                let progress = self.backend.query_progress(job_id).await;
                self.update_progress(generation, progress);
            }
        };

        tokio::select! {
            biased;
            outcome = poll => outcome,
            () = watch_progress => TerminalOutcome::Cancelled,
        }
    }

    fn update_progress(&self, generation: u64, progress: u8) {
        self.state.send_if_modified(|s| match s.job.as_mut() {
            Some(job) if job.generation == generation && job.progress != progress => {
                job.progress = progress;
                true
            }
            _ => false,
        });
    }

    /// Records a terminal outcome if the job still owns the slot.
    ///
    /// A job that no longer owns the slot was cancelled; cancel already
    /// committed its own outcome.
    fn commit(&self, generation: u64, terminal: TerminalOutcome) -> JobOutcome {
        let outcome = match terminal {
            TerminalOutcome::Completed(artifact) => JobOutcome::Completed {
                artifact: Arc::new(artifact),
            },
            TerminalOutcome::Cancelled => JobOutcome::Cancelled,
            TerminalOutcome::Rejected => JobOutcome::Rejected,
            TerminalOutcome::AuthExpired => JobOutcome::AuthExpired,
            TerminalOutcome::TimedOut => JobOutcome::TimedOut,
        };

        let mut committed = false;
        self.state.send_if_modified(|s| {
            if !s.is_current(generation) {
                return false;
            }
            s.job = None;
            match &outcome {
                JobOutcome::Completed { artifact } => {
                    s.last_artifact = Some(Arc::clone(artifact));
                    s.last_error = None;
                }
                JobOutcome::Cancelled => s.last_error = Some(CANCELLED_MESSAGE.to_string()),
                JobOutcome::Rejected => s.last_error = Some(REJECTED_MESSAGE.to_string()),
                JobOutcome::TimedOut => s.last_error = Some(TIMED_OUT_MESSAGE.to_string()),
                JobOutcome::AuthExpired => {
                    s.last_error = Some(AUTH_EXPIRED_MESSAGE.to_string());
                    s.credentials = CredentialState::Absent;
                }
            }
            s.last_outcome = Some(outcome.clone());
            committed = true;
            true
        });

        if committed {
            info!(outcome = outcome.label(), "job finished");
            outcome
        } else {
            debug!(outcome = outcome.label(), "stale job result discarded");
            JobOutcome::Cancelled
        }
    }

    async fn cancel_remote(&self, job_id: &str) {
        if let Err(error) = self.backend.cancel_job(job_id).await {
            warn!(job_id, error = %error, "remote cancel failed");
        }
    }
}
