//! Observable orchestrator state.

use std::sync::Arc;

use crate::failure::FaultClass;
use crate::media::{FormatDescriptor, VideoInfo};
use crate::poller::{Artifact, CancelSignal};

/// Lifecycle phase of the orchestrator's single job slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobPhase {
    /// No job is active.
    #[default]
    Idle,
    /// The job was requested; no job id yet.
    Submitting,
    /// The backend accepted the job; waiting for the file.
    Polling,
}

/// Coarse stage for presentation: [`JobPhase`] plus whether info is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Nothing analyzed, no job.
    Idle,
    /// Info loaded, no job.
    HasInfo,
    /// A job is being submitted.
    Submitting,
    /// A job is being polled.
    Polling,
}

/// What the client believes about the backend's stored cookies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CredentialState {
    /// No check has completed yet.
    #[default]
    Unknown,
    /// The backend holds cookies that were last seen working.
    Present,
    /// No cookies, or the backend rejected them.
    Absent,
}

/// How the last job ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The file was retrieved.
    Completed {
        /// The downloaded file.
        artifact: Arc<Artifact>,
    },
    /// The user cancelled.
    Cancelled,
    /// The poll budget ran out.
    TimedOut,
    /// The backend refused the job.
    Rejected,
    /// The backend rejected the session cookies.
    AuthExpired,
}

impl JobOutcome {
    /// Short lowercase name for logs.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Cancelled => "cancelled",
            Self::TimedOut => "timed_out",
            Self::Rejected => "rejected",
            Self::AuthExpired => "auth_expired",
        }
    }

    /// Fault behind an unsuccessful outcome; `None` for completion and cancel.
    #[must_use]
    pub fn fault_class(&self) -> Option<FaultClass> {
        match self {
            Self::Completed { .. } | Self::Cancelled => None,
            Self::TimedOut => Some(FaultClass::Timeout),
            Self::Rejected => Some(FaultClass::RemoteRejection),
            Self::AuthExpired => Some(FaultClass::Auth),
        }
    }
}

/// Result of [`Orchestrator::select_format`](super::Orchestrator::select_format).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectOutcome {
    /// Another job is active; nothing changed.
    Busy,
    /// No video has been analyzed; nothing changed.
    NoInfo,
    /// The format is not part of the current video info; nothing changed.
    UnknownFormat,
    /// A job ran to a terminal state.
    Finished(JobOutcome),
}

/// The single active download.
#[derive(Debug, Clone)]
pub struct DownloadJob {
    /// Backend-assigned id, absent while submitting.
    pub job_id: Option<String>,
    /// The requested rendition.
    pub format: FormatDescriptor,
    /// Title sent to the backend.
    pub title: String,
    /// Last reported progress, 0..=100.
    pub progress: u8,
    /// Submitting or Polling.
    pub phase: JobPhase,
    pub(crate) generation: u64,
    pub(crate) cancel: CancelSignal,
}

/// Snapshot published to observers.
#[derive(Debug, Clone, Default)]
pub struct OrchestratorState {
    /// Info of the last successful analysis.
    pub info: Option<VideoInfo>,
    /// URL the current info was fetched for.
    pub source_url: Option<String>,
    /// An analysis is in flight.
    pub analyzing: bool,
    /// The active job, if any.
    pub job: Option<DownloadJob>,
    /// The single user-visible error message.
    pub last_error: Option<String>,
    /// Believed cookie state.
    pub credentials: CredentialState,
    /// Terminal state of the last job.
    pub last_outcome: Option<JobOutcome>,
    /// The last completed download.
    pub last_artifact: Option<Arc<Artifact>>,
}

impl OrchestratorState {
    /// Phase of the job slot.
    #[must_use]
    pub fn phase(&self) -> JobPhase {
        self.job.as_ref().map_or(JobPhase::Idle, |job| job.phase)
    }

    /// Presentation stage.
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self.phase() {
            JobPhase::Submitting => Stage::Submitting,
            JobPhase::Polling => Stage::Polling,
            JobPhase::Idle if self.info.is_some() => Stage::HasInfo,
            JobPhase::Idle => Stage::Idle,
        }
    }

    /// Progress of the active job, 0 when idle.
    #[must_use]
    pub fn progress(&self) -> u8 {
        self.job.as_ref().map_or(0, |job| job.progress)
    }

    /// Whether a job occupies the slot.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.job.is_some()
    }

    /// File name of the last completed download.
    #[must_use]
    pub fn last_artifact_name(&self) -> Option<&str> {
        self.last_artifact.as_deref().map(|a| a.file_name.as_str())
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.job.as_ref().is_some_and(|job| job.generation == generation)
    }
}
