//! Fault classification shared by remote, bridge, and orchestrator errors.
//!
//! Every error type in the crate reports a [`FaultClass`]. The class decides
//! how the fault is surfaced and whether anything may retry it: only the
//! download poller retries, and only [`FaultClass::TransientNetwork`] faults.

/// Category of a fault, independent of which component raised it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FaultClass {
    /// Bad or unsupported input. The user must correct it.
    Input,
    /// Missing or expired session credentials. Triggers re-authentication.
    Auth,
    /// Timeout, connection reset, or other transport failure.
    TransientNetwork,
    /// The backend refused or invalidated the request.
    RemoteRejection,
    /// A polling budget ran out without a terminal answer.
    Timeout,
    /// No cookies available or the browser extension is unreachable.
    Bridge,
}

impl FaultClass {
    /// Stable label for display and structured logs.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Auth => "auth",
            Self::TransientNetwork => "network",
            Self::RemoteRejection => "rejected",
            Self::Timeout => "timeout",
            Self::Bridge => "bridge",
        }
    }

    /// Returns true for faults the poller may swallow and retry.
    #[must_use]
    pub fn is_transient(self) -> bool {
        matches!(self, Self::TransientNetwork)
    }

    /// Returns true when the fault means the stored session is no longer valid.
    #[must_use]
    pub fn is_auth(self) -> bool {
        matches!(self, Self::Auth)
    }

    /// One-line suggestion shown next to the error message.
    #[must_use]
    pub fn suggestion(self) -> &'static str {
        match self {
            Self::Input => "Check the video URL and try again.",
            Self::Auth => "Run `vidfetch cookies sync` or `vidfetch cookies upload` to refresh cookies.",
            Self::TransientNetwork => "Check connectivity to the backend and retry.",
            Self::RemoteRejection => "The backend refused the request; retry or pick another format.",
            Self::Timeout => "The job did not finish in time; submit it again.",
            Self::Bridge => {
                "Install and enable the cookie bridge extension, log in to the video site, then retry."
            }
        }
    }
}
