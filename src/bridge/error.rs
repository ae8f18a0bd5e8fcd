//! Error types for the credential bridge.

use std::time::Duration;

use thiserror::Error;

use crate::failure::FaultClass;

/// Failures of a credential request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The privileged context answered with a failure; the reason is shown verbatim.
    #[error("{0}")]
    NoCookies(String),

    /// No answer arrived within the caller's timeout.
    #[error("browser extension did not answer within {}s", timeout.as_secs())]
    Unreachable {
        /// The timeout that elapsed.
        timeout: Duration,
    },

    /// A context shut down while a request was in flight.
    #[error("browser extension channel closed")]
    ChannelClosed,

    /// The cookie jar could not be read.
    #[error("cookie store unavailable: {reason}")]
    Store {
        /// What went wrong.
        reason: String,
    },
}

impl BridgeError {
    /// Always [`FaultClass::Bridge`].
    #[must_use]
    pub fn fault_class(&self) -> FaultClass {
        FaultClass::Bridge
    }
}
