//! Errors returned by orchestrator operations.

use thiserror::Error;

use crate::bridge::{BridgeError, CookieError};
use crate::failure::FaultClass;
use crate::remote::RemoteError;

/// Failure of an [`Orchestrator`](super::Orchestrator) operation.
///
/// The same failure is also written to the state's `last_error` slot.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The URL was empty; nothing was sent.
    #[error("please enter a video URL")]
    EmptyUrl,

    /// A backend call failed.
    #[error(transparent)]
    Remote(RemoteError),

    /// The cookie bridge could not deliver cookies.
    #[error(transparent)]
    Bridge(BridgeError),

    /// The cookie text has no usable cookie line.
    #[error("invalid cookie file: {0}")]
    InvalidCookies(#[source] CookieError),
}

impl OrchestratorError {
    /// Classifies the error.
    #[must_use]
    pub fn fault_class(&self) -> FaultClass {
        match self {
            Self::EmptyUrl | Self::InvalidCookies(_) => FaultClass::Input,
            Self::Remote(error) => error.fault_class(),
            Self::Bridge(error) => error.fault_class(),
        }
    }
}
