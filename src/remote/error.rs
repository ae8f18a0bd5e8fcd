//! Error types for the remote job client.
//!
//! Each variant maps to one [`FaultClass`], which is what the orchestrator
//! and poller branch on. Messages are written to be shown to the user as-is.

use thiserror::Error;

use crate::failure::FaultClass;

/// Errors returned by [`JobBackend`](super::JobBackend) operations.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// The backend rejected the URL as malformed or unsupported (HTTP 400).
    #[error("invalid video URL {url}: {message}")]
    InvalidUrl {
        /// The URL that was submitted.
        url: String,
        /// Backend-provided reason.
        message: String,
    },

    /// The stored session cookies are missing or expired (HTTP 401).
    #[error("[AUTH] {message} (HTTP 401 from {endpoint})")]
    AuthRequired {
        /// The endpoint that rejected the session.
        endpoint: String,
        /// Backend-provided reason.
        message: String,
    },

    /// Any other non-success response.
    #[error("{message} (HTTP {status} from {endpoint})")]
    Unavailable {
        /// The endpoint that failed.
        endpoint: String,
        /// The HTTP status code.
        status: u16,
        /// Backend-provided reason, or a generic message when none was sent.
        message: String,
    },

    /// Network-level failure (DNS, connection refused, reset, TLS).
    #[error("network error calling {endpoint}: {source}")]
    Network {
        /// The endpoint being called.
        endpoint: String,
        /// The underlying transport error.
        #[source]
        source: reqwest::Error,
    },

    /// The request did not complete within the client timeout.
    #[error("timeout calling {endpoint}")]
    Timeout {
        /// The endpoint being called.
        endpoint: String,
    },

    /// The backend answered 2xx with a body that could not be decoded.
    #[error("unexpected response from {endpoint}: {reason}")]
    Decode {
        /// The endpoint being called.
        endpoint: String,
        /// What was wrong with the body.
        reason: String,
    },

    /// The cookie upload was refused.
    #[error("failed to upload cookies (HTTP {status}): {message}")]
    UploadRejected {
        /// The HTTP status code.
        status: u16,
        /// Backend-provided reason.
        message: String,
    },

    /// The configured backend URL cannot be used.
    #[error("invalid backend URL: {url}")]
    InvalidBackendUrl {
        /// The configured value.
        url: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

impl RemoteError {
    /// Creates an auth error for `endpoint`.
    pub fn auth_required(endpoint: impl Into<String>, message: impl Into<String>) -> Self {
        Self::AuthRequired {
            endpoint: endpoint.into(),
            message: message.into(),
        }
    }

    /// Creates a generic failure for a non-success status.
    pub fn unavailable(endpoint: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Unavailable {
            endpoint: endpoint.into(),
            status,
            message: message.into(),
        }
    }

    /// Wraps a transport error, promoting timeouts to [`RemoteError::Timeout`].
    pub fn transport(endpoint: impl Into<String>, source: reqwest::Error) -> Self {
        let endpoint = endpoint.into();
        if source.is_timeout() {
            Self::Timeout { endpoint }
        } else {
            Self::Network { endpoint, source }
        }
    }

    /// Creates a decode error.
    pub fn decode(endpoint: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Decode {
            endpoint: endpoint.into(),
            reason: reason.into(),
        }
    }

    /// Classifies the error for retry and surfacing decisions.
    #[must_use]
    pub fn fault_class(&self) -> FaultClass {
        match self {
            Self::InvalidUrl { .. } | Self::InvalidBackendUrl { .. } | Self::Client(_) => {
                FaultClass::Input
            }
            Self::AuthRequired { .. } | Self::UploadRejected { .. } => FaultClass::Auth,
            Self::Network { .. } | Self::Timeout { .. } => FaultClass::TransientNetwork,
            Self::Unavailable { .. } | Self::Decode { .. } => FaultClass::RemoteRejection,
        }
    }

    /// Returns true for session-level faults that must flip the credential state.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Self::AuthRequired { .. })
    }

    /// Text for the single error slot shown to the user.
    ///
    /// Backend-provided reasons are passed through as-is; transport faults
    /// use the full display text.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidUrl { message, .. }
            | Self::AuthRequired { message, .. }
            | Self::Unavailable { message, .. }
            | Self::UploadRejected { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// The HTTP status behind the error, if one was received.
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::InvalidUrl { .. } => Some(400),
            Self::AuthRequired { .. } => Some(401),
            Self::Unavailable { status, .. } | Self::UploadRejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}
