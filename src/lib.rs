//! vidfetch Core Library
//!
//! This library drives a remote video extraction backend from the client
//! side: it analyzes a URL, submits a download job for a chosen format, polls
//! the job until the file can be retrieved, and harvests browser session
//! cookies so restricted videos can be fetched.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`media`] - Video metadata and format descriptors returned by the backend
//! - [`remote`] - The [`JobBackend`] seam and its HTTP implementation
//! - [`poller`] - Fixed-budget polling loop for file retrieval
//! - [`bridge`] - Cookie relay between the privileged, relay, and page contexts
//! - [`orchestrator`] - The job lifecycle state machine
//! - [`failure`] - Fault classification shared by all error types

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bridge;
pub mod failure;
pub mod media;
pub mod orchestrator;
pub mod poller;
pub mod remote;
mod user_agent;

// Re-export commonly used types
pub use bridge::{
    BridgeError, CookieError, CookieRecord, CookieStore, CredentialBridge, MemoryCookieStore,
    NetscapeFileStore, PageContext, parse_cookie_text, to_transport_text,
};
pub use failure::FaultClass;
pub use media::{FormatDescriptor, FormatTab, VideoInfo, format_duration, format_file_size};
pub use orchestrator::{
    CredentialState, DownloadJob, JobOutcome, JobPhase, Orchestrator, OrchestratorError,
    OrchestratorState, SelectOutcome, Stage,
};
pub use poller::{
    Artifact, CancelSignal, DEFAULT_MAX_ATTEMPTS, DEFAULT_POLL_INTERVAL, DownloadPoller,
    MIN_PAYLOAD_BYTES, PollPolicy, TerminalOutcome, artifact_file_name,
};
pub use remote::{FileResponse, HttpBackend, JobBackend, RemoteError};
