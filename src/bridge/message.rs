//! Wire messages exchanged between the bridge contexts.
//!
//! The JSON shapes match what the browser extension and page script send:
//!
//! ```json
//! {"action": "getCookies"}
//! {"success": true, "cookies": "..."}
//! {"success": false, "error": "No cookies found"}
//! {"type": "GET_COOKIES", "requestId": 7}
//! {"type": "COOKIES_RESPONSE", "requestId": 7, "data": {"success": true, "cookies": "..."}}
//! ```
//!
//! `requestId` is optional on the wire; events without one match any waiter.

use serde::{Deserialize, Serialize};

use super::error::BridgeError;

/// Request sent from the relay into the privileged context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum PrivilegedRequest {
    /// Read all session cookies for the configured domain.
    #[serde(rename = "getCookies")]
    GetCookies,
}

/// Privileged context answer, relayed to the page unchanged.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookiesPayload {
    /// Whether `cookies` holds a transport blob.
    pub success: bool,
    /// Netscape transport text when `success`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cookies: Option<String>,
    /// Failure reason when not `success`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CookiesPayload {
    /// A successful answer carrying `cookies`.
    #[must_use]
    pub fn ok(cookies: String) -> Self {
        Self {
            success: true,
            cookies: Some(cookies),
            error: None,
        }
    }

    /// A failed answer with `reason`.
    #[must_use]
    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            success: false,
            cookies: None,
            error: Some(reason.into()),
        }
    }

    /// Converts the answer into the cookie blob or a [`BridgeError::NoCookies`].
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::NoCookies`] with the reported reason for a
    /// failure payload, or for a success payload without cookies.
    pub fn into_result(self) -> Result<String, BridgeError> {
        match (self.success, self.cookies) {
            (true, Some(cookies)) if !cookies.is_empty() => Ok(cookies),
            _ => Err(BridgeError::NoCookies(
                self.error.unwrap_or_else(|| NO_COOKIES_MESSAGE.to_string()),
            )),
        }
    }
}

impl std::fmt::Debug for CookiesPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookiesPayload")
            .field("success", &self.success)
            .field(
                "cookies",
                &self.cookies.as_ref().map(|c| format!("[REDACTED; {} bytes]", c.len())),
            )
            .field("error", &self.error)
            .finish()
    }
}

/// Reason reported when the store holds no cookies for the domain.
pub const NO_COOKIES_MESSAGE: &str = "No cookies found";

/// Events posted on a page's message bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum PageEvent {
    /// The page asks for cookies.
    #[serde(rename = "GET_COOKIES")]
    GetCookies {
        /// Correlates the answer with its request.
        #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
        request_id: Option<u64>,
    },
    /// The relay answers.
    #[serde(rename = "COOKIES_RESPONSE")]
    CookiesResponse {
        /// Copied from the matching request.
        #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
        request_id: Option<u64>,
        /// The privileged context's answer.
        data: CookiesPayload,
    },
}

/// Identity of a page; events posted by other pages are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageId(pub u64);

/// An event together with the page that posted it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageMessage {
    /// The posting page.
    pub source: PageId,
    /// The event.
    pub event: PageEvent,
}
