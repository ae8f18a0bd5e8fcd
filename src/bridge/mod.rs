//! Credential bridge: harvests browser session cookies for upload.
//!
//! Three isolated contexts cooperate, sharing no memory:
//!
//! ```text
//! page ──GET_COOKIES──▶ relay ──getCookies──▶ privileged ──▶ CookieStore
//!  ▲                      │                       │
//!  └──COOKIES_RESPONSE────┘◀──{success, ...}──────┘
//! ```
//!
//! - The privileged context ([`spawn_privileged`]) is the only one that reads
//!   the [`CookieStore`]. It answers one-shot requests.
//! - The relay ([`spawn_relay`]) listens on the page bus and forwards.
//! - The page ([`PageContext`]) posts a request and waits for the matching
//!   answer under a caller-imposed timeout.
//!
//! The cookie blob is Netscape `cookies.txt` text, see [`to_transport_text`].

mod cookies;
mod error;
mod message;
mod page;
mod privileged;
mod relay;
mod store;

pub use cookies::{
    CookieError, CookieRecord, ParseResult, parse_cookie_reader, parse_cookie_text,
    to_transport_text,
};
pub use error::BridgeError;
pub use message::{
    CookiesPayload, NO_COOKIES_MESSAGE, PageEvent, PageId, PageMessage, PrivilegedRequest,
};
pub use page::PageContext;
pub use privileged::{PrivilegedHandle, spawn_privileged};
pub use relay::spawn_relay;
pub use store::{CookieStore, MemoryCookieStore, NetscapeFileStore};

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

/// A page wired to its relay and a privileged context.
///
/// Dropping the bridge stops both background contexts.
#[derive(Debug)]
pub struct CredentialBridge {
    page: PageContext,
    privileged: JoinHandle<()>,
    relay: JoinHandle<()>,
}

impl CredentialBridge {
    /// Starts all three contexts reading cookies for `domain` from `store`.
    #[must_use]
    pub fn spawn(store: Arc<dyn CookieStore>, domain: impl Into<String>) -> Self {
        let page = PageContext::new(PageId::next());
        let (handle, privileged) = spawn_privileged(store, domain);
        let relay = spawn_relay(&page, handle);
        Self {
            page,
            privileged,
            relay,
        }
    }

    /// The requesting page.
    #[must_use]
    pub fn page(&self) -> &PageContext {
        &self.page
    }

    /// Shorthand for [`PageContext::request_cookies`].
    ///
    /// # Errors
    ///
    /// See [`PageContext::request_cookies`].
    pub async fn request_cookies(&self, timeout: Duration) -> Result<String, BridgeError> {
        self.page.request_cookies(timeout).await
    }
}

impl Drop for CredentialBridge {
    fn drop(&mut self) {
        self.relay.abort();
        self.privileged.abort();
    }
}
