//! Page context: the requesting side of the bridge.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, instrument, warn};

use super::error::BridgeError;
use super::message::{PageEvent, PageId, PageMessage};

const BUS_CAPACITY: usize = 64;

static NEXT_PAGE_ID: AtomicU64 = AtomicU64::new(1);

impl PageId {
    /// Allocates a process-unique page id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_PAGE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A page and its message bus.
///
/// Everything posted to the page, by itself, its relay, or anyone else,
/// goes through the same bus; receivers filter by [`PageMessage::source`].
#[derive(Debug)]
pub struct PageContext {
    id: PageId,
    bus: broadcast::Sender<PageMessage>,
    next_request: AtomicU64,
}

impl PageContext {
    /// Creates a page with its own bus.
    #[must_use]
    pub fn new(id: PageId) -> Self {
        let (bus, _) = broadcast::channel(BUS_CAPACITY);
        Self {
            id,
            bus,
            next_request: AtomicU64::new(1),
        }
    }

    /// This page's id.
    #[must_use]
    pub fn id(&self) -> PageId {
        self.id
    }

    /// Subscribes to every message posted from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<PageMessage> {
        self.bus.subscribe()
    }

    /// Posts `message` to the bus. Messages with no subscriber are dropped.
    pub fn post(&self, message: PageMessage) {
        if self.bus.send(message).is_err() {
            debug!("page message dropped; no listener");
        }
    }

    pub(crate) fn sender(&self) -> broadcast::Sender<PageMessage> {
        self.bus.clone()
    }

    /// Asks the relay for the cookie blob and waits up to `timeout`.
    ///
    /// # Errors
    ///
    /// - [`BridgeError::NoCookies`] with the privileged context's reason
    /// - [`BridgeError::Unreachable`] when nothing answers in time
    #[instrument(skip(self), fields(page = self.id.0))]
    pub async fn request_cookies(&self, timeout: Duration) -> Result<String, BridgeError> {
        let request_id = self.next_request.fetch_add(1, Ordering::Relaxed);
        // Subscribe before posting so a fast answer cannot be missed.
        let mut rx = self.subscribe();
        self.post(PageMessage {
            source: self.id,
            event: PageEvent::GetCookies {
                request_id: Some(request_id),
            },
        });
        debug!(request_id, "cookie request posted");

        let own = self.id;
        let wait = async move {
            loop {
                match rx.recv().await {
                    Ok(PageMessage {
                        source,
                        event: PageEvent::CookiesResponse { request_id: answered, data },
                    }) if source == own && answered.is_none_or(|id| id == request_id) => {
                        return data.into_result();
                    }
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "page bus lagged while waiting for cookies");
                    }
                    Err(RecvError::Closed) => return Err(BridgeError::ChannelClosed),
                }
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => {
                warn!(request_id, timeout_secs = timeout.as_secs(), "no cookie answer");
                Err(BridgeError::Unreachable { timeout })
            }
        }
    }
}
