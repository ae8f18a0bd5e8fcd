//! Privileged context: the only context allowed to read the cookie store.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::cookies::to_transport_text;
use super::error::BridgeError;
use super::message::{CookiesPayload, NO_COOKIES_MESSAGE, PrivilegedRequest};
use super::store::CookieStore;

const REQUEST_QUEUE: usize = 16;

struct Call {
    request: PrivilegedRequest,
    reply: oneshot::Sender<CookiesPayload>,
}

/// Sender side of the privileged context's one-shot request channel.
#[derive(Clone)]
pub struct PrivilegedHandle {
    tx: mpsc::Sender<Call>,
}

impl std::fmt::Debug for PrivilegedHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivilegedHandle")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

impl PrivilegedHandle {
    /// Sends `request` and waits for the answer.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::ChannelClosed`] if the privileged context has
    /// stopped or dropped the request.
    pub async fn send(&self, request: PrivilegedRequest) -> Result<CookiesPayload, BridgeError> {
        let (reply, answer) = oneshot::channel();
        self.tx
            .send(Call { request, reply })
            .await
            .map_err(|_| BridgeError::ChannelClosed)?;
        answer.await.map_err(|_| BridgeError::ChannelClosed)
    }
}

/// Starts the privileged context for `domain`.
///
/// The task ends when every [`PrivilegedHandle`] is dropped.
pub fn spawn_privileged(
    store: Arc<dyn CookieStore>,
    domain: impl Into<String>,
) -> (PrivilegedHandle, JoinHandle<()>) {
    let domain = domain.into();
    let (tx, mut rx) = mpsc::channel::<Call>(REQUEST_QUEUE);

    let task = tokio::spawn(async move {
        info!(domain = %domain, "privileged context running");
        while let Some(call) = rx.recv().await {
            let payload = match call.request {
                PrivilegedRequest::GetCookies => answer_get_cookies(store.as_ref(), &domain),
            };
            if call.reply.send(payload).is_err() {
                debug!("requester went away before the answer");
            }
        }
        debug!("privileged context stopped");
    });

    (PrivilegedHandle { tx }, task)
}

fn answer_get_cookies(store: &dyn CookieStore, domain: &str) -> CookiesPayload {
    match store.cookies_for_domain(domain) {
        Ok(records) if records.is_empty() => {
            warn!(domain, "no cookies found");
            CookiesPayload::failure(NO_COOKIES_MESSAGE)
        }
        Ok(records) => {
            info!(domain, count = records.len(), "cookie text generated");
            CookiesPayload::ok(to_transport_text(&records))
        }
        Err(error) => {
            warn!(domain, error = %error, "cookie store read failed");
            CookiesPayload::failure(error.to_string())
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::bridge::cookies::CookieRecord;
    use crate::bridge::store::MemoryCookieStore;

    #[tokio::test]
    async fn test_answers_with_transport_text() {
        let store = MemoryCookieStore::new(vec![CookieRecord::new(
            ".youtube.com",
            false,
            "/",
            true,
            1_735_689_600,
            "SID",
            "abc",
        )]);
        let (handle, _task) = spawn_privileged(Arc::new(store), ".youtube.com");
        let payload = handle.send(PrivilegedRequest::GetCookies).await.unwrap();
        assert!(payload.success);
        assert_eq!(
            payload.cookies.as_deref(),
            Some(".youtube.com\tFALSE\t/\tTRUE\t1735689600\tSID\tabc")
        );
    }

    #[tokio::test]
    async fn test_empty_store_answers_no_cookies_found() {
        let (handle, _task) = spawn_privileged(Arc::new(MemoryCookieStore::default()), ".youtube.com");
        let payload = handle.send(PrivilegedRequest::GetCookies).await.unwrap();
        assert!(!payload.success);
        assert_eq!(payload.error.as_deref(), Some("No cookies found"));
    }

    #[tokio::test]
    async fn test_task_stops_when_handles_dropped() {
        let (handle, task) = spawn_privileged(Arc::new(MemoryCookieStore::default()), ".youtube.com");
        drop(handle);
        task.await.unwrap();
    }
}
