//! Relay context: forwards a page's cookie requests to the privileged context.

use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::message::{PageEvent, PageMessage, PrivilegedRequest};
use super::page::PageContext;
use super::privileged::PrivilegedHandle;

/// Attaches a relay to `page`.
///
/// The relay keeps no state between requests. It reacts only to
/// `GET_COOKIES` posted by `page` itself and answers with a
/// `COOKIES_RESPONSE` carrying the privileged payload unchanged. If the
/// privileged context cannot be reached, nothing is posted and the page
/// runs into its own timeout.
///
/// The relay holds a sender to the page bus, so it runs until aborted.
pub fn spawn_relay(page: &PageContext, privileged: PrivilegedHandle) -> JoinHandle<()> {
    let own = page.id();
    let bus = page.sender();
    let mut rx = page.subscribe();

    tokio::spawn(async move {
        loop {
            let message = match rx.recv().await {
                Ok(message) => message,
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "relay lagged behind page bus");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };

            let PageMessage {
                source,
                event: PageEvent::GetCookies { request_id },
            } = message
            else {
                continue;
            };
            if source != own {
                debug!(source = source.0, "ignoring cookie request from another page");
                continue;
            }

            debug!(?request_id, "relaying cookie request");
            let privileged = privileged.clone();
            let bus = bus.clone();
            tokio::spawn(async move {
                match privileged.send(PrivilegedRequest::GetCookies).await {
                    Ok(data) => {
                        let response = PageMessage {
                            source: own,
                            event: PageEvent::CookiesResponse { request_id, data },
                        };
                        if bus.send(response).is_err() {
                            debug!("page left before the cookie answer");
                        }
                    }
                    Err(error) => {
                        warn!(error = %error, "privileged context unreachable");
                    }
                }
            });
        }
        debug!("relay stopped");
    })
}
