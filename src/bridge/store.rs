//! Cookie stores readable from the privileged context.

use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use super::cookies::{CookieRecord, parse_cookie_text};
use super::error::BridgeError;

/// Read-only access to a browser's cookie jar.
///
/// Implementations must be pure reads; the bridge never writes cookies.
pub trait CookieStore: Send + Sync {
    /// All cookies belonging to `domain` or its subdomains.
    ///
    /// An empty result is not an error here; the privileged context decides
    /// what to answer.
    ///
    /// # Errors
    ///
    /// Returns [`BridgeError::Store`] if the underlying jar cannot be read.
    fn cookies_for_domain(&self, domain: &str) -> Result<Vec<CookieRecord>, BridgeError>;
}

/// In-memory cookie jar.
#[derive(Debug, Clone, Default)]
pub struct MemoryCookieStore {
    cookies: Vec<CookieRecord>,
}

impl MemoryCookieStore {
    /// Creates a store holding `cookies`.
    #[must_use]
    pub fn new(cookies: Vec<CookieRecord>) -> Self {
        Self { cookies }
    }

    /// Adds a cookie.
    pub fn insert(&mut self, cookie: CookieRecord) {
        self.cookies.push(cookie);
    }
}

impl CookieStore for MemoryCookieStore {
    fn cookies_for_domain(&self, domain: &str) -> Result<Vec<CookieRecord>, BridgeError> {
        Ok(self
            .cookies
            .iter()
            .filter(|c| c.matches_domain(domain))
            .cloned()
            .collect())
    }
}

/// A `cookies.txt` export on disk, re-read on every request.
#[derive(Debug, Clone)]
pub struct NetscapeFileStore {
    path: PathBuf,
}

impl NetscapeFileStore {
    /// Creates a store backed by the file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The backing file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl CookieStore for NetscapeFileStore {
    #[instrument(level = "debug", skip(self), fields(path = %self.path.display()))]
    fn cookies_for_domain(&self, domain: &str) -> Result<Vec<CookieRecord>, BridgeError> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| BridgeError::Store {
            reason: format!("cannot read {}: {e}", self.path.display()),
        })?;

        // A file with no parseable lines is an empty jar, not a broken store.
        let Ok(parsed) = parse_cookie_text(&text) else {
            debug!("cookie file has no valid cookies");
            return Ok(Vec::new());
        };

        let matching: Vec<CookieRecord> = parsed
            .cookies
            .into_iter()
            .filter(|c| c.matches_domain(domain))
            .collect();
        debug!(count = matching.len(), "cookies matched domain");
        Ok(matching)
    }
}
