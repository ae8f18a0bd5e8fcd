//! Netscape cookie text: the record type, serializer, and parser.
//!
//! The transport format is the classic `cookies.txt` layout: one cookie per
//! line, 7 TAB-separated fields, lines joined by `\n`:
//!
//! ```text
//! domain  host_only  path  secure  expires  name  value
//! ```
//!
//! `host_only` and `secure` are `TRUE`/`FALSE`; `expires` is a Unix
//! timestamp, `0` for session cookies.

use std::fmt;
use std::io::BufRead;

use tracing::{debug, instrument, warn};

/// One browser cookie.
///
/// The value is redacted in `Debug` output.
#[derive(Clone, PartialEq, Eq)]
pub struct CookieRecord {
    /// Cookie domain, e.g. `.youtube.com`.
    pub domain: String,
    /// Written to the second column as `TRUE`/`FALSE`.
    pub host_only: bool,
    /// URL path scope.
    pub path: String,
    /// HTTPS only.
    pub secure: bool,
    /// Unix expiry timestamp, 0 for session cookies.
    pub expires: u64,
    /// Cookie name.
    pub name: String,
    value: String,
}

impl CookieRecord {
    /// Creates a cookie record.
    #[must_use]
    pub fn new(
        domain: impl Into<String>,
        host_only: bool,
        path: impl Into<String>,
        secure: bool,
        expires: u64,
        name: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            domain: domain.into(),
            host_only,
            path: path.into(),
            secure,
            expires,
            name: name.into(),
            value: value.into(),
        }
    }

    /// The cookie value. Sensitive; do not log.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Whether this is a session cookie.
    #[must_use]
    pub fn is_session(&self) -> bool {
        self.expires == 0
    }

    /// Whether the cookie belongs to `domain` or one of its subdomains.
    ///
    /// Leading dots are ignored on both sides and comparison is ASCII
    /// case-insensitive, so `.youtube.com` matches `youtube.com`,
    /// `www.youtube.com`, and `.youtube.com`, but not `notyoutube.com`.
    #[must_use]
    pub fn matches_domain(&self, domain: &str) -> bool {
        let cookie = self.domain.trim_start_matches('.').to_ascii_lowercase();
        let wanted = domain.trim_start_matches('.').to_ascii_lowercase();
        if wanted.is_empty() {
            return false;
        }
        cookie == wanted
            || cookie
                .strip_suffix(&wanted)
                .is_some_and(|prefix| prefix.ends_with('.'))
    }

    /// One transport line, without the trailing newline.
    #[must_use]
    pub fn to_line(&self) -> String {
        [
            self.domain.as_str(),
            bool_field(self.host_only),
            self.path.as_str(),
            bool_field(self.secure),
            &self.expires.to_string(),
            self.name.as_str(),
            self.value.as_str(),
        ]
        .join("\t")
    }
}

impl fmt::Debug for CookieRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CookieRecord")
            .field("domain", &self.domain)
            .field("host_only", &self.host_only)
            .field("path", &self.path)
            .field("secure", &self.secure)
            .field("expires", &self.expires)
            .field("name", &self.name)
            .field("value", &"[REDACTED]")
            .finish()
    }
}

fn bool_field(value: bool) -> &'static str {
    if value { "TRUE" } else { "FALSE" }
}

/// Serializes records into transport text.
///
/// Lines are joined by `\n` with no trailing newline; an empty slice yields
/// an empty string.
#[must_use]
pub fn to_transport_text(records: &[CookieRecord]) -> String {
    records
        .iter()
        .map(CookieRecord::to_line)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Errors that can occur while parsing cookie text.
#[derive(Debug, thiserror::Error)]
pub enum CookieError {
    /// A line has an invalid format.
    #[error("line {line_number}: {reason} (got: {content})")]
    InvalidLine {
        /// 1-based line number.
        line_number: usize,
        /// The offending line, value redacted.
        content: String,
        /// What was wrong.
        reason: String,
    },

    /// I/O error reading the cookie file.
    #[error("failed to read cookie file: {0}")]
    Io(#[from] std::io::Error),

    /// The input contained no valid cookie lines.
    #[error("no valid cookies found ({malformed_count} lines failed to parse)")]
    NoCookiesFound {
        /// Number of malformed lines encountered.
        malformed_count: usize,
    },
}

/// Parsed cookies plus warnings for malformed lines.
#[derive(Debug)]
pub struct ParseResult {
    /// Successfully parsed cookies.
    pub cookies: Vec<CookieRecord>,
    /// Line number and reason for each skipped line.
    pub warnings: Vec<(usize, String)>,
}

/// Parses Netscape cookie text.
///
/// Comment lines (`#`) and blank lines are skipped, except that the
/// `#HttpOnly_` prefix some exporters write is stripped and the cookie kept.
/// Malformed lines are reported as warnings.
///
/// # Errors
///
/// Returns [`CookieError::NoCookiesFound`] when no line parses, including
/// for empty input.
pub fn parse_cookie_text(text: &str) -> Result<ParseResult, CookieError> {
    parse_cookie_reader(text.as_bytes())
}

/// Parses Netscape cookie text from a reader.
///
/// # Errors
///
/// Returns [`CookieError::Io`] on read failure, or
/// [`CookieError::NoCookiesFound`] when no line parses.
#[instrument(level = "debug", skip(reader))]
pub fn parse_cookie_reader(reader: impl BufRead) -> Result<ParseResult, CookieError> {
    let mut cookies = Vec::new();
    let mut warnings = Vec::new();

    for (idx, line_result) in reader.lines().enumerate() {
        let line_number = idx + 1;
        let line = line_result?;
        let line = line.trim_end_matches(['\r', '\n']);

        if line.trim().is_empty() {
            continue;
        }

        let line = match line.strip_prefix("#HttpOnly_") {
            Some(rest) => rest,
            None if line.starts_with('#') => continue,
            None => line,
        };

        match parse_cookie_line(line, line_number) {
            Ok(cookie) => {
                debug!(
                    line = line_number,
                    domain = %cookie.domain,
                    name = %cookie.name,
                    "parsed cookie"
                );
                cookies.push(cookie);
            }
            Err(e) => {
                warn!(line = line_number, reason = %e, "skipping malformed cookie line");
                warnings.push((line_number, e.to_string()));
            }
        }
    }

    if cookies.is_empty() {
        return Err(CookieError::NoCookiesFound {
            malformed_count: warnings.len(),
        });
    }

    Ok(ParseResult { cookies, warnings })
}

fn parse_cookie_line(line: &str, line_number: usize) -> Result<CookieRecord, CookieError> {
    let invalid = |reason: String| CookieError::InvalidLine {
        line_number,
        content: redact_line_for_error(line),
        reason,
    };

    let fields: Vec<&str> = line.split('\t').collect();
    let [domain, host_only, path, secure, expires, name, value] = fields.as_slice() else {
        return Err(invalid(format!(
            "expected 7 TAB-separated fields, found {}",
            fields.len()
        )));
    };

    if domain.is_empty() {
        return Err(invalid("domain field is empty".to_string()));
    }
    if name.is_empty() {
        return Err(invalid("cookie name field is empty".to_string()));
    }

    let host_only = parse_bool_field(host_only).ok_or_else(|| {
        invalid(format!("host-only field must be TRUE or FALSE, got '{host_only}'"))
    })?;
    let secure = parse_bool_field(secure)
        .ok_or_else(|| invalid(format!("secure field must be TRUE or FALSE, got '{secure}'")))?;
    let expires = parse_expires(expires).ok_or_else(|| {
        invalid(format!(
            "expires field must be a non-negative number, got '{expires}'"
        ))
    })?;

    Ok(CookieRecord::new(
        *domain, host_only, *path, secure, expires, *name, *value,
    ))
}

fn parse_bool_field(value: &str) -> Option<bool> {
    match value {
        v if v.eq_ignore_ascii_case("TRUE") => Some(true),
        v if v.eq_ignore_ascii_case("FALSE") => Some(false),
        _ => None,
    }
}

// Browsers report fractional expiry timestamps; whole seconds are kept.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn parse_expires(value: &str) -> Option<u64> {
    if let Ok(secs) = value.parse::<u64>() {
        return Some(secs);
    }
    let secs = value.parse::<f64>().ok()?;
    (secs.is_finite() && secs >= 0.0).then(|| secs.trunc() as u64)
}

fn redact_line_for_error(line: &str) -> String {
    let fields: Vec<&str> = line.split('\t').collect();
    if fields.len() >= 7 {
        let mut redacted = fields[..6].join("\t");
        redacted.push_str("\t[REDACTED]");
        redacted
    } else {
        line.to_string()
    }
}
