//! # Request Context
//!
//! The transport-agnostic slice of an incoming request that the core needs:
//! the request URL, a handful of headers, and the caller's I/O deadline.

use std::collections::BTreeMap;
use std::time::Duration;

/// Identity shared by every request we cannot attribute to an address.
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// Deadline applied to storage calls when the caller does not pick one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Absolute request URL, query string included
    pub url: String,
    /// Header names are stored lowercase
    headers: BTreeMap<String, String>,
    /// Upper bound for each storage call made on behalf of this request
    pub timeout: Duration,
}

impl RequestContext {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Case-insensitive lookup. Blank values count as absent.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn referrer(&self) -> Option<&str> {
        self.header("referer")
    }

    pub fn user_agent(&self) -> Option<&str> {
        self.header("user-agent")
    }

    /// Caller identity for rate limiting.
    ///
    /// Precedence: first `X-Forwarded-For` entry, then `X-Real-IP`, then the
    /// shared `unknown` bucket.
    pub fn client_identity(&self) -> String {
        let forwarded = self
            .header("x-forwarded-for")
            .and_then(|chain| chain.split(',').next())
            .map(str::trim)
            .filter(|ip| !ip.is_empty());

        forwarded
            .or_else(|| self.header("x-real-ip"))
            .unwrap_or(UNKNOWN_IDENTITY)
            .to_string()
    }
}
