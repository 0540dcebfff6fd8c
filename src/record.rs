//! The per-request access log record and its severity classification.

use std::time::Duration;
use tracing::Level;

/// Everything known about one handled request, built fresh per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestRecord {
    pub remote_ip: String,
    /// Time spent inside the delegated handler only
    pub elapsed: Duration,
    pub host: String,
    /// `"{method} {target}"`
    pub request: String,
    pub status: u16,
    pub size: u64,
    pub user_agent: String,
    pub request_id: Option<String>,
    pub error: Option<String>,
}

impl RequestRecord {
    /// Human-readable elapsed duration, e.g. `1.234ms`
    pub fn time(&self) -> String {
        format!("{:?}", self.elapsed)
    }
}

/// Severity and message a status code is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub level: Level,
    pub message: &'static str,
}

/// Maps a response status to its log severity.
///
/// Returns `None` only for 2xx responses when `skip_2xx` is set. Anything below
/// 200 (including an unset status of 0) falls through to "Success".
pub fn classify(status: u16, skip_2xx: bool) -> Option<Classification> {
    let (level, message) = match status {
        500.. => (Level::ERROR, "Server error"),
        400..=499 => (Level::WARN, "Client error"),
        300..=399 => (Level::INFO, "Redirection"),
        200..=299 if skip_2xx => return None,
        _ => (Level::INFO, "Success"),
    };
    Some(Classification { level, message })
}
