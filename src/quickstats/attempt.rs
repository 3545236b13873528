//! Failure classification for the retry loop
//!
//! QuickStats and Soil Data Access fail in the same few ways: throttling,
//! overloaded backends, dropped connections and requests they will never
//! accept. [`FailureKind`] sorts a failed attempt into one of those buckets;
//! [`AttemptFailure`] renders the log lines around it.

use reqwest::StatusCode;
use std::fmt;
use std::time::Duration;

/// Why one attempt failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Connect, request or body read timed out
    Timeout,
    /// Connection refused or name resolution failed
    Connect,
    /// HTTP 429
    Throttled,
    /// HTTP 5xx
    Server(u16),
    /// Any 4xx other than 429; the request itself is wrong
    Rejected(u16),
    /// Anything else reqwest reports, including truncated bodies
    Transport,
}

impl FailureKind {
    /// Classify a non-success status
    pub fn from_status(status: StatusCode) -> Self {
        match status.as_u16() {
            429 => Self::Throttled,
            code if status.is_server_error() => Self::Server(code),
            code if status.is_client_error() => Self::Rejected(code),
            _ => Self::Transport,
        }
    }

    /// Classify a reqwest error raised while sending or reading the body
    pub fn from_error(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else if err.is_connect() {
            Self::Connect
        } else if let Some(status) = err.status() {
            Self::from_status(status)
        } else {
            Self::Transport
        }
    }

    /// Whether another identical attempt may succeed
    pub fn is_transient(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }

    /// Outcome label for request metrics
    pub fn label(&self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect_error",
            Self::Throttled => "throttled",
            Self::Server(_) => "server_error",
            Self::Rejected(_) => "rejected",
            Self::Transport => "transport_error",
        }
    }

    /// Operator hint attached to the final failure line
    pub fn hint(&self) -> &'static str {
        match self {
            Self::Timeout | Self::Connect | Self::Transport => "check network connectivity",
            Self::Throttled => "raise --request-delay-ms or lower --concurrency",
            Self::Server(_) => "the service may be in maintenance; rerun later, cached units are skipped",
            Self::Rejected(401 | 403) => "check USDA_NASS_API_KEY",
            Self::Rejected(404) => "the export handle has expired; rerun to resolve a new one",
            Self::Rejected(_) => "check crop names and the year range",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => f.write_str("timed out"),
            Self::Connect => f.write_str("connection failed"),
            Self::Throttled => f.write_str("throttled (429)"),
            Self::Server(code) => write!(f, "server error ({code})"),
            Self::Rejected(code) => write!(f, "rejected ({code})"),
            Self::Transport => f.write_str("transport error"),
        }
    }
}

/// One failed attempt of a logical call
#[derive(Debug, Clone)]
pub struct AttemptFailure<'a> {
    /// 1-based attempt number
    pub attempt: u32,
    /// Attempt ceiling
    pub max_attempts: u32,
    /// Classification
    pub kind: FailureKind,
    /// Error text or status line
    pub message: String,
    /// What was requested: a description and year, a handle, a county
    pub subject: &'a str,
    /// Pause before the next attempt
    pub backoff: Duration,
}

impl AttemptFailure<'_> {
    /// Whether the loop should go around again
    pub fn will_retry(&self) -> bool {
        self.kind.is_transient() && self.attempt < self.max_attempts
    }

    /// Logged before sleeping
    pub fn retry_line(&self) -> String {
        format!(
            "{}: attempt {}/{} {}, retrying in {:.1}s",
            self.subject_or_request(),
            self.attempt,
            self.max_attempts,
            self.kind,
            self.backoff.as_secs_f64()
        )
    }

    /// Logged when the call is abandoned
    pub fn final_line(&self) -> String {
        format!(
            "{}: gave up after {} of {} attempts: {} ({})",
            self.subject_or_request(),
            self.attempt,
            self.max_attempts,
            self.message,
            self.kind.hint()
        )
    }

    fn subject_or_request(&self) -> &str {
        if self.subject.is_empty() {
            "request"
        } else {
            self.subject
        }
    }
}
