//! Chat provider error types with retry classification.
//!
//! Distinguishes transient errors (retry with backoff) from permanent ones
//! (surface to the agent loop immediately).

use std::time::Duration;

/// Error from a chat or embedding API call.
#[derive(Debug)]
pub struct LlmError {
    pub kind: LlmErrorKind,
    /// HTTP status code, if applicable.
    pub status_code: Option<u16>,
    pub message: String,
    /// Delay requested by the provider (from a `Retry-After` header).
    pub retry_after: Option<Duration>,
}

impl LlmError {
    /// Build an error from an HTTP response status and body.
    pub fn from_status(status: u16, message: String, retry_after: Option<Duration>) -> Self {
        Self {
            kind: classify_http_status(status),
            status_code: Some(status),
            message,
            retry_after,
        }
    }

    /// Connection failure, timeout, or other transport problem.
    pub fn network(message: String) -> Self {
        Self {
            kind: LlmErrorKind::Network,
            status_code: None,
            message,
            retry_after: None,
        }
    }

    /// The provider answered but the body did not parse.
    pub fn parse(message: String) -> Self {
        Self {
            kind: LlmErrorKind::Parse,
            status_code: None,
            message,
            retry_after: None,
        }
    }

    /// Whether another attempt against the same provider can succeed.
    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }

    /// Delay before the next attempt: the provider's `Retry-After` when
    /// present, otherwise exponential backoff by error kind, capped at one
    /// minute.
    pub fn suggested_delay(&self, attempt: u32) -> Duration {
        if let Some(retry_after) = self.retry_after {
            return retry_after;
        }

        let base_secs = match self.kind {
            LlmErrorKind::RateLimited => 5,
            LlmErrorKind::Server => 2,
            _ => 1,
        };
        let delay_secs = base_secs * 2u64.saturating_pow(attempt);
        Duration::from_secs(delay_secs.min(60))
    }
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} (HTTP {}): {}", self.kind, code, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for LlmError {}

/// Classification of provider errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// 429: transient, retry with backoff.
    RateLimited,
    /// 5xx: transient, retry.
    Server,
    /// Other 4xx (bad request, auth): permanent.
    Client,
    /// Transport failure: transient.
    Network,
    /// Unparsable response body: permanent.
    Parse,
}

impl LlmErrorKind {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LlmErrorKind::RateLimited | LlmErrorKind::Server | LlmErrorKind::Network
        )
    }
}

impl std::fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LlmErrorKind::RateLimited => "rate limited",
            LlmErrorKind::Server => "server error",
            LlmErrorKind::Client => "client error",
            LlmErrorKind::Network => "network error",
            LlmErrorKind::Parse => "parse error",
        };
        f.write_str(s)
    }
}

/// Retry policy for provider calls.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Additional attempts after the first failure.
    pub max_retries: u32,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_retries: 3 }
    }
}

impl RetryConfig {
    pub fn should_retry(&self, error: &LlmError, attempt: u32) -> bool {
        attempt < self.max_retries && error.is_transient()
    }
}

/// Map an HTTP status code to an error kind.
pub fn classify_http_status(status: u16) -> LlmErrorKind {
    match status {
        429 => LlmErrorKind::RateLimited,
        500 | 502 | 503 | 504 => LlmErrorKind::Server,
        400..=499 => LlmErrorKind::Client,
        _ => LlmErrorKind::Server,
    }
}
