//! Retry policy for release downloads.
//!
//! Client errors (4xx) will not go away by asking again and fail at once;
//! server errors and transport failures are retried.

use reqwest::StatusCode;
use std::time::Duration;

/// Default number of attempts for a download.
pub const MAX_ATTEMPTS: usize = 3;

/// Default delay between attempts in milliseconds.
pub const RETRY_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
            delay: Duration::from_millis(RETRY_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// A single attempt and no delay.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            delay: Duration::ZERO,
        }
    }
}

/// Failures that are reported immediately instead of retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NonRetryableError {
    /// HTTP 404: no release asset at this URL
    NotFound(String),
    /// HTTP 401
    AuthenticationFailed(String),
    /// HTTP 403 without a rate limit
    Forbidden(String),
    /// HTTP 429, or 403 carrying a rate limit message
    RateLimited(String),
    /// Any other 4xx
    ClientError(u16, String),
}

impl std::fmt::Display for NonRetryableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NonRetryableError::NotFound(url) => {
                write!(f, "Release asset not found: {}", url)
            }
            NonRetryableError::AuthenticationFailed(url) => {
                write!(f, "Authentication failed for {}. Check GITHUB_TOKEN.", url)
            }
            NonRetryableError::Forbidden(url) => {
                write!(f, "Access forbidden: {}", url)
            }
            NonRetryableError::RateLimited(url) => {
                write!(
                    f,
                    "Rate limit exceeded while fetching {}. Try again later or set GITHUB_TOKEN.",
                    url
                )
            }
            NonRetryableError::ClientError(status, url) => {
                write!(f, "HTTP {} error for {}", status, url)
            }
        }
    }
}

impl std::error::Error for NonRetryableError {}

/// Returns the non-retryable classification of a response status, if any.
pub fn classify_status(status: StatusCode, url: &str, body_hint: &str) -> Option<NonRetryableError> {
    let url = url.to_string();
    match status {
        StatusCode::NOT_FOUND => Some(NonRetryableError::NotFound(url)),
        StatusCode::UNAUTHORIZED => Some(NonRetryableError::AuthenticationFailed(url)),
        StatusCode::TOO_MANY_REQUESTS => Some(NonRetryableError::RateLimited(url)),
        StatusCode::FORBIDDEN if body_hint.to_lowercase().contains("rate limit") => {
            Some(NonRetryableError::RateLimited(url))
        }
        StatusCode::FORBIDDEN => Some(NonRetryableError::Forbidden(url)),
        s if s.is_client_error() => Some(NonRetryableError::ClientError(s.as_u16(), url)),
        _ => None,
    }
}

/// Whether an error from a download attempt is worth another attempt.
pub fn is_retryable(e: &anyhow::Error) -> bool {
    e.downcast_ref::<NonRetryableError>().is_none()
}
