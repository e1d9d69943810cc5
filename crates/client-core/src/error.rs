use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{channel::FeedError, types::ConnectionState};

/// Broad error category used for user-facing handling and retry decisions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Invalid input, unsupported state, or other configuration issue.
    Config,
    /// Authentication failure (expired or denied session).
    Auth,
    /// Authenticated but not allowed to touch the resource.
    Permission,
    /// Transient network or transport failure.
    Network,
    /// Rate-limited by the backend.
    RateLimited,
    /// Request did not finish in time.
    Timeout,
    /// Local persistence failure.
    Storage,
    /// Serialization/deserialization failure.
    Serialization,
    /// Internal bug or invariant break.
    Internal,
}

/// Tagged failure produced by an operation against the managed backend.
///
/// `code` is the stable machine-readable tag the retry executor matches against a
/// policy's non-retryable set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[error("{category:?}:{code}: {message}")]
pub struct ClientError {
    /// High-level error category.
    pub category: ErrorCategory,
    /// Stable machine-readable error code.
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Optional server-provided retry hint in milliseconds.
    pub retry_after_ms: Option<u64>,
}

impl ClientError {
    /// Construct a new client error.
    pub fn new(
        category: ErrorCategory,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            category,
            code: code.into(),
            message: message.into(),
            retry_after_ms: None,
        }
    }

    /// Attach a retry hint to the error.
    pub fn with_retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after_ms = Some(retry_after.as_millis() as u64);
        self
    }
}

/// Map HTTP status codes to error categories.
pub fn classify_http_status(status: u16) -> ErrorCategory {
    match status {
        401 => ErrorCategory::Auth,
        403 => ErrorCategory::Permission,
        408 => ErrorCategory::Timeout,
        429 => ErrorCategory::RateLimited,
        400..=499 => ErrorCategory::Config,
        500..=599 => ErrorCategory::Network,
        _ => ErrorCategory::Internal,
    }
}

/// Failures surfaced by the boot gate, retry executor and connectivity gating.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Readiness was not signalled before the caller's deadline.
    #[error("boot did not complete within {timeout:?} (waited {elapsed:?})")]
    BootTimeout {
        /// Time actually spent waiting.
        elapsed: Duration,
        /// Deadline requested by the caller.
        timeout: Duration,
    },
    /// The operation failed with a code the policy marks as never retryable.
    #[error("non-retryable failure on attempt {attempt}: {source}")]
    NonRetryable {
        /// 1-based attempt that produced the failure.
        attempt: u32,
        /// The operation's own error.
        source: ClientError,
    },
    /// Every allowed attempt failed; `source` is the last failure.
    #[error("retries exhausted after {attempts} attempts: {source}")]
    RetriesExhausted {
        /// Number of invocations made.
        attempts: u32,
        /// Error returned by the final attempt.
        source: ClientError,
    },
    /// A connectivity-dependent operation was requested while not connected.
    #[error("transport not connected ({state:?})")]
    NotConnected {
        /// Connection state observed at the time of the request.
        state: ConnectionState,
    },
    /// The supervisor could not be attached or fed.
    #[error(transparent)]
    Channel(#[from] FeedError),
}

impl SyncError {
    /// The operation error carried by retry failures, if any.
    pub fn operation_error(&self) -> Option<&ClientError> {
        match self {
            Self::NonRetryable { source, .. } | Self::RetriesExhausted { source, .. } => {
                Some(source)
            }
            Self::BootTimeout { .. } | Self::NotConnected { .. } | Self::Channel(_) => None,
        }
    }

    /// Stable code for logging and UI mapping.
    pub fn code(&self) -> &str {
        match self {
            Self::BootTimeout { .. } => "boot_timeout",
            Self::NonRetryable { source, .. } | Self::RetriesExhausted { source, .. } => {
                &source.code
            }
            Self::NotConnected { .. } => "not_connected",
            Self::Channel(_) => "status_feed_error",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ConnectionStatus;

    #[test]
    fn classifies_http_status_categories() {
        assert_eq!(classify_http_status(401), ErrorCategory::Auth);
        assert_eq!(classify_http_status(403), ErrorCategory::Permission);
        assert_eq!(classify_http_status(408), ErrorCategory::Timeout);
        assert_eq!(classify_http_status(429), ErrorCategory::RateLimited);
        assert_eq!(classify_http_status(404), ErrorCategory::Config);
        assert_eq!(classify_http_status(503), ErrorCategory::Network);
        assert_eq!(classify_http_status(700), ErrorCategory::Internal);
    }

    #[test]
    fn persists_retry_after_in_millis() {
        let err = ClientError::new(ErrorCategory::RateLimited, "rate_limited", "wait")
            .with_retry_after(Duration::from_secs(3));
        assert_eq!(err.retry_after_ms, Some(3000));
    }

    #[test]
    fn exposes_operation_error_for_retry_failures_only() {
        let op = ClientError::new(ErrorCategory::Network, "fetch_failed", "reset");
        let exhausted = SyncError::RetriesExhausted {
            attempts: 3,
            source: op.clone(),
        };
        assert_eq!(exhausted.operation_error(), Some(&op));
        assert_eq!(exhausted.code(), "fetch_failed");

        let not_connected = SyncError::NotConnected {
            state: ConnectionState::new(ConnectionStatus::Disconnected, false),
        };
        assert_eq!(not_connected.operation_error(), None);
        assert_eq!(not_connected.code(), "not_connected");
    }
}
