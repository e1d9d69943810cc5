use std::{collections::HashSet, future::Future, time::Duration};

use tracing::{debug, warn};

use crate::error::{ClientError, SyncError};

/// How the delay between attempts evolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackoffGrowth {
    /// Every retry waits exactly the base delay.
    #[default]
    Constant,
    /// The base delay doubles per retry, capped at `max_delay_ms`.
    Exponential { max_delay_ms: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay_ms: u64,
    growth: BackoffGrowth,
    non_retryable_codes: HashSet<String>,
}

impl RetryPolicy {
    /// Constant-delay policy; `max_attempts` is clamped to at least 1.
    pub fn new(max_attempts: u32, base_delay_ms: u64) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms,
            growth: BackoffGrowth::Constant,
            non_retryable_codes: HashSet::new(),
        }
    }

    /// Replace the delay growth strategy.
    pub fn with_growth(mut self, growth: BackoffGrowth) -> Self {
        self.growth = growth;
        self
    }

    /// Add error codes that fail immediately instead of retrying.
    pub fn with_non_retryable_codes<I, S>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.non_retryable_codes
            .extend(codes.into_iter().map(Into::into));
        self
    }

    /// Total invocations allowed, including the first.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn base_delay_ms(&self) -> u64 {
        self.base_delay_ms
    }

    pub fn growth(&self) -> BackoffGrowth {
        self.growth
    }

    /// Whether `error` may be retried under this policy.
    pub fn is_retryable(&self, error: &ClientError) -> bool {
        !self.non_retryable_codes.contains(&error.code)
    }

    /// Delay to wait after the failed attempt with 0-based index `attempt`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay_ms = match self.growth {
            BackoffGrowth::Constant => self.base_delay_ms,
            BackoffGrowth::Exponential { max_delay_ms } => {
                let multiplier = 1_u64 << attempt.min(20);
                self.base_delay_ms
                    .saturating_mul(multiplier)
                    .min(max_delay_ms)
            }
        };
        Duration::from_millis(delay_ms)
    }

    /// Run `operation` until it succeeds, fails with a non-retryable code, or the
    /// attempt budget is spent.
    pub async fn execute<T, F, Fut>(&self, mut operation: F) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ClientError>>,
    {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if !self.is_retryable(&error) {
                debug!(attempt, code = %error.code, "operation failed with non-retryable code");
                return Err(SyncError::NonRetryable {
                    attempt,
                    source: error,
                });
            }

            if attempt >= self.max_attempts {
                warn!(attempts = attempt, code = %error.code, "operation retries exhausted");
                return Err(SyncError::RetriesExhausted {
                    attempts: attempt,
                    source: error,
                });
            }

            let delay = self.delay_for_attempt(attempt - 1);
            debug!(
                attempt,
                max_attempts = self.max_attempts,
                delay_ms = delay.as_millis() as u64,
                code = %error.code,
                "operation failed, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 1_000)
    }
}
