//! Inline retry for a single fallible stage call.
//!
//! Two schedules: a fixed delay and a Fibonacci-growing delay with a cap.

use crate::config::RetrySettings;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrySchedule {
    Fixed(Duration),
    /// `base·1, base·1, base·2, base·3, base·5, …` capped at `max`.
    Fibonacci { base: Duration, max: Duration },
}

impl RetrySchedule {
    /// Delay after the failure of attempt `attempt_index` (0-based).
    pub fn delay(&self, attempt_index: u32) -> Duration {
        match *self {
            RetrySchedule::Fixed(d) => d,
            RetrySchedule::Fibonacci { base, max } => {
                let (mut a, mut b) = (1u32, 1u32);
                for _ in 0..attempt_index {
                    let next = a.saturating_add(b);
                    a = b;
                    b = next;
                }
                base.saturating_mul(a).min(max)
            }
        }
    }
}

/// Retry policy: attempt limit plus schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub schedule: RetrySchedule,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            schedule: RetrySchedule::Fixed(delay),
        }
    }

    pub fn fibonacci(max_attempts: u32, base: Duration, max: Duration) -> Self {
        Self {
            max_attempts,
            schedule: RetrySchedule::Fibonacci { base, max },
        }
    }

    /// Retrieval policy from configuration.
    pub fn retrieval(config: &RetrySettings) -> Self {
        Self::fibonacci(
            config.retrieval_attempts,
            Duration::from_millis(config.fibonacci_base_ms),
            Duration::from_millis(config.fibonacci_max_ms),
        )
    }

    /// Enrichment lookups policy from configuration.
    pub fn enrichment(config: &RetrySettings) -> Self {
        Self::fixed(
            config.enrichment_attempts,
            Duration::from_millis(config.fixed_delay_ms),
        )
    }

    /// Run `operation` until it succeeds or the attempt limit is reached.
    ///
    /// Returns the last error after the final failure. A limit of 0 still
    /// makes one attempt.
    pub async fn retry<T, E, F, Fut>(&self, label: &str, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt + 1 >= attempts => return Err(e),
                Err(e) => {
                    let delay = self.schedule.delay(attempt);
                    warn!(
                        "{} failed (attempt {}/{}), retrying in {:?}: {}",
                        label,
                        attempt + 1,
                        attempts,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(5, Duration::from_secs(1))
    }
}
