//! Bounded retry with linear backoff
//!
//! After attempt `n` fails the caller sleeps `delay × n` before trying again.
//! Every failure is reported to the event sink; when the budget is exhausted a
//! critical event is emitted and the last error is returned unchanged.

use std::time::Duration;

use serde_json::json;

use crate::events::{EventLevel, EventSink};

/// How many times to try, and how long to wait between tries
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first (0 behaves like 1)
    pub max_attempts: u32,
    /// Base delay, multiplied by the attempt number
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }

    /// Single attempt, no waiting
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Linear backoff: wait after the given (1-based) failed attempt
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.delay.saturating_mul(attempt)
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Run `op` under `policy`, reporting failures for `stage`/`action`
///
/// `op` receives the 1-based attempt number. Emits
/// `<action>_attempt_<n>_failed` (error) per failure and
/// `<action>_failed_all_retries` (critical) when giving up.
pub fn with_retry<T, E, F>(
    policy: &RetryPolicy,
    sink: &dyn EventSink,
    stage: &str,
    action: &str,
    mut op: F,
) -> std::result::Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut(u32) -> std::result::Result<T, E>,
{
    let attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        match op(attempt) {
            Ok(value) => return Ok(value),
            Err(e) => {
                sink.emit(
                    stage,
                    &format!("{}_attempt_{}_failed", action, attempt),
                    EventLevel::Error,
                    json!({ "error": e.to_string() }),
                );

                if attempt >= attempts {
                    sink.emit(
                        stage,
                        &format!("{}_failed_all_retries", action),
                        EventLevel::Critical,
                        json!({ "attempts": attempts, "error": e.to_string() }),
                    );
                    return Err(e);
                }

                let wait = policy.backoff(attempt);
                if !wait.is_zero() {
                    std::thread::sleep(wait);
                }
                attempt += 1;
            }
        }
    }
}
