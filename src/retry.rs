use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Default backoff schedule shared by the HTTP chain, the SQL store and
/// snapshot file access.
pub const DEFAULT_SCHEDULE: [Duration; 3] = [
    Duration::from_secs(1),
    Duration::from_secs(3),
    Duration::from_secs(5),
];

/// Outcome of a retried operation that did not succeed
#[derive(Debug, Error)]
pub enum RetryError<E> {
    /// The operation failed with an error the predicate deemed permanent
    #[error("{0}")]
    Permanent(E),
    /// Every attempt failed with a retryable error
    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: usize, last: E },
    /// Cancellation arrived while waiting for the next attempt
    #[error("retry cancelled after {attempts} attempts: {last}")]
    Cancelled { attempts: usize, last: E },
}

/// Capped, ordered backoff schedule.
///
/// The number of attempts is `schedule.len() + 1`: one initial attempt and one
/// retry per schedule entry.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    schedule: Vec<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_SCHEDULE.to_vec())
    }
}

impl RetryPolicy {
    pub fn new(schedule: Vec<Duration>) -> Self {
        Self { schedule }
    }

    /// Policy with no retries at all
    pub fn none() -> Self {
        Self::new(Vec::new())
    }

    pub fn max_attempts(&self) -> usize {
        self.schedule.len() + 1
    }

    pub fn schedule(&self) -> &[Duration] {
        &self.schedule
    }

    /// Run `op` until it succeeds, fails permanently, the schedule runs out
    /// or `cancel` fires during a backoff sleep.
    pub async fn run<T, E, F, Fut, P>(
        &self,
        cancel: &CancellationToken,
        is_retryable: P,
        mut op: F,
    ) -> Result<T, RetryError<E>>
    where
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempt = 0;

        loop {
            let error = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };
            attempt += 1;

            if !is_retryable(&error) {
                return Err(RetryError::Permanent(error));
            }

            let Some(delay) = self.schedule.get(attempt - 1).copied() else {
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: error,
                });
            };

            tracing::warn!(
                attempt,
                max_attempts = self.max_attempts(),
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retryable failure, backing off"
            );

            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(RetryError::Cancelled { attempts: attempt, last: error });
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
