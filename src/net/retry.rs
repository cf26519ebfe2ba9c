use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// Bounded exponential backoff.
///
/// The delay before retry `n` (1-based) is `min * 2^(n-1)`, capped at `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Retrier {
    pub attempts: u32,
    pub min: Duration,
    pub max: Duration,
}

/// All attempts failed; carries the error from the last one.
#[derive(Debug, thiserror::Error)]
#[error("gave up after {attempts} attempts")]
pub struct Exhausted<E: std::error::Error + 'static> {
    pub attempts: u32,
    #[source]
    pub source: E,
}

impl Default for Retrier {
    fn default() -> Self {
        Self::new(5, Duration::from_millis(100), Duration::from_secs(5))
    }
}

impl Retrier {
    pub fn new(attempts: u32, min: Duration, max: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            min,
            max: max.max(min),
        }
    }

    /// Delay to wait after `failed` consecutive failures.
    pub fn backoff(&self, failed: u32) -> Duration {
        let exp = failed.saturating_sub(1).min(31);
        self.min
            .checked_mul(1u32 << exp)
            .map_or(self.max, |d| d.min(self.max))
    }

    /// Run `op` until it succeeds or the attempt budget is spent.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, Exhausted<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Display + 'static,
    {
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) if attempt >= self.attempts => {
                    return Err(Exhausted {
                        attempts: attempt,
                        source: err,
                    });
                }
                Err(err) => {
                    let delay = self.backoff(attempt);
                    warn!(attempt, ?delay, error = %err, "attempt failed, retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use tokio::time::Instant;

    #[test]
    fn backoff_doubles_and_caps() {
        let r = Retrier::default();
        assert_eq!(r.backoff(1), Duration::from_millis(100));
        assert_eq!(r.backoff(2), Duration::from_millis(200));
        assert_eq!(r.backoff(4), Duration::from_millis(800));
        assert_eq!(r.backoff(7), Duration::from_millis(5000));
        assert_eq!(r.backoff(40), Duration::from_millis(5000));
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_on_fifth_attempt_within_max_delay() {
        let r = Retrier::default();
        let mut gaps = Vec::new();
        let mut last = Instant::now();

        let result = r
            .run(|attempt| {
                let now = Instant::now();
                if attempt > 1 {
                    gaps.push(now - last);
                }
                last = now;
                async move {
                    if attempt < 5 {
                        Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 5);
        assert_eq!(gaps.len(), 4);
        assert!(gaps.iter().all(|g| *g <= r.max));
        assert!(gaps.iter().all(|g| *g >= r.min));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_reports_attempts_and_last_error() {
        let r = Retrier::new(3, Duration::from_millis(10), Duration::from_millis(20));
        let mut calls = 0;

        let result: Result<(), _> = r
            .run(|attempt| {
                calls += 1;
                async move { Err(io::Error::new(io::ErrorKind::Other, format!("boom {attempt}"))) }
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(calls, 3);
        assert_eq!(err.attempts, 3);
        assert_eq!(err.source.to_string(), "boom 3");
    }
}
