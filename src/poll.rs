//! Bounded retry for eventually-consistent network state
//!
//! The condition is evaluated immediately, then once per interval, strictly
//! sequentially: the next evaluation never starts while a previous one (which
//! may perform network I/O) is in flight. The last sleep is clamped to the
//! remaining window and followed by a final evaluation at the deadline, so a
//! failure is never reported before `timeout` has elapsed and a condition
//! that holds by the deadline is always observed.

use std::future::Future;
use std::time::{Duration, Instant};

use crate::common::{Error, Result};

/// Polling policy: total window, delay between checks and a diagnostic label
#[derive(Debug, Clone)]
pub struct Eventually {
    timeout: Duration,
    interval: Duration,
    context: String,
}

impl Eventually {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout,
            interval,
            context: String::new(),
        }
    }

    /// Attach diagnostic context reported on timeout (e.g. captured stdout)
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until `check` returns true
    pub async fn until<F, Fut>(&self, mut check: F) -> Result<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        self.run(|| {
            let fut = check();
            async move {
                if fut.await {
                    Ok(())
                } else {
                    Err(None)
                }
            }
        })
        .await
    }

    /// Wait until `check` returns `Ok`, remembering the last `Err` as the
    /// observation reported on timeout
    pub async fn until_ok<T, F, Fut>(&self, mut check: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, String>>,
    {
        self.run(|| {
            let fut = check();
            async move { fut.await.map_err(Some) }
        })
        .await
    }

    async fn run<T, F, Fut>(&self, mut check: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, Option<String>>>,
    {
        let start = Instant::now();
        let mut attempts: u32 = 0;
        let mut last: Option<String> = None;

        loop {
            attempts += 1;
            match check().await {
                Ok(value) => {
                    tracing::debug!(
                        attempts,
                        elapsed_ms = start.elapsed().as_millis() as u64,
                        context = %self.context,
                        "Condition met"
                    );
                    return Ok(value);
                }
                Err(observation) => {
                    if observation.is_some() {
                        last = observation;
                    }
                }
            }

            let elapsed = start.elapsed();
            if elapsed >= self.timeout {
                tracing::debug!(
                    attempts,
                    context = %self.context,
                    "Condition not met before deadline"
                );
                return Err(Error::PollTimeout {
                    context: self.context.clone(),
                    elapsed,
                    attempts,
                    last,
                });
            }

            tracing::trace!(attempts, context = %self.context, "Condition not met, retrying");
            tokio::time::sleep(self.interval.min(self.timeout - elapsed)).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    const MS: Duration = Duration::from_millis(1);

    #[tokio::test]
    async fn test_immediate_success() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        Eventually::new(Duration::from_secs(5), Duration::from_secs(1))
            .until(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { true }
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_zero_timeout_still_evaluates_once() {
        let calls = AtomicU32::new(0);
        let ok = Eventually::new(Duration::ZERO, 50 * MS)
            .until(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { true }
            })
            .await;
        assert!(ok.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let err = Eventually::new(Duration::ZERO, 50 * MS)
            .until(|| async { false })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::PollTimeout { attempts: 1, .. }));
    }

    #[tokio::test]
    async fn test_success_on_kth_evaluation_respects_interval() {
        let calls = Arc::new(AtomicU32::new(0));
        let interval = 30 * MS;
        let timeout = Duration::from_secs(5);
        let start = Instant::now();
        let counter = calls.clone();
        let attempts = Eventually::new(timeout, interval)
            .until_ok(move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n >= 4 {
                        Ok(n)
                    } else {
                        Err(format!("attempt {n}"))
                    }
                }
            })
            .await
            .unwrap();
        let elapsed = start.elapsed();
        assert_eq!(attempts, 4);
        assert!(elapsed >= interval * 3);
        assert!(elapsed < timeout);
    }

    #[tokio::test]
    async fn test_timeout_is_never_early_and_keeps_last_observation() {
        let timeout = 250 * MS;
        let start = Instant::now();
        let err = Eventually::new(timeout, 100 * MS)
            .context("tx ABC")
            .until_ok(|| async { Err::<(), _>("not found".to_string()) })
            .await
            .unwrap_err();
        assert!(start.elapsed() >= timeout);
        match err {
            Error::PollTimeout {
                context,
                attempts,
                last,
                elapsed,
            } => {
                assert_eq!(context, "tx ABC");
                assert_eq!(last.as_deref(), Some("not found"));
                assert!(elapsed >= timeout);
                // evaluations at 0, 100, 200 and 250ms
                assert_eq!(attempts, 4);
            }
            other => panic!("Expected PollTimeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_final_evaluation_at_deadline() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();
        Eventually::new(250 * MS, 200 * MS)
            .until(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                let ready = start.elapsed() >= 220 * MS;
                async move { ready }
            })
            .await
            .unwrap();
        // evaluations at 0, 200 and 250ms; the condition holds from 220ms
        assert!(calls.load(Ordering::SeqCst) <= 3);
        assert!(start.elapsed() >= 250 * MS);
    }

    #[tokio::test]
    async fn test_evaluations_are_sequential() {
        let in_flight = Arc::new(AtomicU32::new(0));
        let overlap = Arc::new(AtomicU32::new(0));
        let calls = Arc::new(AtomicU32::new(0));
        let (f, o, c) = (in_flight.clone(), overlap.clone(), calls.clone());
        Eventually::new(Duration::from_secs(5), MS)
            .until(move || {
                let (f, o, c) = (f.clone(), o.clone(), c.clone());
                async move {
                    if f.fetch_add(1, Ordering::SeqCst) > 0 {
                        o.fetch_add(1, Ordering::SeqCst);
                    }
                    tokio::time::sleep(10 * MS).await;
                    f.fetch_sub(1, Ordering::SeqCst);
                    c.fetch_add(1, Ordering::SeqCst) + 1 >= 5
                }
            })
            .await
            .unwrap();
        assert_eq!(overlap.load(Ordering::SeqCst), 0);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }
}
