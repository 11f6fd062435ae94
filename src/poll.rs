//! # Polling Waits
//!
//! The hardware never notifies completion; controllers sample a status flag
//! at a fixed interval until it reports done. [`wait_until`] is that loop,
//! bounded by an optional timeout.
//!
//! Dropping the returned future cancels the wait between samples.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, Instant};
use tracing::{debug, warn};

use crate::error::{MotionError, MotionResult};

/// Default interval between status samples in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Default upper bound on a single wait in milliseconds.
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 120_000;

/// Interval and bound for polling waits.
///
/// # Example
///
/// ```rust
/// use std::time::Duration;
/// use voltage_motion::PollConfig;
///
/// let config = PollConfig::new()
///     .with_interval(Duration::from_millis(250))
///     .with_timeout(Duration::from_secs(10));
///
/// assert_eq!(config.interval, Duration::from_millis(250));
/// assert_eq!(config.timeout, Some(Duration::from_secs(10)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollConfig {
    /// Sleep between two samples.
    pub interval: Duration,
    /// Give up after this long. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl PollConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait without any bound, as the legacy controllers did.
    pub fn unbounded() -> Self {
        Self {
            timeout: None,
            ..Self::default()
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    /// Same interval, bound stretched by `extra` (e.g. a programmed count time).
    pub fn extended_by(self, extra: Duration) -> Self {
        Self {
            timeout: self.timeout.map(|t| t.saturating_add(extra)),
            ..self
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            timeout: Some(Duration::from_millis(DEFAULT_WAIT_TIMEOUT_MS)),
        }
    }
}

/// Sample `done` until it returns `true`.
///
/// The first sample is taken immediately. Between samples the task sleeps for
/// `config.interval`, cut short so that one last sample lands on the
/// deadline. Transport errors from `done` end the wait at once. When that
/// last sample still fails, the wait ends with [`MotionError::WaitTimeout`].
///
/// Returns the number of samples taken.
pub async fn wait_until<F, Fut>(
    operation: &'static str,
    config: &PollConfig,
    mut done: F,
) -> MotionResult<u32>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = MotionResult<bool>>,
{
    let started = Instant::now();
    let deadline = config.timeout.map(|t| started + t);
    let mut samples = 0u32;

    loop {
        samples += 1;
        if done().await? {
            debug!(
                operation,
                samples,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "wait complete"
            );
            return Ok(samples);
        }

        let pause = match deadline {
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    let waited = started.elapsed();
                    warn!(operation, samples, ?waited, "wait timed out");
                    return Err(MotionError::WaitTimeout { operation, waited });
                }
                config.interval.min(deadline - now)
            }
            None => config.interval,
        };
        sleep(pause).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_defaults() {
        let config = PollConfig::default();
        assert_eq!(config.interval, Duration::from_millis(100));
        assert_eq!(config.timeout, Some(Duration::from_secs(120)));
        assert_eq!(PollConfig::unbounded().timeout, None);
        assert_eq!(
            PollConfig::new().with_timeout(Duration::from_secs(1)).without_timeout(),
            PollConfig::unbounded()
        );
    }

    #[test]
    fn test_extended_by() {
        let config = PollConfig::new()
            .with_timeout(Duration::from_secs(1))
            .extended_by(Duration::from_millis(500));
        assert_eq!(config.timeout, Some(Duration::from_millis(1500)));
        assert_eq!(
            PollConfig::unbounded().extended_by(Duration::from_secs(1)).timeout,
            None
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_after_samples() {
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let config = PollConfig::new();
        let started = Instant::now();

        let samples = wait_until("test", &config, move || async move {
            Ok(calls.fetch_add(1, Ordering::SeqCst) + 1 >= 3)
        })
        .await
        .unwrap();

        assert_eq!(samples, 3);
        // two sleeps between three samples
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_millis(300));
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out() {
        let config = PollConfig::new()
            .with_interval(Duration::from_millis(100))
            .with_timeout(Duration::from_millis(450));

        let err = wait_until("never", &config, || async { Ok::<_, MotionError>(false) })
            .await
            .unwrap_err();

        match err {
            MotionError::WaitTimeout { operation, waited } => {
                assert_eq!(operation, "never");
                assert_eq!(waited, Duration::from_millis(450));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_sample_lands_on_deadline() {
        // interval longer than the bound: one sample now, one at the deadline
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let config = PollConfig::new()
            .with_interval(Duration::from_secs(10))
            .with_timeout(Duration::from_secs(1));

        let err = wait_until("slow", &config, move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, MotionError>(false)
        })
        .await
        .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        // and a flag that is up by then still counts
        let calls = AtomicU32::new(0);
        let calls = &calls;
        let samples = wait_until("slow", &config, move || async move {
            Ok::<_, MotionError>(calls.fetch_add(1, Ordering::SeqCst) == 1)
        })
        .await
        .unwrap();
        assert_eq!(samples, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_stop_the_wait() {
        let config = PollConfig::unbounded();
        let err = wait_until("broken", &config, || async {
            Err::<bool, _>(MotionError::transport("link down"))
        })
        .await
        .unwrap_err();
        assert!(err.is_transport());
    }
}
