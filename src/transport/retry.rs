//! Retry policy and exponential backoff.
//!
//! Transient transport failures (connection failures, timeouts) and
//! retryable responses (HTTP 503) are re-attempted up to a configured
//! ceiling, sleeping between attempts per an exponential backoff schedule.

use std::future::Future;
use std::time::Duration;
use tracing::info;

/// Source of the uniform random factor applied to backoff delays.
///
/// Injectable so tests can pin the schedule to exact values.
pub trait Jitter: Send + Sync {
    /// A value in `[0, 1)`.
    fn factor(&self) -> f64;
}

/// Default jitter source backed by the thread RNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomJitter;

impl Jitter for RandomJitter {
    fn factor(&self) -> f64 {
        rand::random::<f64>()
    }
}

/// Exponential backoff schedule: `base * exponent^attempt`, optionally
/// multiplied by a jitter factor in `[0, 1)`, clamped to `max_delay`.
pub struct ExponentialBackoff {
    base: Duration,
    exponent: f64,
    max_delay: Duration,
    jitter: Option<Box<dyn Jitter>>,
}

impl ExponentialBackoff {
    /// Schedule with the default parameters: base 100ms, exponent 2,
    /// jitter on, max delay 2 hours.
    pub fn new() -> Self {
        Self {
            base: Duration::from_millis(100),
            exponent: 2.0,
            max_delay: Duration::from_secs(2 * 3600),
            jitter: Some(Box::new(RandomJitter)),
        }
    }

    /// Set the base delay.
    pub fn with_base(mut self, base: Duration) -> Self {
        self.base = base;
        self
    }

    /// Set the exponent.
    pub fn with_exponent(mut self, exponent: f64) -> Self {
        self.exponent = exponent;
        self
    }

    /// Set the delay ceiling.
    pub fn with_max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = max_delay;
        self
    }

    /// Replace the jitter source.
    pub fn with_jitter(mut self, jitter: Box<dyn Jitter>) -> Self {
        self.jitter = Some(jitter);
        self
    }

    /// Disable jitter, making the schedule fully deterministic.
    pub fn without_jitter(mut self) -> Self {
        self.jitter = None;
        self
    }

    /// Delay before re-attempting after attempt number `attempt` (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        let mut delay = self.base.as_secs_f64() * self.exponent.powi(attempt as i32);
        if let Some(jitter) = &self.jitter {
            delay *= jitter.factor();
        }
        let max = self.max_delay.as_secs_f64();
        if !delay.is_finite() || delay > max {
            self.max_delay
        } else {
            Duration::from_secs_f64(delay)
        }
    }
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ExponentialBackoff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExponentialBackoff")
            .field("base", &self.base)
            .field("exponent", &self.exponent)
            .field("max_delay", &self.max_delay)
            .field("jitter", &self.jitter.is_some())
            .finish()
    }
}

/// Retries an async operation against a transient-error classifier and a
/// result-level retry predicate.
#[derive(Debug)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: ExponentialBackoff,
}

impl RetryPolicy {
    /// Create a policy with the given attempt ceiling and default backoff.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff: ExponentialBackoff::new(),
        }
    }

    /// Replace the backoff schedule.
    pub fn with_backoff(mut self, backoff: ExponentialBackoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// The configured attempt ceiling.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run `op` up to `max_attempts` times.
    ///
    /// An error for which `is_transient` returns true triggers a backoff
    /// sleep and another attempt; any other error is returned immediately.
    /// A success for which `should_retry` returns true (e.g. HTTP 503) is
    /// likewise retried; when attempts are exhausted on that path, the last
    /// obtained result is returned rather than an error.
    ///
    /// With `max_attempts == 1` the wrapper is a bypass: the operation runs
    /// once and neither the classifiers nor the backoff are consulted.
    pub async fn run<T, E, F, Fut, P, C>(
        &self,
        mut op: F,
        is_transient: P,
        should_retry: C,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        C: Fn(&T) -> bool,
    {
        if self.max_attempts <= 1 {
            return op().await;
        }

        let mut attempt = 1;
        let mut outcome = op().await;
        loop {
            let retry = match &outcome {
                Ok(result) => should_retry(result),
                Err(err) => {
                    if !is_transient(err) {
                        return outcome;
                    }
                    true
                }
            };
            if !retry {
                return outcome;
            }
            if attempt >= self.max_attempts {
                info!(attempts = attempt, "request failed after {} attempts", attempt);
                return outcome;
            }
            tokio::time::sleep(self.backoff.delay(attempt)).await;
            attempt += 1;
            outcome = op().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Jitter that returns a fixed factor and counts invocations.
    struct CountingJitter {
        factor: f64,
        calls: Arc<AtomicUsize>,
    }

    impl Jitter for CountingJitter {
        fn factor(&self) -> f64 {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.factor
        }
    }

    fn counting_backoff(calls: Arc<AtomicUsize>) -> ExponentialBackoff {
        // Base of zero keeps the tests fast while still exercising the
        // jitter path on every sleep.
        ExponentialBackoff::new()
            .with_base(Duration::ZERO)
            .with_jitter(Box::new(CountingJitter { factor: 0.5, calls }))
    }

    #[test]
    fn test_delay_without_jitter_is_exact() {
        let backoff = ExponentialBackoff::new()
            .with_base(Duration::from_millis(100))
            .with_exponent(2.0)
            .without_jitter();

        assert_eq!(backoff.delay(1), Duration::from_millis(200));
        assert_eq!(backoff.delay(2), Duration::from_millis(400));
        assert_eq!(backoff.delay(3), Duration::from_millis(800));
    }

    #[test]
    fn test_delay_clamped_to_max() {
        let backoff = ExponentialBackoff::new()
            .with_base(Duration::from_secs(1))
            .without_jitter()
            .with_max_delay(Duration::from_secs(5));

        for attempt in 1..64 {
            assert!(backoff.delay(attempt) <= Duration::from_secs(5));
        }
        assert_eq!(backoff.delay(60), Duration::from_secs(5));
    }

    #[test]
    fn test_delay_with_fixed_jitter_is_deterministic() {
        let calls = Arc::new(AtomicUsize::new(0));
        let backoff = ExponentialBackoff::new()
            .with_base(Duration::from_millis(100))
            .with_jitter(Box::new(CountingJitter {
                factor: 0.5,
                calls: calls.clone(),
            }));

        // 100ms * 2^2 * 0.5 = 200ms
        assert_eq!(backoff.delay(2), Duration::from_millis(200));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_transient_failures_then_success() {
        let jitter_calls = Arc::new(AtomicUsize::new(0));
        let policy = RetryPolicy::new(5).with_backoff(counting_backoff(jitter_calls.clone()));

        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_in_op = attempts.clone();
        let result: Result<&str, &str> = policy
            .run(
                move || {
                    let attempts = attempts_in_op.clone();
                    async move {
                        if attempts.fetch_add(1, Ordering::SeqCst) < 3 {
                            Err("connection refused")
                        } else {
                            Ok("done")
                        }
                    }
                },
                |_err| true,
                |_ok| false,
            )
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
        // Backoff consulted exactly once per failed attempt.
        assert_eq!(jitter_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let policy =
            RetryPolicy::new(3).with_backoff(counting_backoff(Arc::new(AtomicUsize::new(0))));

        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_in_op = attempts.clone();
        let result: Result<(), usize> = policy
            .run(
                move || {
                    let attempts = attempts_in_op.clone();
                    async move { Err(attempts.fetch_add(1, Ordering::SeqCst)) }
                },
                |_err| true,
                |_ok: &()| false,
            )
            .await;

        // The error from the final attempt, not the first.
        assert_eq!(result.unwrap_err(), 2);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_transient_error_returns_immediately() {
        let jitter_calls = Arc::new(AtomicUsize::new(0));
        let policy = RetryPolicy::new(5).with_backoff(counting_backoff(jitter_calls.clone()));

        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_in_op = attempts.clone();
        let result: Result<(), &str> = policy
            .run(
                move || {
                    let attempts = attempts_in_op.clone();
                    async move {
                        attempts.fetch_add(1, Ordering::SeqCst);
                        Err("bad request")
                    }
                },
                |_err| false,
                |_ok: &()| false,
            )
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(jitter_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_predicate_exhaustion_returns_last_result() {
        let policy =
            RetryPolicy::new(3).with_backoff(counting_backoff(Arc::new(AtomicUsize::new(0))));

        let attempts = Arc::new(AtomicUsize::new(0));
        let attempts_in_op = attempts.clone();
        // Always "succeeds" with a retryable result, like an endless 503.
        let result: Result<u16, &str> = policy
            .run(
                move || {
                    let attempts = attempts_in_op.clone();
                    async move {
                        attempts.fetch_add(1, Ordering::SeqCst);
                        Ok(503)
                    }
                },
                |_err| true,
                |status| *status == 503,
            )
            .await;

        assert_eq!(result.unwrap(), 503);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_single_attempt_bypasses_backoff() {
        let jitter_calls = Arc::new(AtomicUsize::new(0));
        let policy = RetryPolicy::new(1).with_backoff(counting_backoff(jitter_calls.clone()));

        let result: Result<u16, &str> = policy
            .run(|| async { Ok(503) }, |_err| true, |status| *status == 503)
            .await;
        assert_eq!(result.unwrap(), 503);
        assert_eq!(jitter_calls.load(Ordering::SeqCst), 0);

        let result: Result<(), &str> = policy
            .run(|| async { Err("transient") }, |_err| true, |_ok: &()| false)
            .await;
        assert!(result.is_err());
        assert_eq!(jitter_calls.load(Ordering::SeqCst), 0);
    }
}
