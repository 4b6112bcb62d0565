use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use courier_core::SendError;
use rand::Rng;
use tracing::debug;

/// Decides whether an error is worth another attempt. Receives the
/// 1-based number of the attempt that just failed.
pub type RetryFilter = Arc<dyn Fn(u32, &SendError) -> bool + Send + Sync>;

/// Bounded retries with exponential backoff and optional jitter.
///
/// A policy with `max_attempts = 0` performs the single initial call and
/// never retries. The delay before retry _k_ (1-based) is
/// `min(max_delay, initial_delay * backoff_factor^(k-1))`, scaled by a
/// uniform jitter factor in `[1-jitter, 1+jitter]`.
///
/// The default filter retries exactly the transient error kinds
/// ([`SendError::is_retryable`]); [`SendError::CircuitOpen`] is never
/// retried regardless of the filter.
#[derive(Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    initial_delay: Duration,
    max_delay: Duration,
    backoff_factor: f64,
    jitter: f64,
    filter: RetryFilter,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_factor: 2.0,
            jitter: 0.0,
            filter: Arc::new(|_attempt, err| err.is_retryable()),
        }
    }
}

impl RetryPolicy {
    /// A policy that retries up to `max_attempts` times after the initial
    /// call.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(0)
    }

    /// Set the delay before the first retry.
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Cap the delay between retries.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the exponential growth factor (values below 1 are clamped to 1).
    #[must_use]
    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor.max(1.0);
        self
    }

    /// Set the fractional jitter (clamped to `[0, 1)`).
    #[must_use]
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 0.999);
        self
    }

    /// Replace the retry filter.
    #[must_use]
    pub fn with_filter(mut self, filter: RetryFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Maximum number of retries after the initial call.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// The backoff delay before retry `attempt` (1-based), before jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let factor = self.backoff_factor.powi(i32::try_from(exponent).unwrap_or(i32::MAX));
        let raw = self.initial_delay.as_secs_f64() * factor;
        let capped = raw.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        if self.jitter <= 0.0 || delay.is_zero() {
            return delay;
        }
        let factor = rand::rng().random_range((1.0 - self.jitter)..=(1.0 + self.jitter));
        Duration::from_secs_f64(delay.as_secs_f64() * factor)
    }

    /// Run `op` under this policy. Total call count is at most
    /// `1 + max_attempts`.
    pub async fn execute<T, F, Fut>(&self, mut op: F) -> Result<T, SendError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, SendError>> + Send,
        T: Send,
    {
        let mut attempt: u32 = 0;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    attempt += 1;
                    if matches!(err, SendError::CircuitOpen)
                        || attempt > self.max_attempts
                        || !(self.filter)(attempt, &err)
                    {
                        return Err(err);
                    }
                    let delay = self.jittered(self.delay_for(attempt));
                    debug!(attempt, ?delay, error = %err, "retrying after failure");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

impl std::fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_factor", &self.backoff_factor)
            .field("jitter", &self.jitter)
            .field("filter", &"<filter>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn transient() -> SendError {
        SendError::Transport("connection reset".into())
    }

    #[tokio::test]
    async fn succeeds_first_try_without_retrying() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3).with_initial_delay(Duration::from_millis(1));
        let result: Result<u32, _> = policy
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(7) }
            })
            .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3).with_initial_delay(Duration::from_millis(1));
        let result = policy
            .execute(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(transient())
                    } else {
                        Ok("sent")
                    }
                }
            })
            .await;
        assert_eq!(result.unwrap(), "sent");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn call_count_is_bounded_by_max_attempts_plus_one() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(2).with_initial_delay(Duration::from_millis(1));
        let result: Result<(), _> = policy
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(transient()) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn zero_max_attempts_means_single_call() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::none();
        let result: Result<(), _> = policy
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(transient()) }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn permanent_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5).with_initial_delay(Duration::from_millis(1));
        let result: Result<(), _> = policy
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(SendError::InvalidParam("bad".into())) }
            })
            .await;
        assert!(matches!(result, Err(SendError::InvalidParam(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn circuit_open_stops_immediately_even_with_permissive_filter() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5)
            .with_initial_delay(Duration::from_millis(1))
            .with_filter(Arc::new(|_, _| true));
        let result: Result<(), _> = policy
            .execute(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(SendError::CircuitOpen) }
            })
            .await;
        assert!(matches!(result, Err(SendError::CircuitOpen)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn flat_backoff_accumulates_elapsed_time() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3)
            .with_initial_delay(Duration::from_millis(10))
            .with_backoff_factor(1.0);
        let start = std::time::Instant::now();
        let result = policy
            .execute(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(transient())
                    } else {
                        Ok(())
                    }
                }
            })
            .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // Two backoffs of 10ms each.
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn delay_grows_exponentially_and_caps() {
        let policy = RetryPolicy::new(10)
            .with_initial_delay(Duration::from_millis(100))
            .with_backoff_factor(2.0)
            .with_max_delay(Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
        assert_eq!(policy.delay_for(10), Duration::from_millis(500));
    }

    #[test]
    fn backoff_factor_below_one_is_clamped() {
        let policy = RetryPolicy::new(3)
            .with_initial_delay(Duration::from_millis(100))
            .with_backoff_factor(0.5);
        assert_eq!(policy.delay_for(3), Duration::from_millis(100));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = RetryPolicy::new(1)
            .with_initial_delay(Duration::from_millis(100))
            .with_jitter(0.5);
        for _ in 0..100 {
            let delay = policy.jittered(policy.delay_for(1));
            assert!(delay >= Duration::from_millis(50));
            assert!(delay <= Duration::from_millis(150));
        }
    }
}
