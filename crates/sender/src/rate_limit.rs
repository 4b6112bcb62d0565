use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use courier_core::SendError;
use parking_lot::Mutex;
use tracing::debug;

/// Admission control in front of a provider.
///
/// [`acquire`](Self::acquire) blocks until a slot is free; callers enforce
/// deadlines by wrapping the future (the decorator applies the per-call
/// timeout around the whole pipeline). [`try_acquire`](Self::try_acquire)
/// is the non-blocking probe. A closed limiter admits everything:
/// admission control fails open.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Wait for an admission slot.
    async fn acquire(&self) -> Result<(), SendError>;

    /// Take a slot if one is free right now.
    fn try_acquire(&self) -> bool;

    /// Release any resources. Subsequent calls are admitted immediately.
    fn close(&self);
}

// ---------------------------------------------------------------------------
// Token bucket
// ---------------------------------------------------------------------------

struct BucketState {
    tokens: f64,
    last_refill: Instant,
}

/// Token-bucket limiter: steady-state rate `qps`, instantaneous burst
/// `burst`.
pub struct TokenBucket {
    qps: f64,
    burst: f64,
    state: Mutex<BucketState>,
    closed: AtomicBool,
}

impl TokenBucket {
    /// Create a bucket admitting `qps` requests per second with the given
    /// burst capacity. The bucket starts full.
    ///
    /// # Panics
    /// Panics when `qps` is not positive or `burst` is zero.
    pub fn new(qps: f64, burst: usize) -> Self {
        assert!(qps > 0.0, "qps must be positive");
        assert!(burst > 0, "burst must be at least 1");
        #[allow(clippy::cast_precision_loss)]
        let burst = burst as f64;
        Self {
            qps,
            burst,
            state: Mutex::new(BucketState {
                tokens: burst,
                last_refill: Instant::now(),
            }),
            closed: AtomicBool::new(false),
        }
    }

    /// Refill, then take a token if available; otherwise report how long
    /// until the next token lands.
    fn take_or_wait(&self) -> Result<(), Duration> {
        let mut state = self.state.lock();
        let now = Instant::now();
        let elapsed = now.duration_since(state.last_refill).as_secs_f64();
        state.tokens = (state.tokens + elapsed * self.qps).min(self.burst);
        state.last_refill = now;

        if state.tokens >= 1.0 {
            state.tokens -= 1.0;
            return Ok(());
        }
        let deficit = 1.0 - state.tokens;
        Err(Duration::from_secs_f64(deficit / self.qps))
    }
}

#[async_trait]
impl RateLimiter for TokenBucket {
    async fn acquire(&self) -> Result<(), SendError> {
        loop {
            if self.closed.load(Ordering::Acquire) {
                return Ok(());
            }
            match self.take_or_wait() {
                Ok(()) => return Ok(()),
                Err(wait) => {
                    debug!(?wait, "token bucket exhausted, waiting");
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    fn try_acquire(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.take_or_wait().is_ok()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl std::fmt::Debug for TokenBucket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenBucket")
            .field("qps", &self.qps)
            .field("burst", &self.burst)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Sliding window
// ---------------------------------------------------------------------------

/// Sliding-window limiter: at any instant, at most `max_requests`
/// admissions in the trailing `window`.
pub struct SlidingWindow {
    window: Duration,
    max_requests: usize,
    admissions: Mutex<VecDeque<Instant>>,
    closed: AtomicBool,
}

impl SlidingWindow {
    /// Create a window limiter.
    ///
    /// # Panics
    /// Panics when `max_requests` is zero or the window is empty.
    pub fn new(window: Duration, max_requests: usize) -> Self {
        assert!(max_requests > 0, "max_requests must be at least 1");
        assert!(!window.is_zero(), "window must be non-zero");
        Self {
            window,
            max_requests,
            admissions: Mutex::new(VecDeque::new()),
            closed: AtomicBool::new(false),
        }
    }

    /// Prune expired admissions, then admit or report the wait until the
    /// oldest admission leaves the window.
    fn admit_or_wait(&self) -> Result<(), Duration> {
        let mut admissions = self.admissions.lock();
        let now = Instant::now();
        while let Some(front) = admissions.front() {
            if now.duration_since(*front) >= self.window {
                admissions.pop_front();
            } else {
                break;
            }
        }

        if admissions.len() < self.max_requests {
            admissions.push_back(now);
            return Ok(());
        }

        let oldest = *admissions.front().expect("window is non-empty when full");
        Err(self.window - now.duration_since(oldest))
    }
}

#[async_trait]
impl RateLimiter for SlidingWindow {
    async fn acquire(&self) -> Result<(), SendError> {
        loop {
            if self.closed.load(Ordering::Acquire) {
                return Ok(());
            }
            match self.admit_or_wait() {
                Ok(()) => return Ok(()),
                Err(wait) => tokio::time::sleep(wait).await,
            }
        }
    }

    fn try_acquire(&self) -> bool {
        self.closed.load(Ordering::Acquire) || self.admit_or_wait().is_ok()
    }

    fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}

impl std::fmt::Debug for SlidingWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SlidingWindow")
            .field("window", &self.window)
            .field("max_requests", &self.max_requests)
            .finish_non_exhaustive()
    }
}
