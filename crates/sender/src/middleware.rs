use std::sync::Arc;

use crate::circuit_breaker::CircuitBreaker;
use crate::metrics::{InMemoryMetrics, MetricsCollector};
use crate::options::{AfterHook, BeforeHook};
use crate::queue::Queue;
use crate::rate_limit::RateLimiter;
use crate::retry::RetryPolicy;

/// The cross-cutting policy bundle a decorator runs a provider under.
///
/// The sender keeps one of these as its current template; registering a
/// provider **copies** it into the new decorator. Mutating the sender's
/// bundle afterwards does not reach into existing decorators; pass an
/// explicit override at registration to give one provider its own stack.
#[derive(Clone)]
pub struct SenderMiddleware {
    /// Admission control; `None` disables rate limiting.
    pub rate_limiter: Option<Arc<dyn RateLimiter>>,

    /// Retry policy; `None` means a single attempt.
    pub retry: Option<RetryPolicy>,

    /// Failure isolation; `None` disables circuit breaking.
    pub circuit_breaker: Option<Arc<CircuitBreaker>>,

    /// Buffer for async sends; without one, async sends run on detached
    /// tasks.
    pub queue: Option<Arc<dyn Queue>>,

    /// Dispatch counters.
    pub metrics: Arc<dyn MetricsCollector>,

    /// Hooks run before every send through this bundle, in registration
    /// order.
    pub before_hooks: Vec<BeforeHook>,

    /// Hooks run after every send through this bundle, in reverse
    /// registration order.
    pub after_hooks: Vec<AfterHook>,
}

impl Default for SenderMiddleware {
    fn default() -> Self {
        Self {
            rate_limiter: None,
            retry: None,
            circuit_breaker: None,
            queue: None,
            metrics: Arc::new(InMemoryMetrics::new()),
            before_hooks: Vec::new(),
            after_hooks: Vec::new(),
        }
    }
}

impl SenderMiddleware {
    /// An empty bundle with in-memory metrics.
    pub fn new() -> Self {
        Self::default()
    }
}

impl std::fmt::Debug for SenderMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SenderMiddleware")
            .field("rate_limiter", &self.rate_limiter.is_some())
            .field("retry", &self.retry)
            .field("circuit_breaker", &self.circuit_breaker)
            .field("queue", &self.queue.is_some())
            .field("before_hooks", &self.before_hooks.len())
            .field("after_hooks", &self.after_hooks.len())
            .finish_non_exhaustive()
    }
}
