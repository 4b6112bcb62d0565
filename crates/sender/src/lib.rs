//! The Courier sender: registry, facade, and middleware pipeline.
//!
//! A [`Sender`] routes messages to registered providers through a
//! [`ProviderDecorator`] that applies the cross-cutting policies in a fixed
//! order: metrics, hooks, optional queueing for async sends, rate limiting,
//! circuit breaking, retries, and finally the provider itself.
//!
//! Middleware configured on the sender is **snapshotted** into each
//! decorator at registration time: setters called afterwards only affect
//! providers registered later. Pass a [`SenderMiddleware`] override to
//! [`Sender::register_provider`] to give one provider its own stack.

pub mod circuit_breaker;
pub mod decorator;
pub mod health;
pub mod metrics;
pub mod middleware;
pub mod options;
pub mod queue;
pub mod rate_limit;
pub mod retry;
pub mod sender;

pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use decorator::ProviderDecorator;
pub use health::{HealthReport, HealthStatus, ProviderHealth};
pub use metrics::{InMemoryMetrics, MetricsCollector, ProviderMetricsSnapshot};
pub use middleware::SenderMiddleware;
pub use options::{AfterHook, BeforeHook, SendCallback, SendOptions};
pub use queue::{MemoryQueue, Queue, QueueItem};
pub use rate_limit::{RateLimiter, SlidingWindow, TokenBucket};
pub use retry::RetryPolicy;
pub use sender::{Sender, SenderBuilder};
