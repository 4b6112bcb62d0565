use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use courier_core::{Message, SendError, SendResult};
use courier_provider::{Provider, ProviderSendOptions};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::middleware::SenderMiddleware;
use crate::options::SendOptions;
use crate::queue::QueueItem;
use crate::retry::RetryPolicy;

/// A provider wrapped in the full middleware chain.
///
/// Created at registration with a **copy** of the sender's middleware;
/// immutable thereafter. Execution order per send: resolve effective
/// options, before-hooks, then either the synchronous pipeline or the
/// async branch (queue + worker, or a detached task), where the pipeline
/// is rate-limit admission, circuit-breaker permit, retry loop around the
/// provider call, metrics, after-hooks, and the callback for async sends.
pub struct ProviderDecorator {
    inner: Arc<DecoratorInner>,
    worker: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

struct DecoratorInner {
    provider: Arc<dyn Provider>,
    middleware: SenderMiddleware,
    closed: AtomicBool,
}

impl ProviderDecorator {
    /// Wrap a provider with a middleware snapshot. When the snapshot
    /// carries a queue, a background worker is spawned to drain it, so
    /// construction must happen inside a Tokio runtime.
    pub fn new(provider: Arc<dyn Provider>, middleware: SenderMiddleware) -> Self {
        let inner = Arc::new(DecoratorInner {
            provider,
            middleware,
            closed: AtomicBool::new(false),
        });

        let worker = inner.middleware.queue.clone().map(|queue| {
            let inner = Arc::clone(&inner);
            tokio::spawn(async move {
                while let Some(item) = queue.dequeue().await {
                    // A shared queue may hold items for other providers;
                    // hand those back and let their worker claim them.
                    if item.message.provider_type() != inner.provider.provider_type() {
                        if queue.enqueue(item).await.is_err() {
                            break;
                        }
                        tokio::time::sleep(Duration::from_millis(5)).await;
                        continue;
                    }
                    let outcome = inner
                        .execute_pipeline(item.message.as_ref(), &item.options, true)
                        .await;
                    let _ = inner.finalize(item.message.as_ref(), outcome, &item.options, true);
                }
                debug!(provider = %inner.provider.name(), "queue worker stopped");
            })
        });

        Self {
            inner,
            worker: parking_lot::Mutex::new(worker),
        }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &Arc<dyn Provider> {
        &self.inner.provider
    }

    /// The middleware snapshot this decorator runs under.
    pub fn middleware(&self) -> &SenderMiddleware {
        &self.inner.middleware
    }

    /// Dispatch one message.
    ///
    /// Synchronous sends return `Ok(Some(result))`; async sends return
    /// `Ok(None)` as soon as the item is accepted, and the terminal
    /// outcome is delivered through the callback and after-hooks.
    pub async fn send(
        &self,
        msg: Arc<dyn Message>,
        options: SendOptions,
    ) -> Result<Option<SendResult>, SendError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(SendError::SenderClosed);
        }

        // Validation and before-hooks run before the async branch so a
        // bad message is rejected synchronously.
        msg.validate()?;
        for hook in &self.inner.middleware.before_hooks {
            hook(msg.as_ref())?;
        }
        for hook in &options.before_hooks {
            hook(msg.as_ref())?;
        }

        if options.async_send {
            self.inner
                .middleware
                .metrics
                .record_enqueue(self.inner.provider.name());

            let delay = options.delay;
            let item = QueueItem::new(Arc::clone(&msg), options, delay);

            if let Some(queue) = &self.inner.middleware.queue {
                queue.enqueue(item).await?;
            } else {
                let inner = Arc::clone(&self.inner);
                tokio::spawn(async move {
                    if let Some(delay) = delay {
                        tokio::time::sleep(delay).await;
                    }
                    let outcome = inner
                        .execute_pipeline(item.message.as_ref(), &item.options, true)
                        .await;
                    let _ = inner.finalize(item.message.as_ref(), outcome, &item.options, true);
                });
            }
            return Ok(None);
        }

        let outcome = self
            .inner
            .execute_pipeline(msg.as_ref(), &options, false)
            .await;
        self.inner
            .finalize(msg.as_ref(), outcome, &options, false)
            .map(Some)
    }

    /// Stop accepting sends. The queue worker (if any) keeps draining
    /// until the queue itself is closed.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::Release);
    }

    /// Whether this decorator has been closed.
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Wait for the queue worker to finish draining (used by
    /// `Sender::close`).
    pub async fn join_worker(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            let _ = worker.await;
        }
    }
}

impl DecoratorInner {
    /// Steps 5-9 of the dispatch chain: admission, circuit permit, retry
    /// loop, provider call, metrics.
    ///
    /// `blocking_admission` selects how the rate limiter is consulted:
    /// background deliveries wait for a slot, synchronous callers fail
    /// fast with `RateLimited`.
    async fn execute_pipeline(
        &self,
        msg: &dyn Message,
        options: &SendOptions,
        blocking_admission: bool,
    ) -> Result<SendResult, SendError> {
        let start = Instant::now();

        let work = async {
            self.admit(options, blocking_admission).await?;

            if let Some(breaker) = &self.middleware.circuit_breaker {
                breaker.try_acquire_permit()?;
            }

            let retry = options
                .retry
                .clone()
                .or_else(|| self.middleware.retry.clone())
                .unwrap_or_else(RetryPolicy::none);

            let provider_options = ProviderSendOptions {
                http_client: options.http_client.clone(),
                account_name: options.account_name.clone(),
                timeout: options.timeout,
            };

            let result = retry
                .execute(|| {
                    let provider_options = provider_options.clone();
                    async move { self.provider.send(msg, &provider_options).await }
                })
                .await;

            if let Some(breaker) = &self.middleware.circuit_breaker {
                match &result {
                    Ok(_) => breaker.record_success(),
                    Err(SendError::CircuitOpen) => {}
                    Err(_) => breaker.record_failure(),
                }
            }

            result
        };

        let outcome = match options.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, work).await {
                Ok(outcome) => outcome,
                Err(_) => Err(SendError::Timeout(timeout)),
            },
            None => work.await,
        };

        self.middleware
            .metrics
            .record_sent(self.provider.name(), outcome.is_ok(), start.elapsed());

        if let Err(e) = &outcome {
            warn!(
                provider = %self.provider.name(),
                msg_id = %msg.msg_id(),
                error = %e,
                "send failed"
            );
        }

        outcome
    }

    async fn admit(&self, options: &SendOptions, blocking: bool) -> Result<(), SendError> {
        if options.disable_rate_limiter {
            return Ok(());
        }
        let Some(limiter) = &self.middleware.rate_limiter else {
            return Ok(());
        };
        if blocking {
            limiter.acquire().await
        } else if limiter.try_acquire() {
            Ok(())
        } else {
            Err(SendError::RateLimited)
        }
    }

    /// After-hooks (per-call then global, each in reverse registration
    /// order) and the async callback. An after-hook error replaces the
    /// outcome only when the outcome was success.
    fn finalize(
        &self,
        msg: &dyn Message,
        outcome: Result<SendResult, SendError>,
        options: &SendOptions,
        invoke_callback: bool,
    ) -> Result<SendResult, SendError> {
        let mut outcome = outcome;
        for hook in options
            .after_hooks
            .iter()
            .rev()
            .chain(self.middleware.after_hooks.iter().rev())
        {
            if let Some(err) = hook(msg, &outcome) {
                if outcome.is_ok() {
                    outcome = Err(err);
                }
            }
        }

        if invoke_callback {
            if let Some(callback) = &options.callback {
                callback(&outcome);
            }
        }

        outcome
    }
}

impl std::fmt::Debug for ProviderDecorator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderDecorator")
            .field("provider", &self.inner.provider.name())
            .field("middleware", &self.inner.middleware)
            .field("closed", &self.is_closed())
            .finish()
    }
}
