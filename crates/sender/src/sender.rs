use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use courier_core::{Message, ProviderType, SendError, SendResult};
use courier_provider::Provider;
use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig};
use crate::decorator::ProviderDecorator;
use crate::health::{HealthReport, ProviderHealth};
use crate::metrics::MetricsCollector;
use crate::middleware::SenderMiddleware;
use crate::options::{AfterHook, BeforeHook, SendOptions};
use crate::queue::Queue;
use crate::rate_limit::RateLimiter;
use crate::retry::RetryPolicy;

struct SenderState {
    middleware: SenderMiddleware,
    /// Template for per-provider breakers; each registration gets a fresh
    /// breaker so providers are isolated from each other's failures.
    breaker_config: Option<CircuitBreakerConfig>,
    default_http_client: Option<reqwest::Client>,
}

/// Facade and registry: routes messages to provider decorators by channel
/// family.
///
/// Middleware configured on the sender is **snapshotted** into each
/// decorator at registration. Setters called after a provider is
/// registered only affect providers registered later; pass a
/// [`SenderMiddleware`] override to [`register_provider`](Self::register_provider)
/// for a per-provider stack.
pub struct Sender {
    decorators: DashMap<ProviderType, Arc<ProviderDecorator>>,
    state: RwLock<SenderState>,
    closed: AtomicBool,
}

impl Sender {
    /// A sender with default middleware (in-memory metrics, no rate
    /// limiter, no retries, no breaker, no queue).
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Start configuring a sender.
    pub fn builder() -> SenderBuilder {
        SenderBuilder::default()
    }

    /// Register a provider under its channel family, wrapping it in the
    /// current middleware snapshot (or the given override). Re-registering
    /// a family replaces its decorator.
    pub fn register_provider(
        &self,
        provider: Arc<dyn Provider>,
        middleware_override: Option<SenderMiddleware>,
    ) -> Result<(), SendError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SendError::SenderClosed);
        }

        let middleware = middleware_override.unwrap_or_else(|| self.snapshot_middleware());
        let provider_type = provider.provider_type();
        info!(provider = %provider.name(), %provider_type, "registering provider");
        self.decorators.insert(
            provider_type,
            Arc::new(ProviderDecorator::new(provider, middleware)),
        );
        Ok(())
    }

    /// Fire-and-forget send. For async options this returns as soon as
    /// the message is accepted; the terminal outcome goes to the callback
    /// and after-hooks.
    pub async fn send<M: Message + 'static>(
        &self,
        msg: M,
        options: SendOptions,
    ) -> Result<(), SendError> {
        self.send_dyn(Arc::new(msg), options).await.map(|_| ())
    }

    /// [`send`](Self::send) for an already type-erased message.
    pub async fn send_dyn(
        &self,
        msg: Arc<dyn Message>,
        options: SendOptions,
    ) -> Result<Option<SendResult>, SendError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(SendError::SenderClosed);
        }

        let options = self.apply_default_client(options);
        let provider_type = msg.provider_type();
        let decorator = self
            .decorators
            .get(&provider_type)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(SendError::NoProvider(provider_type))?;

        debug!(%provider_type, msg_id = %msg.msg_id(), "dispatching message");
        decorator.send(msg, options).await
    }

    /// Synchronous send returning the delivery record. The `async_send`
    /// option is ignored: a result requires waiting for the outcome.
    pub async fn send_with_result<M: Message + 'static>(
        &self,
        msg: M,
        mut options: SendOptions,
    ) -> Result<SendResult, SendError> {
        options.async_send = false;
        let result = self.send_dyn(Arc::new(msg), options).await?;
        result.ok_or_else(|| SendError::Queue("synchronous send produced no result".into()))
    }

    /// Send pinned to a named account. A hint already present in the
    /// options wins over `account_name`.
    pub async fn send_via<M: Message + 'static>(
        &self,
        account_name: &str,
        msg: M,
        mut options: SendOptions,
    ) -> Result<(), SendError> {
        if options.account_name.is_none() {
            options.account_name = Some(account_name.to_owned());
        }
        self.send(msg, options).await
    }

    // -- Middleware setters (affect future registrations only) -------------

    /// Set the rate limiter for future registrations.
    pub fn set_rate_limiter(&self, rate_limiter: Arc<dyn RateLimiter>) {
        self.state.write().middleware.rate_limiter = Some(rate_limiter);
    }

    /// Set the retry policy for future registrations.
    pub fn set_retry_policy(&self, retry: RetryPolicy) {
        self.state.write().middleware.retry = Some(retry);
    }

    /// Give each future registration a fresh circuit breaker with this
    /// configuration.
    pub fn set_circuit_breaker(&self, config: CircuitBreakerConfig) {
        self.state.write().breaker_config = Some(config);
    }

    /// Set the async-send queue for future registrations.
    pub fn set_queue(&self, queue: Arc<dyn Queue>) {
        self.state.write().middleware.queue = Some(queue);
    }

    /// Replace the metrics collector for future registrations.
    pub fn set_metrics(&self, metrics: Arc<dyn MetricsCollector>) {
        self.state.write().middleware.metrics = metrics;
    }

    /// Default HTTP client handed to providers when a call has no
    /// override.
    pub fn set_default_http_client(&self, client: reqwest::Client) {
        self.state.write().default_http_client = Some(client);
    }

    /// Append a global before-hook for future registrations.
    pub fn add_before_hook(&self, hook: BeforeHook) {
        self.state.write().middleware.before_hooks.push(hook);
    }

    /// Append a global after-hook for future registrations.
    pub fn add_after_hook(&self, hook: AfterHook) {
        self.state.write().middleware.after_hooks.push(hook);
    }

    /// Aggregate health over every registered provider.
    pub async fn health_check(&self) -> HealthReport {
        let decorators: Vec<Arc<ProviderDecorator>> = self
            .decorators
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut providers = Vec::with_capacity(decorators.len());
        for decorator in decorators {
            let provider = decorator.provider();
            let (healthy, error) = match provider.health_check().await {
                Ok(()) => (true, None),
                Err(e) => (false, Some(e.to_string())),
            };
            providers.push(ProviderHealth {
                provider: provider.name().to_owned(),
                healthy,
                error,
                circuit_state: decorator
                    .middleware()
                    .circuit_breaker
                    .as_ref()
                    .map(|breaker| breaker.state()),
            });
        }
        providers.sort_by(|a, b| a.provider.cmp(&b.provider));
        HealthReport::aggregate(providers)
    }

    /// Close the sender: stop accepting sends, close middleware
    /// components, and drain queue workers. Idempotent.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("closing sender");

        let decorators: Vec<Arc<ProviderDecorator>> = self
            .decorators
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        for decorator in &decorators {
            decorator.close();
            if let Some(limiter) = &decorator.middleware().rate_limiter {
                limiter.close();
            }
            if let Some(queue) = &decorator.middleware().queue {
                queue.close();
            }
        }
        {
            let state = self.state.read();
            if let Some(queue) = &state.middleware.queue {
                queue.close();
            }
            if let Some(limiter) = &state.middleware.rate_limiter {
                limiter.close();
            }
        }
        for decorator in &decorators {
            decorator.join_worker().await;
        }
    }

    /// Whether [`close`](Self::close) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of registered providers.
    pub fn provider_count(&self) -> usize {
        self.decorators.len()
    }

    fn snapshot_middleware(&self) -> SenderMiddleware {
        let state = self.state.read();
        let mut middleware = state.middleware.clone();
        if middleware.circuit_breaker.is_none() {
            if let Some(config) = &state.breaker_config {
                middleware.circuit_breaker = Some(Arc::new(CircuitBreaker::new(config.clone())));
            }
        }
        middleware
    }

    fn apply_default_client(&self, mut options: SendOptions) -> SendOptions {
        if options.http_client.is_none() {
            options.http_client = self.state.read().default_http_client.clone();
        }
        options
    }
}

impl Default for Sender {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Sender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sender")
            .field("providers", &self.decorators.len())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

/// Builder for a [`Sender`]'s initial middleware template.
#[derive(Default)]
pub struct SenderBuilder {
    middleware: SenderMiddleware,
    breaker_config: Option<CircuitBreakerConfig>,
    default_http_client: Option<reqwest::Client>,
}

impl SenderBuilder {
    /// Rate limiter shared by future registrations.
    #[must_use]
    pub fn with_rate_limiter(mut self, rate_limiter: Arc<dyn RateLimiter>) -> Self {
        self.middleware.rate_limiter = Some(rate_limiter);
        self
    }

    /// Retry policy for future registrations.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.middleware.retry = Some(retry);
        self
    }

    /// Per-provider circuit breaker configuration.
    #[must_use]
    pub fn with_circuit_breaker(mut self, config: CircuitBreakerConfig) -> Self {
        self.breaker_config = Some(config);
        self
    }

    /// Queue backing async sends.
    #[must_use]
    pub fn with_queue(mut self, queue: Arc<dyn Queue>) -> Self {
        self.middleware.queue = Some(queue);
        self
    }

    /// Metrics collector.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<dyn MetricsCollector>) -> Self {
        self.middleware.metrics = metrics;
        self
    }

    /// Default HTTP client for calls without an override.
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.default_http_client = Some(client);
        self
    }

    /// Global before-hook.
    #[must_use]
    pub fn with_before_hook(mut self, hook: BeforeHook) -> Self {
        self.middleware.before_hooks.push(hook);
        self
    }

    /// Global after-hook.
    #[must_use]
    pub fn with_after_hook(mut self, hook: AfterHook) -> Self {
        self.middleware.after_hooks.push(hook);
        self
    }

    /// Finish the sender.
    pub fn build(self) -> Sender {
        Sender {
            decorators: DashMap::new(),
            state: RwLock::new(SenderState {
                middleware: self.middleware,
                breaker_config: self.breaker_config,
                default_http_client: self.default_http_client,
            }),
            closed: AtomicBool::new(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::sync::Arc;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    use async_trait::async_trait;
    use courier_provider::ProviderSendOptions;

    use super::*;
    use crate::metrics::InMemoryMetrics;

    struct TestMessage {
        id: String,
        kind: ProviderType,
    }

    impl TestMessage {
        fn new(kind: ProviderType) -> Self {
            Self {
                id: courier_core::new_msg_id(),
                kind,
            }
        }
    }

    impl Message for TestMessage {
        fn provider_type(&self) -> ProviderType {
            self.kind
        }

        fn msg_id(&self) -> &str {
            &self.id
        }

        fn validate(&self) -> Result<(), SendError> {
            Ok(())
        }

        fn as_any(&self) -> &dyn Any {
            self
        }
    }

    struct CountingProvider {
        kind: ProviderType,
        calls: Arc<AtomicU32>,
        healthy: bool,
    }

    impl CountingProvider {
        fn new(kind: ProviderType) -> (Arc<Self>, Arc<AtomicU32>) {
            let calls = Arc::new(AtomicU32::new(0));
            (
                Arc::new(Self {
                    kind,
                    calls: Arc::clone(&calls),
                    healthy: true,
                }),
                calls,
            )
        }
    }

    #[async_trait]
    impl Provider for CountingProvider {
        fn name(&self) -> &str {
            self.kind.as_str()
        }

        fn provider_type(&self) -> ProviderType {
            self.kind
        }

        async fn send(
            &self,
            msg: &dyn Message,
            _options: &ProviderSendOptions,
        ) -> Result<SendResult, SendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(SendResult {
                request_id: msg.msg_id().to_owned(),
                provider_name: self.name().to_owned(),
                account_name: "default".to_owned(),
                elapsed: Duration::ZERO,
                status_code: Some(200),
                response_excerpt: String::new(),
            })
        }

        async fn health_check(&self) -> Result<(), SendError> {
            if self.healthy {
                Ok(())
            } else {
                Err(SendError::Transport("down".into()))
            }
        }
    }

    #[tokio::test]
    async fn send_routes_by_provider_type() {
        let sender = Sender::new();
        let (provider, calls) = CountingProvider::new(ProviderType::Webhook);
        sender.register_provider(provider, None).unwrap();

        sender
            .send(TestMessage::new(ProviderType::Webhook), SendOptions::new())
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn missing_provider_fails() {
        let sender = Sender::new();
        let err = sender
            .send(TestMessage::new(ProviderType::Sms), SendOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SendError::NoProvider(ProviderType::Sms)));
    }

    #[tokio::test]
    async fn send_with_result_returns_the_record() {
        let sender = Sender::new();
        let (provider, _) = CountingProvider::new(ProviderType::Webhook);
        sender.register_provider(provider, None).unwrap();

        let msg = TestMessage::new(ProviderType::Webhook);
        let msg_id = msg.msg_id().to_owned();
        let result = sender
            .send_with_result(msg, SendOptions::new())
            .await
            .unwrap();
        assert_eq!(result.request_id, msg_id);
        assert_eq!(result.provider_name, "webhook");
    }

    #[tokio::test]
    async fn close_is_idempotent_and_rejects_further_sends() {
        let sender = Sender::new();
        let (provider, _) = CountingProvider::new(ProviderType::Webhook);
        sender.register_provider(provider, None).unwrap();

        sender.close().await;
        sender.close().await;

        let err = sender
            .send(TestMessage::new(ProviderType::Webhook), SendOptions::new())
            .await
            .unwrap_err();
        assert!(matches!(err, SendError::SenderClosed));

        let (provider, _) = CountingProvider::new(ProviderType::Sms);
        assert!(matches!(
            sender.register_provider(provider, None),
            Err(SendError::SenderClosed)
        ));
    }

    #[tokio::test]
    async fn middleware_snapshot_is_taken_at_registration() {
        let sender = Sender::new();
        let early_metrics = Arc::new(InMemoryMetrics::new());
        sender.set_metrics(Arc::clone(&early_metrics) as Arc<dyn MetricsCollector>);

        let (provider, _) = CountingProvider::new(ProviderType::Webhook);
        sender.register_provider(provider, None).unwrap();

        // Swapping metrics now must not affect the registered provider.
        let late_metrics = Arc::new(InMemoryMetrics::new());
        sender.set_metrics(Arc::clone(&late_metrics) as Arc<dyn MetricsCollector>);

        sender
            .send(TestMessage::new(ProviderType::Webhook), SendOptions::new())
            .await
            .unwrap();

        assert_eq!(early_metrics.snapshot("webhook").total, 1);
        assert_eq!(late_metrics.snapshot("webhook").total, 0);
    }

    #[tokio::test]
    async fn each_registration_gets_its_own_breaker() {
        let sender = Sender::new();
        sender.set_circuit_breaker(CircuitBreakerConfig {
            failure_threshold: 1,
            reset_timeout: Duration::from_secs(3600),
        });

        let (webhook, _) = CountingProvider::new(ProviderType::Webhook);
        let (sms, _) = CountingProvider::new(ProviderType::Sms);
        sender.register_provider(webhook, None).unwrap();
        sender.register_provider(sms, None).unwrap();

        let webhook_breaker = sender
            .decorators
            .get(&ProviderType::Webhook)
            .unwrap()
            .middleware()
            .circuit_breaker
            .clone()
            .unwrap();
        let sms_breaker = sender
            .decorators
            .get(&ProviderType::Sms)
            .unwrap()
            .middleware()
            .circuit_breaker
            .clone()
            .unwrap();

        webhook_breaker.record_failure();
        assert_eq!(webhook_breaker.state(), crate::CircuitState::Open);
        assert_eq!(sms_breaker.state(), crate::CircuitState::Closed);
    }

    #[tokio::test]
    async fn health_check_aggregates_providers() {
        let sender = Sender::new();
        let (provider, _) = CountingProvider::new(ProviderType::Webhook);
        sender.register_provider(provider, None).unwrap();

        let sick = Arc::new(CountingProvider {
            kind: ProviderType::Sms,
            calls: Arc::new(AtomicU32::new(0)),
            healthy: false,
        });
        sender.register_provider(sick, None).unwrap();

        let report = sender.health_check().await;
        assert_eq!(report.status, crate::HealthStatus::Degraded);
        assert_eq!(report.providers.len(), 2);
        let sms = report.providers.iter().find(|p| p.provider == "sms").unwrap();
        assert!(!sms.healthy);
        assert!(sms.error.is_some());
    }

    #[tokio::test]
    async fn send_via_pins_the_account_hint() {
        let sender = Sender::new();

        struct HintAsserting {
            calls: Arc<AtomicU32>,
        }

        #[async_trait]
        impl Provider for HintAsserting {
            fn name(&self) -> &str {
                "webhook"
            }

            fn provider_type(&self) -> ProviderType {
                ProviderType::Webhook
            }

            async fn send(
                &self,
                msg: &dyn Message,
                options: &ProviderSendOptions,
            ) -> Result<SendResult, SendError> {
                assert_eq!(options.account_name.as_deref(), Some("backup"));
                self.calls.fetch_add(1, Ordering::SeqCst);
                Ok(SendResult {
                    request_id: msg.msg_id().to_owned(),
                    provider_name: "webhook".to_owned(),
                    account_name: "backup".to_owned(),
                    elapsed: Duration::ZERO,
                    status_code: None,
                    response_excerpt: String::new(),
                })
            }
        }

        let calls = Arc::new(AtomicU32::new(0));
        sender
            .register_provider(
                Arc::new(HintAsserting {
                    calls: Arc::clone(&calls),
                }),
                None,
            )
            .unwrap();

        sender
            .send_via(
                "backup",
                TestMessage::new(ProviderType::Webhook),
                SendOptions::new(),
            )
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // An explicit options hint wins over the channel argument.
        sender
            .send_via(
                "ignored",
                TestMessage::new(ProviderType::Webhook),
                SendOptions::new().with_account("backup"),
            )
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn re_registration_replaces_the_decorator() {
        let sender = Sender::new();
        let (first, first_calls) = CountingProvider::new(ProviderType::Webhook);
        let (second, second_calls) = CountingProvider::new(ProviderType::Webhook);
        sender.register_provider(first, None).unwrap();
        sender.register_provider(second, None).unwrap();
        assert_eq!(sender.provider_count(), 1);

        sender
            .send(TestMessage::new(ProviderType::Webhook), SendOptions::new())
            .await
            .unwrap();
        assert_eq!(first_calls.load(Ordering::SeqCst), 0);
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
    }
}
