use std::sync::Arc;
use std::time::Duration;

use courier_core::{Message, SendError, SendResult};

use crate::retry::RetryPolicy;

/// Invoked when an async send terminates, with the terminal outcome.
pub type SendCallback = Arc<dyn Fn(&Result<SendResult, SendError>) + Send + Sync>;

/// Runs before dispatch; any error aborts the send with that error.
pub type BeforeHook = Arc<dyn Fn(&dyn Message) -> Result<(), SendError> + Send + Sync>;

/// Runs after the terminal outcome is known. A returned error replaces the
/// outcome only when the outcome was success; a failed send's error is
/// never masked.
pub type AfterHook =
    Arc<dyn Fn(&dyn Message, &Result<SendResult, SendError>) -> Option<SendError> + Send + Sync>;

/// Per-call options. Immutable once handed to the sender; per-call values
/// win over the middleware snapshot.
#[derive(Clone, Default)]
pub struct SendOptions {
    /// Return immediately and deliver in the background.
    pub async_send: bool,

    /// Minimum delay before an async send becomes eligible for delivery.
    pub delay: Option<Duration>,

    /// HTTP client override for this call.
    pub http_client: Option<reqwest::Client>,

    /// Retry policy override for this call.
    pub retry: Option<RetryPolicy>,

    /// Terminal-outcome callback (async sends).
    pub callback: Option<SendCallback>,

    /// Per-call before-hooks, run in registration order after the global
    /// ones.
    pub before_hooks: Vec<BeforeHook>,

    /// Per-call after-hooks, run in reverse registration order before the
    /// global ones.
    pub after_hooks: Vec<AfterHook>,

    /// Skip the rate limiter for this call.
    pub disable_rate_limiter: bool,

    /// Account-name hint; must match an enabled account exactly.
    pub account_name: Option<String>,

    /// Deadline for the whole pipeline (rate-limit wait, retries, wire).
    pub timeout: Option<Duration>,
}

impl SendOptions {
    /// Empty options: synchronous, no overrides.
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver in the background; `send` returns once the item is
    /// accepted.
    #[must_use]
    pub fn with_async(mut self) -> Self {
        self.async_send = true;
        self
    }

    /// Delay an async delivery.
    #[must_use]
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Override the HTTP client for this call.
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Override the retry policy for this call.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = Some(retry);
        self
    }

    /// Register the terminal-outcome callback.
    #[must_use]
    pub fn with_callback(mut self, callback: SendCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Append a per-call before-hook.
    #[must_use]
    pub fn with_before_hook(mut self, hook: BeforeHook) -> Self {
        self.before_hooks.push(hook);
        self
    }

    /// Append a per-call after-hook.
    #[must_use]
    pub fn with_after_hook(mut self, hook: AfterHook) -> Self {
        self.after_hooks.push(hook);
        self
    }

    /// Skip the rate limiter for this call.
    #[must_use]
    pub fn without_rate_limiter(mut self) -> Self {
        self.disable_rate_limiter = true;
        self
    }

    /// Pin the account to send with.
    #[must_use]
    pub fn with_account(mut self, account_name: impl Into<String>) -> Self {
        self.account_name = Some(account_name.into());
        self
    }

    /// Bound the whole pipeline with a deadline.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl std::fmt::Debug for SendOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendOptions")
            .field("async_send", &self.async_send)
            .field("delay", &self.delay)
            .field("http_client", &self.http_client.is_some())
            .field("retry", &self.retry)
            .field("callback", &self.callback.is_some())
            .field("before_hooks", &self.before_hooks.len())
            .field("after_hooks", &self.after_hooks.len())
            .field("disable_rate_limiter", &self.disable_rate_limiter)
            .field("account_name", &self.account_name)
            .field("timeout", &self.timeout)
            .finish()
    }
}
