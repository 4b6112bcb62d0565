use std::time::Duration;

use thiserror::Error;

use crate::provider_type::ProviderType;

/// Errors produced anywhere in the dispatch pipeline.
///
/// Each layer wraps the lower layer's failure into one of these kinds and
/// the terminal value reaches the caller (or the async callback); retry
/// attempts in between are only observable through metrics and hooks.
#[derive(Debug, Error)]
pub enum SendError {
    /// Message or call validation failed before any I/O. Never retried.
    #[error("invalid parameter: {0}")]
    InvalidParam(String),

    /// The vendor returned a failure. Carries the vendor business code and
    /// human-readable message; `retryable` reflects the response classifier
    /// (429/5xx transient, other 4xx permanent).
    #[error("[{provider}] send failed (code {code}): {message}")]
    ProviderSend {
        /// `provider` or `provider.subprovider` context tag.
        provider: String,
        /// Vendor business code (HTTP status when no body code exists).
        code: String,
        /// Vendor error message.
        message: String,
        /// Whether the classifier considers this failure transient.
        retryable: bool,
    },

    /// Local or upstream rate limit. Retryable with backoff.
    #[error("rate limit exceeded")]
    RateLimited,

    /// Short-circuited by an open circuit breaker. Not retried.
    #[error("circuit breaker is open")]
    CircuitOpen,

    /// The per-call deadline fired. Not retried.
    #[error("timeout after {0:?}")]
    Timeout(Duration),

    /// The call was cancelled before completion. Not retried.
    #[error("operation cancelled")]
    Cancelled,

    /// No provider is registered for the message's channel family.
    #[error("no provider registered for {0}")]
    NoProvider(ProviderType),

    /// An account-name hint did not match any enabled account.
    #[error("account not found: {0}")]
    AccountNotFound(String),

    /// The sender has been closed.
    #[error("sender is closed")]
    SenderClosed,

    /// Network, TLS, or DNS failure below the vendor API. Retryable.
    #[error("transport error: {0}")]
    Transport(String),

    /// Request or response body could not be encoded/decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid provider or middleware configuration. Fatal.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The queue rejected or lost the item.
    #[error("queue error: {0}")]
    Queue(String),
}

impl SendError {
    /// Returns `true` if the error is transient and the operation may
    /// succeed on retry. This is the default retry filter's decision rule.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::RateLimited => true,
            Self::ProviderSend { retryable, .. } => *retryable,
            _ => false,
        }
    }
}
