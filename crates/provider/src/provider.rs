use std::time::Duration;

use async_trait::async_trait;
use courier_core::{Message, ProviderType, SendError, SendResult};

/// Per-call options a provider may honour.
///
/// Providers are free to ignore options they do not support; the HTTP shell
/// honours all three.
#[derive(Default, Clone)]
pub struct ProviderSendOptions {
    /// HTTP client override for this call. Treated as a shared,
    /// immutable handle; providers must not mutate it.
    pub http_client: Option<reqwest::Client>,

    /// Account-name hint; must match an enabled account exactly.
    pub account_name: Option<String>,

    /// Per-call deadline applied to the wire round-trip.
    pub timeout: Option<Duration>,
}

impl std::fmt::Debug for ProviderSendOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSendOptions")
            .field("http_client", &self.http_client.is_some())
            .field("account_name", &self.account_name)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// An object that owns a connection strategy for one channel family and
/// knows how to deliver its messages.
///
/// Object-safe by design: the sender holds providers behind
/// `Arc<dyn Provider>`.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Unique name of this provider (usually the channel-family tag).
    fn name(&self) -> &str;

    /// The channel family this provider serves.
    fn provider_type(&self) -> ProviderType;

    /// Deliver one message, returning the delivery record.
    async fn send(
        &self,
        msg: &dyn Message,
        options: &ProviderSendOptions,
    ) -> Result<SendResult, SendError>;

    /// Verify the provider is operational. Defaults to healthy.
    async fn health_check(&self) -> Result<(), SendError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::any::Any;
    use std::sync::Arc;

    use super::*;

    struct EchoProvider;

    struct EchoMessage {
        id: String,
    }

    impl Message for EchoMessage {
        fn provider_type(&self) -> ProviderType {
            ProviderType::Webhook
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

    #[async_trait]
    impl Provider for EchoProvider {
        fn name(&self) -> &str {
            "echo"
        }

        fn provider_type(&self) -> ProviderType {
            ProviderType::Webhook
        }

        async fn send(
            &self,
            msg: &dyn Message,
            _options: &ProviderSendOptions,
        ) -> Result<SendResult, SendError> {
            Ok(SendResult {
                request_id: msg.msg_id().to_owned(),
                provider_name: self.name().to_owned(),
                account_name: "default".to_owned(),
                elapsed: Duration::ZERO,
                status_code: None,
                response_excerpt: String::new(),
            })
        }
    }

    #[tokio::test]
    async fn provider_is_object_safe() {
        let provider: Arc<dyn Provider> = Arc::new(EchoProvider);
        let msg = EchoMessage {
            id: courier_core::new_msg_id(),
        };
        let result = provider
            .send(&msg, &ProviderSendOptions::default())
            .await
            .unwrap();
        assert_eq!(result.request_id, msg.msg_id());
        provider.health_check().await.unwrap();
    }

    #[test]
    fn options_debug_hides_client() {
        let options = ProviderSendOptions {
            http_client: Some(reqwest::Client::new()),
            account_name: Some("a".into()),
            timeout: None,
        };
        let debug = format!("{options:?}");
        assert!(debug.contains("http_client: true"));
    }
}
