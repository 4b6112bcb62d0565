use courier_core::{ProviderType, SendError};
use courier_provider::{BaseTransformer, RequestSpec};

use crate::message::WebhookMessage;

/// Transformer forwarding a [`WebhookMessage`] verbatim.
pub fn transformer() -> BaseTransformer {
    BaseTransformer::new(
        ProviderType::Webhook,
        Box::new(|msg, _account| {
            let msg = msg
                .as_any()
                .downcast_ref::<WebhookMessage>()
                .ok_or_else(|| {
                    SendError::InvalidParam("webhook transformer got a foreign message".into())
                })?;

            let mut spec = RequestSpec::new(msg.method.clone(), msg.url.clone())
                .with_raw(msg.body.clone());
            for (name, value) in &msg.headers {
                spec = spec.with_header(name.clone(), value.clone());
            }
            for (name, value) in &msg.query {
                spec = spec.with_query(name.clone(), value.clone());
            }
            if let Some(content_type) = &msg.content_type {
                spec = spec.with_header("Content-Type", content_type.clone());
            }

            let handler = msg.expect.clone().into_handler("webhook");
            Ok((spec, handler))
        }),
    )
}
