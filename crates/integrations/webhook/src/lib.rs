//! Pass-through webhook channel.
//!
//! A [`WebhookMessage`] fully specifies the request: method, URL, headers,
//! query, body, and the expectation used to classify the response. The
//! transformer forwards it verbatim; accounts exist only for selection
//! symmetry and carry no credentials the message doesn't already embed.

mod message;
mod transformer;

pub use message::{WebhookMessage, WebhookMessageBuilder};
pub use transformer::transformer;

use std::sync::Arc;

use courier_core::{ProviderConfig, ProviderType, SendError};
use courier_provider::HttpProvider;

/// Build the webhook provider over the given account set.
pub fn new(config: &ProviderConfig) -> Result<HttpProvider, SendError> {
    HttpProvider::new(
        ProviderType::Webhook,
        config,
        vec![Arc::new(transformer()) as Arc<dyn courier_provider::Transformer>],
    )
}
