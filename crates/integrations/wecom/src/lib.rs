//! WeCom (WeChat Work) group-bot channel.
//!
//! Group bots receive a `msgtype`-keyed JSON document on the webhook
//! endpoint; the bot key is the account's `api_key`. Success is
//! `errcode == 0`.

mod message;
mod transformer;

pub use message::{WecomContent, WecomMessage};
pub use transformer::transformer;

use std::sync::Arc;

use courier_core::{ProviderConfig, ProviderType, SendError};
use courier_provider::HttpProvider;

/// Build the WeCom bot provider over the given account set.
pub fn new(config: &ProviderConfig) -> Result<HttpProvider, SendError> {
    HttpProvider::new(
        ProviderType::WecomBot,
        config,
        vec![Arc::new(transformer()) as Arc<dyn courier_provider::Transformer>],
    )
}
