//! Telegram Bot API channel.
//!
//! The bot token is the account's `api_key`; requests go to
//! `https://api.telegram.org/bot<token>/<method>`. Text messages and
//! photo-by-URL are JSON; photo uploads are multipart. Success is
//! `ok == true` in the response body.

mod message;
mod transformer;

pub use message::{TelegramContent, TelegramMessage, TelegramParseMode};
pub use transformer::transformer;

use std::sync::Arc;

use courier_core::{ProviderConfig, ProviderType, SendError};
use courier_provider::HttpProvider;

/// Build the Telegram provider over the given account set.
pub fn new(config: &ProviderConfig) -> Result<HttpProvider, SendError> {
    HttpProvider::new(
        ProviderType::Telegram,
        config,
        vec![Arc::new(transformer()) as Arc<dyn courier_provider::Transformer>],
    )
}
