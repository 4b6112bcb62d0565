//! DingTalk group-bot channel.
//!
//! The bot access token is the account's `api_key`. When the account also
//! carries an `api_secret`, the webhook URL is signed:
//! `sign = urlencode(base64(HMAC-SHA256(secret, "<timestamp>\n<secret>")))`
//! with the millisecond timestamp sent alongside. Success is
//! `errcode == 0`.

mod message;
mod transformer;

pub use message::{DingtalkContent, DingtalkMessage};
pub use transformer::transformer;

use std::sync::Arc;

use courier_core::{ProviderConfig, ProviderType, SendError};
use courier_provider::HttpProvider;

/// Build the DingTalk bot provider over the given account set.
pub fn new(config: &ProviderConfig) -> Result<HttpProvider, SendError> {
    HttpProvider::new(
        ProviderType::Dingtalk,
        config,
        vec![Arc::new(transformer()) as Arc<dyn courier_provider::Transformer>],
    )
}
