//! SMS channel.
//!
//! Ships the Aliyun gateway (sub-provider `aliyun`): the 2017-05-25
//! `SendSms` API as a signed GET (sorted query, RFC3986 percent-encoding,
//! `HMAC-SHA1` over `GET&%2F&<encoded query>` with the account secret).
//! Success is `Code == "OK"`.
//!
//! Further gateways register as additional transformers under their own
//! sub-provider tags.

mod aliyun;
mod message;

pub use aliyun::transformer as aliyun_transformer;
pub use message::SmsMessage;

use std::sync::Arc;

use courier_core::{ProviderConfig, ProviderType, SendError};
use courier_provider::HttpProvider;

/// Sub-provider tag for the Aliyun gateway.
pub const SUB_ALIYUN: &str = "aliyun";

/// Build the SMS provider over the given account set.
pub fn new(config: &ProviderConfig) -> Result<HttpProvider, SendError> {
    HttpProvider::new(
        ProviderType::Sms,
        config,
        vec![Arc::new(aliyun_transformer()) as Arc<dyn courier_provider::Transformer>],
    )
}
