//! HTTP email-API channel.
//!
//! One message type serves every API vendor; the message pins its vendor
//! via the sub-provider tag and account selection narrows to accounts of
//! that sub-type. Shipped transformers:
//!
//! - **Resend** (`resend`): `POST https://api.resend.com/emails`, Bearer
//!   auth, `Idempotency-Key` set to the message id.
//! - **Brevo** (`brevo`): `POST https://api.brevo.com/v3/smtp/email`,
//!   `api-key` header, template support via `templateId` + `params`.

mod brevo;
mod message;
mod resend;

pub use brevo::transformer as brevo_transformer;
pub use message::{EmailApiAttachment, EmailApiMessage};
pub use resend::transformer as resend_transformer;

use std::sync::Arc;

use courier_core::{Account, Message, ProviderConfig, ProviderType, SendError};
use courier_provider::HttpProvider;

/// Sub-provider tag for Resend.
pub const SUB_RESEND: &str = "resend";
/// Sub-provider tag for Brevo.
pub const SUB_BREVO: &str = "brevo";

/// Build the email-API provider with both vendor transformers.
pub fn new(config: &ProviderConfig) -> Result<HttpProvider, SendError> {
    HttpProvider::new(
        ProviderType::EmailApi,
        config,
        vec![
            Arc::new(resend_transformer()) as Arc<dyn courier_provider::Transformer>,
            Arc::new(brevo_transformer()) as Arc<dyn courier_provider::Transformer>,
        ],
    )
}

/// Reject accounts whose sub-type contradicts the message's pinned vendor.
/// Installed as the config resolver on both transformers.
pub(crate) fn resolve_account(msg: &dyn Message, account: &Account) -> Result<Account, SendError> {
    if let (Some(account_sub), Some(msg_sub)) = (account.sub_type.as_deref(), msg.sub_provider()) {
        if account_sub != msg_sub {
            return Err(SendError::Configuration(format!(
                "account '{}' is a {account_sub} account but the message pins {msg_sub}",
                account.name
            )));
        }
    }
    Ok(account.clone())
}

/// The effective sender address: the message's `from`, falling back to the
/// account's configured default.
pub(crate) fn effective_from(
    msg_from: &str,
    account: &Account,
) -> Result<String, SendError> {
    if !msg_from.is_empty() {
        return Ok(msg_from.to_owned());
    }
    account
        .extra_str("from")
        .map(str::to_owned)
        .ok_or_else(|| {
            SendError::InvalidParam(
                "message has no 'from' and the account sets no default".into(),
            )
        })
}
