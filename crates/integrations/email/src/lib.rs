//! SMTP email channel.
//!
//! The one provider in the system that does not speak HTTP: delivery goes
//! through `lettre`'s async SMTP transport. Each account describes one
//! SMTP endpoint (`host`, `port`, `encryption`, default `from` in the
//! account extras; username/password in the credential fields) and the
//! selector picks among them like any other channel.

mod message;
mod provider;

pub use message::{EmailAttachment, EmailMessage, EmailMessageBuilder};
pub use provider::EmailProvider;

use courier_core::{ProviderConfig, SendError};

/// Build the SMTP email provider over the given account set.
pub fn new(config: &ProviderConfig) -> Result<EmailProvider, SendError> {
    EmailProvider::new(config)
}
