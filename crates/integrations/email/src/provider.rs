use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use courier_core::{
    Account, AccountSelector, Message, ProviderConfig, ProviderType, SendError, SendResult,
};
use courier_provider::{Provider, ProviderSendOptions};
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use tracing::{debug, error, info};

use crate::message::EmailMessage;

/// SMTP delivery provider.
///
/// Implements the provider contract directly instead of going through the
/// HTTP shell: account selection works like every other channel, but the
/// wire call is an SMTP transaction per account-configured relay.
pub struct EmailProvider {
    selector: AccountSelector,
    transports: HashMap<String, (Account, AsyncSmtpTransport<Tokio1Executor>)>,
}

impl EmailProvider {
    /// Build transports for every enabled account in the config.
    pub fn new(config: &ProviderConfig) -> Result<Self, SendError> {
        if config.disabled {
            return Err(SendError::Configuration("provider 'email' is disabled".into()));
        }
        let selector = AccountSelector::new(config)?;

        let mut transports = HashMap::new();
        for account in config.enabled_accounts() {
            let transport = build_transport(&account)?;
            transports.insert(account.name.clone(), (account, transport));
        }
        Ok(Self {
            selector,
            transports,
        })
    }
}

#[async_trait]
impl Provider for EmailProvider {
    fn name(&self) -> &str {
        "email"
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::Email
    }

    async fn send(
        &self,
        msg: &dyn Message,
        options: &ProviderSendOptions,
    ) -> Result<SendResult, SendError> {
        let start = Instant::now();

        let msg = msg.as_any().downcast_ref::<EmailMessage>().ok_or_else(|| {
            SendError::InvalidParam("email provider got a foreign message".into())
        })?;
        msg.validate()?;

        let selected = self
            .selector
            .select(options.account_name.as_deref(), None)?;
        let (account, transport) = self
            .transports
            .get(&selected.name)
            .ok_or_else(|| SendError::AccountNotFound(selected.name.clone()))?;

        let email = build_email(msg, account)?;

        info!(account = %account.name, subject = %msg.subject, "sending email via SMTP");
        match transport.send(email).await {
            Ok(response) => {
                self.selector.mark_success(&account.name);
                let reply = response.message().collect::<Vec<_>>().join(" ");
                Ok(SendResult {
                    request_id: Message::msg_id(msg).to_owned(),
                    provider_name: self.name().to_owned(),
                    account_name: account.name.clone(),
                    elapsed: start.elapsed(),
                    // SMTP replies are not HTTP statuses.
                    status_code: None,
                    response_excerpt: SendResult::excerpt_of(&reply),
                })
            }
            Err(e) => {
                self.selector.mark_failure(&account.name);
                error!(account = %account.name, error = %e, "SMTP send failed");
                Err(map_smtp_error(&e))
            }
        }
    }

    async fn health_check(&self) -> Result<(), SendError> {
        debug!("performing SMTP health check");
        for (name, (_, transport)) in &self.transports {
            let ok = transport
                .test_connection()
                .await
                .map_err(|e| SendError::Transport(format!("SMTP '{name}': {e}")))?;
            if !ok {
                return Err(SendError::Transport(format!(
                    "SMTP '{name}': connection test failed"
                )));
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for EmailProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmailProvider")
            .field("accounts", &self.transports.len())
            .finish_non_exhaustive()
    }
}

/// Build the async SMTP transport one account describes.
fn build_transport(
    account: &Account,
) -> Result<AsyncSmtpTransport<Tokio1Executor>, SendError> {
    let host = account.require_extra_str("host")?;
    #[allow(clippy::cast_possible_truncation)]
    let port = account.extra_u64("port").unwrap_or(587) as u16;

    let mut builder = match account.extra_str("encryption").unwrap_or("starttls") {
        "none" => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host),
        "tls" => AsyncSmtpTransport::<Tokio1Executor>::relay(host)
            .map_err(|e| SendError::Configuration(format!("invalid SMTP relay: {e}")))?,
        _ => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| SendError::Configuration(format!("invalid SMTP relay: {e}")))?,
    }
    .port(port);

    if !account.api_key.is_empty() {
        builder = builder.credentials(Credentials::new(
            account.api_key.clone(),
            account.api_secret.clone(),
        ));
    }
    Ok(builder.build())
}

/// Assemble the `lettre` message: multipart/alternative when both bodies
/// are present, multipart/mixed when attachments ride along.
fn build_email(msg: &EmailMessage, account: &Account) -> Result<lettre::Message, SendError> {
    let from = if msg.from.is_empty() {
        account
            .extra_str("from")
            .ok_or_else(|| {
                SendError::InvalidParam(
                    "message has no 'from' and the account sets no default".into(),
                )
            })?
            .to_owned()
    } else {
        msg.from.clone()
    };

    let parse_mailbox = |address: &str, role: &str| -> Result<Mailbox, SendError> {
        address
            .parse()
            .map_err(|e| SendError::InvalidParam(format!("invalid {role} address '{address}': {e}")))
    };

    let mut builder = lettre::Message::builder()
        .from(parse_mailbox(&from, "from")?)
        .subject(&msg.subject);
    for to in &msg.to {
        builder = builder.to(parse_mailbox(to, "recipient")?);
    }
    for cc in &msg.cc {
        builder = builder.cc(parse_mailbox(cc, "CC")?);
    }
    for bcc in &msg.bcc {
        builder = builder.bcc(parse_mailbox(bcc, "BCC")?);
    }
    if let Some(reply_to) = &msg.reply_to {
        builder = builder.reply_to(parse_mailbox(reply_to, "reply-to")?);
    }

    let body = match (&msg.text, &msg.html) {
        (Some(text), Some(html)) => MultiPart::alternative()
            .singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_PLAIN)
                    .body(text.clone()),
            )
            .singlepart(
                SinglePart::builder()
                    .header(ContentType::TEXT_HTML)
                    .body(html.clone()),
            ),
        (Some(text), None) => MultiPart::mixed().singlepart(
            SinglePart::builder()
                .header(ContentType::TEXT_PLAIN)
                .body(text.clone()),
        ),
        (None, Some(html)) => MultiPart::mixed().singlepart(
            SinglePart::builder()
                .header(ContentType::TEXT_HTML)
                .body(html.clone()),
        ),
        (None, None) => {
            return Err(SendError::InvalidParam("email has no body".into()));
        }
    };

    let body = if msg.attachments.is_empty() {
        body
    } else {
        let mut mixed = MultiPart::mixed().multipart(body);
        for attachment in &msg.attachments {
            let content_type = ContentType::parse(&attachment.mime).map_err(|e| {
                SendError::InvalidParam(format!("invalid mime '{}': {e}", attachment.mime))
            })?;
            mixed = mixed.singlepart(
                Attachment::new(attachment.filename.clone())
                    .body(attachment.data.clone(), content_type),
            );
        }
        mixed
    };

    builder
        .multipart(body)
        .map_err(|e| SendError::InvalidParam(format!("failed to build email: {e}")))
}

fn map_smtp_error(err: &lettre::transport::smtp::Error) -> SendError {
    if err.is_permanent() {
        SendError::ProviderSend {
            provider: "email".into(),
            code: err
                .status()
                .map_or_else(|| "permanent".to_owned(), |code| code.to_string()),
            message: err.to_string(),
            retryable: false,
        }
    } else {
        SendError::Transport(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use courier_core::Strategy;

    use super::*;

    fn smtp_account(name: &str) -> Account {
        Account::new(name)
            .with_api_key("mailer")
            .with_api_secret("hunter2")
            .with_extra("host", "smtp.example.com")
            .with_extra("port", 465_u64)
            .with_extra("encryption", "tls")
            .with_extra("from", "noreply@example.com")
    }

    fn email() -> EmailMessage {
        EmailMessage::builder()
            .from("ops@example.com")
            .to("dev@example.com")
            .subject("hello")
            .text("body")
            .build()
    }

    #[tokio::test]
    async fn provider_builds_from_valid_config() {
        let config = ProviderConfig::new(vec![smtp_account("primary"), smtp_account("backup")])
            .with_strategy(Strategy::RoundRobin);
        let provider = EmailProvider::new(&config).unwrap();
        assert_eq!(provider.name(), "email");
        assert_eq!(provider.transports.len(), 2);
    }

    #[test]
    fn missing_host_is_a_configuration_error() {
        let account = Account::new("broken").with_extra("from", "a@b.c");
        let config = ProviderConfig::new(vec![account]);
        assert!(matches!(
            EmailProvider::new(&config),
            Err(SendError::Configuration(_))
        ));
    }

    #[test]
    fn no_enabled_accounts_fails() {
        let config = ProviderConfig::new(vec![smtp_account("off").disabled()]);
        assert!(EmailProvider::new(&config).is_err());
    }

    #[test]
    fn build_email_uses_account_default_from() {
        let msg = EmailMessage::builder()
            .to("dev@example.com")
            .subject("s")
            .text("t")
            .build();
        let email = build_email(&msg, &smtp_account("primary")).unwrap();
        let headers = format!("{:?}", email.headers());
        assert!(headers.contains("noreply@example.com"));
    }

    #[test]
    fn build_email_rejects_bad_addresses() {
        let msg = EmailMessage::builder()
            .from("not-an-address")
            .to("dev@example.com")
            .subject("s")
            .text("t")
            .build();
        assert!(matches!(
            build_email(&msg, &smtp_account("primary")),
            Err(SendError::InvalidParam(_))
        ));
    }

    #[test]
    fn build_email_with_both_bodies_and_attachment() {
        let msg = EmailMessage::builder()
            .from("ops@example.com")
            .to("dev@example.com")
            .subject("report")
            .text("see attached")
            .html("<p>see attached</p>")
            .attach(crate::EmailAttachment {
                filename: "data.csv".into(),
                mime: "text/csv".into(),
                data: b"a,b\n1,2\n".to_vec(),
            })
            .build();
        assert!(build_email(&msg, &smtp_account("primary")).is_ok());
    }

    #[tokio::test]
    async fn foreign_message_is_rejected() {
        use std::any::Any;

        struct Foreign;
        impl Message for Foreign {
            fn provider_type(&self) -> ProviderType {
                ProviderType::Email
            }
            fn msg_id(&self) -> &str {
                "x"
            }
            fn validate(&self) -> Result<(), SendError> {
                Ok(())
            }
            fn as_any(&self) -> &dyn Any {
                self
            }
        }

        let config = ProviderConfig::new(vec![smtp_account("primary")]);
        let provider = EmailProvider::new(&config).unwrap();
        let err = provider
            .send(&Foreign, &ProviderSendOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, SendError::InvalidParam(_)));
    }

    #[tokio::test]
    async fn unknown_account_hint_fails_before_dialing() {
        let config = ProviderConfig::new(vec![smtp_account("primary")]);
        let provider = EmailProvider::new(&config).unwrap();
        let options = ProviderSendOptions {
            account_name: Some("ghost".into()),
            ..Default::default()
        };
        let err = provider.send(&email(), &options).await.unwrap_err();
        assert!(matches!(err, SendError::AccountNotFound(_)));
    }
}
