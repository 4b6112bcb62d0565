use std::any::Any;

use courier_core::{Message, ProviderType, SendError, new_msg_id};

/// A file attached to an SMTP email.
#[derive(Debug, Clone)]
pub struct EmailAttachment {
    pub filename: String,
    pub mime: String,
    pub data: Vec<u8>,
}

/// An email delivered over SMTP.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    id: String,
    pub(crate) from: String,
    pub(crate) to: Vec<String>,
    pub(crate) cc: Vec<String>,
    pub(crate) bcc: Vec<String>,
    pub(crate) reply_to: Option<String>,
    pub(crate) subject: String,
    pub(crate) text: Option<String>,
    pub(crate) html: Option<String>,
    pub(crate) attachments: Vec<EmailAttachment>,
}

impl EmailMessage {
    /// Start building an email.
    pub fn builder() -> EmailMessageBuilder {
        EmailMessageBuilder::default()
    }
}

impl Message for EmailMessage {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Email
    }

    fn msg_id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<(), SendError> {
        if self.to.is_empty() {
            return Err(SendError::InvalidParam("email has no recipients".into()));
        }
        if self.to.iter().any(String::is_empty) {
            return Err(SendError::InvalidParam("email recipient is empty".into()));
        }
        if self.subject.is_empty() {
            return Err(SendError::InvalidParam("email subject is empty".into()));
        }
        if self.text.is_none() && self.html.is_none() {
            return Err(SendError::InvalidParam(
                "email needs a text or html body".into(),
            ));
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Fluent builder for [`EmailMessage`]. Builders never perform I/O; full
/// validation happens in [`Message::validate`].
#[derive(Default)]
pub struct EmailMessageBuilder {
    from: String,
    to: Vec<String>,
    cc: Vec<String>,
    bcc: Vec<String>,
    reply_to: Option<String>,
    subject: String,
    text: Option<String>,
    html: Option<String>,
    attachments: Vec<EmailAttachment>,
}

impl EmailMessageBuilder {
    /// Sender address; optional when the account configures a default.
    #[must_use]
    pub fn from(mut self, from: impl Into<String>) -> Self {
        self.from = from.into();
        self
    }

    /// Add a recipient.
    #[must_use]
    pub fn to(mut self, to: impl Into<String>) -> Self {
        self.to.push(to.into());
        self
    }

    /// Add a CC recipient.
    #[must_use]
    pub fn cc(mut self, cc: impl Into<String>) -> Self {
        self.cc.push(cc.into());
        self
    }

    /// Add a BCC recipient.
    #[must_use]
    pub fn bcc(mut self, bcc: impl Into<String>) -> Self {
        self.bcc.push(bcc.into());
        self
    }

    /// Set the reply-to address.
    #[must_use]
    pub fn reply_to(mut self, reply_to: impl Into<String>) -> Self {
        self.reply_to = Some(reply_to.into());
        self
    }

    /// Set the subject line.
    #[must_use]
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    /// Set the plain-text body.
    #[must_use]
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Set the HTML body.
    #[must_use]
    pub fn html(mut self, html: impl Into<String>) -> Self {
        self.html = Some(html.into());
        self
    }

    /// Attach a file.
    #[must_use]
    pub fn attach(mut self, attachment: EmailAttachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    /// Finish the message.
    pub fn build(self) -> EmailMessage {
        EmailMessage {
            id: new_msg_id(),
            from: self.from,
            to: self.to,
            cc: self.cc,
            bcc: self.bcc,
            reply_to: self.reply_to,
            subject: self.subject,
            text: self.text,
            html: self.html,
            attachments: self.attachments,
        }
    }
}
