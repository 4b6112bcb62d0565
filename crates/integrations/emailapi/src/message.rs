use std::any::Any;

use courier_core::{Message, ProviderType, SendError, new_msg_id};
use serde_json::Map;

/// A file attached to an API email, content pre-encoded as base64.
#[derive(Debug, Clone)]
pub struct EmailApiAttachment {
    pub filename: String,
    pub content_base64: String,
}

/// An email delivered through an HTTP email API.
///
/// The message pins its vendor (`resend` or `brevo`) at construction; the
/// matching transformer and matching accounts are resolved from that tag.
#[derive(Debug, Clone)]
pub struct EmailApiMessage {
    id: String,
    sub_provider: String,
    pub(crate) from: String,
    pub(crate) to: Vec<String>,
    pub(crate) cc: Vec<String>,
    pub(crate) bcc: Vec<String>,
    pub(crate) reply_to: Option<String>,
    pub(crate) subject: String,
    pub(crate) text: Option<String>,
    pub(crate) html: Option<String>,
    pub(crate) template_id: Option<i64>,
    pub(crate) params: Map<String, serde_json::Value>,
    pub(crate) attachments: Vec<EmailApiAttachment>,
}

impl EmailApiMessage {
    /// An email delivered through Resend.
    pub fn resend() -> Self {
        Self::for_vendor(crate::SUB_RESEND)
    }

    /// An email delivered through Brevo.
    pub fn brevo() -> Self {
        Self::for_vendor(crate::SUB_BREVO)
    }

    fn for_vendor(sub_provider: &str) -> Self {
        Self {
            id: new_msg_id(),
            sub_provider: sub_provider.to_owned(),
            from: String::new(),
            to: Vec::new(),
            cc: Vec::new(),
            bcc: Vec::new(),
            reply_to: None,
            subject: String::new(),
            text: None,
            html: None,
            template_id: None,
            params: Map::new(),
            attachments: Vec::new(),
        }
    }

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

    /// Use a vendor-side template instead of an inline body (Brevo).
    #[must_use]
    pub fn template(mut self, template_id: i64) -> Self {
        self.template_id = Some(template_id);
        self
    }

    /// Set a template substitution parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Attach a file (content already base64-encoded).
    #[must_use]
    pub fn attach(mut self, attachment: EmailApiAttachment) -> Self {
        self.attachments.push(attachment);
        self
    }
}

impl Message for EmailApiMessage {
    fn provider_type(&self) -> ProviderType {
        ProviderType::EmailApi
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
        if self.template_id.is_none() {
            if self.subject.is_empty() {
                return Err(SendError::InvalidParam("email subject is empty".into()));
            }
            if self.text.is_none() && self.html.is_none() {
                return Err(SendError::InvalidParam(
                    "email needs a text or html body (or a template)".into(),
                ));
            }
        }
        Ok(())
    }

    fn sub_provider(&self) -> Option<&str> {
        Some(&self.sub_provider)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
