use std::any::Any;

use courier_core::{Message, ProviderType, SendError, new_msg_id};

/// The `msgtype` variants the bot accepts.
#[derive(Debug, Clone)]
pub enum DingtalkContent {
    /// Plain text.
    Text { content: String },
    /// Markdown with a required title (shown in the conversation list).
    Markdown { title: String, text: String },
}

/// A message for a DingTalk group bot.
#[derive(Debug, Clone)]
pub struct DingtalkMessage {
    id: String,
    pub(crate) content: DingtalkContent,
    pub(crate) at_mobiles: Vec<String>,
    pub(crate) at_all: bool,
}

impl DingtalkMessage {
    /// A plain-text message.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            id: new_msg_id(),
            content: DingtalkContent::Text {
                content: content.into(),
            },
            at_mobiles: Vec::new(),
            at_all: false,
        }
    }

    /// A markdown message.
    pub fn markdown(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: new_msg_id(),
            content: DingtalkContent::Markdown {
                title: title.into(),
                text: text.into(),
            },
            at_mobiles: Vec::new(),
            at_all: false,
        }
    }

    /// @-mention a member by mobile number.
    #[must_use]
    pub fn at_mobile(mut self, mobile: impl Into<String>) -> Self {
        self.at_mobiles.push(mobile.into());
        self
    }

    /// @-mention everyone.
    #[must_use]
    pub fn at_all(mut self) -> Self {
        self.at_all = true;
        self
    }
}

impl Message for DingtalkMessage {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Dingtalk
    }

    fn msg_id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<(), SendError> {
        match &self.content {
            DingtalkContent::Text { content } if content.is_empty() => {
                Err(SendError::InvalidParam("dingtalk content is empty".into()))
            }
            DingtalkContent::Markdown { title, text } if title.is_empty() || text.is_empty() => {
                Err(SendError::InvalidParam(
                    "dingtalk markdown needs a title and text".into(),
                ))
            }
            _ => Ok(()),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
