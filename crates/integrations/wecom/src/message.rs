use std::any::Any;

use courier_core::{Message, ProviderType, SendError, new_msg_id};

/// WeCom bot message content limit (bytes of UTF-8), per the bot API.
const MAX_CONTENT_BYTES: usize = 4096;

/// The `msgtype` variants the bot accepts.
#[derive(Debug, Clone)]
pub enum WecomContent {
    /// Plain text with optional member mentions.
    Text {
        content: String,
        /// Userids to @-mention; `"@all"` mentions everyone.
        mentioned_list: Vec<String>,
        /// Mobile numbers to @-mention.
        mentioned_mobile_list: Vec<String>,
    },
    /// Markdown content.
    Markdown { content: String },
}

impl WecomContent {
    fn content(&self) -> &str {
        match self {
            Self::Text { content, .. } | Self::Markdown { content } => content,
        }
    }
}

/// A message for a WeCom group bot.
#[derive(Debug, Clone)]
pub struct WecomMessage {
    id: String,
    pub(crate) content: WecomContent,
}

impl WecomMessage {
    /// A plain-text message.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            id: new_msg_id(),
            content: WecomContent::Text {
                content: content.into(),
                mentioned_list: Vec::new(),
                mentioned_mobile_list: Vec::new(),
            },
        }
    }

    /// A markdown message.
    pub fn markdown(content: impl Into<String>) -> Self {
        Self {
            id: new_msg_id(),
            content: WecomContent::Markdown {
                content: content.into(),
            },
        }
    }

    /// @-mention a member by userid (text messages only).
    #[must_use]
    pub fn mention(mut self, userid: impl Into<String>) -> Self {
        if let WecomContent::Text { mentioned_list, .. } = &mut self.content {
            mentioned_list.push(userid.into());
        }
        self
    }

    /// @-mention a member by mobile number (text messages only).
    #[must_use]
    pub fn mention_mobile(mut self, mobile: impl Into<String>) -> Self {
        if let WecomContent::Text {
            mentioned_mobile_list,
            ..
        } = &mut self.content
        {
            mentioned_mobile_list.push(mobile.into());
        }
        self
    }
}

impl Message for WecomMessage {
    fn provider_type(&self) -> ProviderType {
        ProviderType::WecomBot
    }

    fn msg_id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<(), SendError> {
        let content = self.content.content();
        if content.is_empty() {
            return Err(SendError::InvalidParam("wecom content is empty".into()));
        }
        if content.len() > MAX_CONTENT_BYTES {
            return Err(SendError::InvalidParam(format!(
                "wecom content exceeds {MAX_CONTENT_BYTES} bytes"
            )));
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_message_validates() {
        let msg = WecomMessage::text("deploy finished").mention("ops-lead");
        assert!(msg.validate().is_ok());
        assert_eq!(msg.provider_type(), ProviderType::WecomBot);
    }

    #[test]
    fn empty_content_fails() {
        assert!(WecomMessage::text("").validate().is_err());
        assert!(WecomMessage::markdown("").validate().is_err());
    }

    #[test]
    fn oversized_content_fails() {
        let msg = WecomMessage::text("x".repeat(MAX_CONTENT_BYTES + 1));
        assert!(msg.validate().is_err());
    }

    #[test]
    fn mentions_ignored_on_markdown() {
        let msg = WecomMessage::markdown("**done**").mention("nobody");
        match msg.content {
            WecomContent::Markdown { .. } => {}
            WecomContent::Text { .. } => panic!("markdown should stay markdown"),
        }
    }
}
