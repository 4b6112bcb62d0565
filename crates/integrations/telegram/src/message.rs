use std::any::Any;

use bytes::Bytes;
use courier_core::{Message, ProviderType, SendError, new_msg_id};
use serde::Serialize;

/// Text formatting mode for message bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TelegramParseMode {
    MarkdownV2,
    #[serde(rename = "HTML")]
    Html,
}

/// What the bot sends.
#[derive(Debug, Clone)]
pub enum TelegramContent {
    /// `sendMessage` with a text body.
    Text { text: String },
    /// `sendPhoto` with a photo the Bot API fetches itself.
    PhotoUrl { url: String, caption: Option<String> },
    /// `sendPhoto` uploading the bytes as multipart.
    PhotoUpload {
        data: Bytes,
        filename: String,
        caption: Option<String>,
    },
}

/// A message for a Telegram chat.
#[derive(Debug, Clone)]
pub struct TelegramMessage {
    id: String,
    pub(crate) chat_id: String,
    pub(crate) content: TelegramContent,
    pub(crate) parse_mode: Option<TelegramParseMode>,
    pub(crate) disable_notification: bool,
}

impl TelegramMessage {
    /// A text message for the given chat.
    pub fn text(chat_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: new_msg_id(),
            chat_id: chat_id.into(),
            content: TelegramContent::Text { text: text.into() },
            parse_mode: None,
            disable_notification: false,
        }
    }

    /// A photo message the Bot API fetches from a URL.
    pub fn photo_url(chat_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: new_msg_id(),
            chat_id: chat_id.into(),
            content: TelegramContent::PhotoUrl {
                url: url.into(),
                caption: None,
            },
            parse_mode: None,
            disable_notification: false,
        }
    }

    /// A photo message uploading raw bytes.
    pub fn photo_upload(
        chat_id: impl Into<String>,
        data: Bytes,
        filename: impl Into<String>,
    ) -> Self {
        Self {
            id: new_msg_id(),
            chat_id: chat_id.into(),
            content: TelegramContent::PhotoUpload {
                data,
                filename: filename.into(),
                caption: None,
            },
            parse_mode: None,
            disable_notification: false,
        }
    }

    /// Caption for photo messages (ignored on text).
    #[must_use]
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        match &mut self.content {
            TelegramContent::PhotoUrl { caption: c, .. }
            | TelegramContent::PhotoUpload { caption: c, .. } => *c = Some(caption.into()),
            TelegramContent::Text { .. } => {}
        }
        self
    }

    /// Set the text formatting mode.
    #[must_use]
    pub fn with_parse_mode(mut self, mode: TelegramParseMode) -> Self {
        self.parse_mode = Some(mode);
        self
    }

    /// Deliver silently.
    #[must_use]
    pub fn silent(mut self) -> Self {
        self.disable_notification = true;
        self
    }
}

impl Message for TelegramMessage {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Telegram
    }

    fn msg_id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<(), SendError> {
        if self.chat_id.is_empty() {
            return Err(SendError::InvalidParam("telegram chat_id is empty".into()));
        }
        match &self.content {
            TelegramContent::Text { text } if text.is_empty() => {
                Err(SendError::InvalidParam("telegram text is empty".into()))
            }
            TelegramContent::PhotoUrl { url, .. } if url.is_empty() => {
                Err(SendError::InvalidParam("telegram photo URL is empty".into()))
            }
            TelegramContent::PhotoUpload { data, .. } if data.is_empty() => {
                Err(SendError::InvalidParam("telegram photo upload is empty".into()))
            }
            _ => Ok(()),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
