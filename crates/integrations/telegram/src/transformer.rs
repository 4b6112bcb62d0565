use courier_core::{ProviderType, SendError};
use courier_provider::{BaseTransformer, RequestSpec, ResponseHandlerConfig};
use serde_json::json;

use crate::message::{TelegramContent, TelegramMessage, TelegramParseMode};

const API_BASE: &str = "https://api.telegram.org";

fn method_url(token: &str, method: &str) -> String {
    format!("{API_BASE}/bot{token}/{method}")
}

fn parse_mode_str(mode: TelegramParseMode) -> &'static str {
    match mode {
        TelegramParseMode::MarkdownV2 => "MarkdownV2",
        TelegramParseMode::Html => "HTML",
    }
}

/// Transformer shaping a [`TelegramMessage`] into a Bot API call.
pub fn transformer() -> BaseTransformer {
    BaseTransformer::new(
        ProviderType::Telegram,
        Box::new(|msg, account| {
            let msg = msg
                .as_any()
                .downcast_ref::<TelegramMessage>()
                .ok_or_else(|| {
                    SendError::InvalidParam("telegram transformer got a foreign message".into())
                })?;
            if account.api_key.is_empty() {
                return Err(SendError::Configuration(format!(
                    "account '{}' has no bot token",
                    account.name
                )));
            }

            let spec = match &msg.content {
                TelegramContent::Text { text } => {
                    let mut body = json!({
                        "chat_id": msg.chat_id,
                        "text": text,
                        "disable_notification": msg.disable_notification,
                    });
                    if let Some(mode) = msg.parse_mode {
                        body["parse_mode"] = json!(parse_mode_str(mode));
                    }
                    RequestSpec::post(method_url(&account.api_key, "sendMessage"))
                        .with_json(&body)?
                }
                TelegramContent::PhotoUrl { url, caption } => {
                    let mut body = json!({
                        "chat_id": msg.chat_id,
                        "photo": url,
                        "disable_notification": msg.disable_notification,
                    });
                    if let Some(caption) = caption {
                        body["caption"] = json!(caption);
                    }
                    RequestSpec::post(method_url(&account.api_key, "sendPhoto"))
                        .with_json(&body)?
                }
                TelegramContent::PhotoUpload {
                    data,
                    filename,
                    caption,
                } => {
                    let mut spec = RequestSpec::post(method_url(&account.api_key, "sendPhoto"))
                        .with_part_text("chat_id", msg.chat_id.clone())
                        .with_part_bytes("photo", data.clone(), filename.clone(), "image/png");
                    if let Some(caption) = caption {
                        spec = spec.with_part_text("caption", caption.clone());
                    }
                    if msg.disable_notification {
                        spec = spec.with_part_text("disable_notification", "true");
                    }
                    spec
                }
            };

            let handler = ResponseHandlerConfig::json("ok", vec!["true".into()], "description")
                .into_handler("telegram");
            Ok((spec, handler))
        }),
    )
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use courier_core::Account;
    use courier_provider::{BodyType, PartData, Transformer};

    use super::*;

    fn account() -> Account {
        Account::new("bot").with_api_key("123:ABC")
    }

    #[test]
    fn text_message_hits_send_message() {
        let msg = TelegramMessage::text("-100500", "pipeline green")
            .with_parse_mode(TelegramParseMode::Html);
        let (spec, _) = transformer().transform(&msg, &account()).unwrap();

        assert_eq!(spec.url, "https://api.telegram.org/bot123:ABC/sendMessage");
        assert_eq!(spec.body_type, BodyType::Json);
        let body: serde_json::Value = serde_json::from_slice(&spec.body).unwrap();
        assert_eq!(body["chat_id"], "-100500");
        assert_eq!(body["text"], "pipeline green");
        assert_eq!(body["parse_mode"], "HTML");
    }

    #[test]
    fn photo_url_hits_send_photo_as_json() {
        let msg = TelegramMessage::photo_url("42", "https://img.example.com/graph.png")
            .with_caption("p99 latency");
        let (spec, _) = transformer().transform(&msg, &account()).unwrap();

        assert_eq!(spec.url, "https://api.telegram.org/bot123:ABC/sendPhoto");
        let body: serde_json::Value = serde_json::from_slice(&spec.body).unwrap();
        assert_eq!(body["photo"], "https://img.example.com/graph.png");
        assert_eq!(body["caption"], "p99 latency");
    }

    #[test]
    fn photo_upload_is_multipart() {
        let msg = TelegramMessage::photo_upload("42", Bytes::from_static(b"png-bytes"), "g.png")
            .with_caption("chart");
        let (spec, _) = transformer().transform(&msg, &account()).unwrap();

        assert_eq!(spec.body_type, BodyType::Multipart);
        let names: Vec<&str> = spec.parts.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["chat_id", "photo", "caption"]);
        match &spec.parts[1].data {
            PartData::Bytes { data, filename, .. } => {
                assert_eq!(data.as_ref(), b"png-bytes");
                assert_eq!(filename, "g.png");
            }
            PartData::Text(_) => panic!("photo part must be bytes"),
        }
    }

    #[test]
    fn classifier_reads_ok_flag() {
        let msg = TelegramMessage::text("42", "hi");
        let (_, handler) = transformer().transform(&msg, &account()).unwrap();

        assert!(handler(200, br#"{"ok":true,"result":{"message_id":7}}"#).is_ok());
        let err = handler(
            200,
            br#"{"ok":false,"error_code":400,"description":"chat not found"}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("chat not found"));
    }

    #[test]
    fn missing_token_is_a_configuration_error() {
        let msg = TelegramMessage::text("42", "hi");
        let err = match transformer().transform(&msg, &Account::new("tokenless")) {
            Ok(_) => panic!("expected an error"),
            Err(e) => e,
        };
        assert!(matches!(err, SendError::Configuration(_)));
    }
}
