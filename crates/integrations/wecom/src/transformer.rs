use courier_core::{ProviderType, SendError};
use courier_provider::{BaseTransformer, RequestSpec, ResponseHandlerConfig};
use serde_json::json;

use crate::message::{WecomContent, WecomMessage};

const WEBHOOK_URL: &str = "https://qyapi.weixin.qq.com/cgi-bin/webhook/send";

/// Transformer shaping a [`WecomMessage`] into the bot webhook call.
pub fn transformer() -> BaseTransformer {
    BaseTransformer::new(
        ProviderType::WecomBot,
        Box::new(|msg, account| {
            let msg = msg.as_any().downcast_ref::<WecomMessage>().ok_or_else(|| {
                SendError::InvalidParam("wecom transformer got a foreign message".into())
            })?;
            if account.api_key.is_empty() {
                return Err(SendError::Configuration(format!(
                    "account '{}' has no webhook key",
                    account.name
                )));
            }

            let body = match &msg.content {
                WecomContent::Text {
                    content,
                    mentioned_list,
                    mentioned_mobile_list,
                } => json!({
                    "msgtype": "text",
                    "text": {
                        "content": content,
                        "mentioned_list": mentioned_list,
                        "mentioned_mobile_list": mentioned_mobile_list,
                    },
                }),
                WecomContent::Markdown { content } => json!({
                    "msgtype": "markdown",
                    "markdown": { "content": content },
                }),
            };

            let spec = RequestSpec::post(WEBHOOK_URL)
                .with_query("key", account.api_key.clone())
                .with_json(&body)?;
            let handler = ResponseHandlerConfig::json("errcode", vec!["0".into()], "errmsg")
                .into_handler("wecombot");
            Ok((spec, handler))
        }),
    )
}

#[cfg(test)]
mod tests {
    use courier_core::Account;
    use courier_provider::{BodyType, Transformer};

    use super::*;

    fn account() -> Account {
        Account::new("bot").with_api_key("693a91f6-7xxx")
    }

    #[test]
    fn text_message_shape() {
        let msg = WecomMessage::text("disk usage 91%").mention("@all");
        let (spec, _) = transformer().transform(&msg, &account()).unwrap();

        assert_eq!(spec.url, WEBHOOK_URL);
        assert_eq!(spec.body_type, BodyType::Json);
        assert_eq!(
            spec.query,
            vec![("key".to_owned(), "693a91f6-7xxx".to_owned())]
        );

        let body: serde_json::Value = serde_json::from_slice(&spec.body).unwrap();
        assert_eq!(body["msgtype"], "text");
        assert_eq!(body["text"]["content"], "disk usage 91%");
        assert_eq!(body["text"]["mentioned_list"][0], "@all");
    }

    #[test]
    fn markdown_message_shape() {
        let msg = WecomMessage::markdown("**deploy** ok");
        let (spec, _) = transformer().transform(&msg, &account()).unwrap();
        let body: serde_json::Value = serde_json::from_slice(&spec.body).unwrap();
        assert_eq!(body["msgtype"], "markdown");
        assert_eq!(body["markdown"]["content"], "**deploy** ok");
    }

    #[test]
    fn missing_key_is_a_configuration_error() {
        let msg = WecomMessage::text("hello");
        let err = match transformer().transform(&msg, &Account::new("keyless")) {
            Ok(_) => panic!("expected an error"),
            Err(e) => e,
        };
        assert!(matches!(err, SendError::Configuration(_)));
    }

    #[test]
    fn classifier_reads_errcode() {
        let msg = WecomMessage::text("hello");
        let (_, handler) = transformer().transform(&msg, &account()).unwrap();

        assert!(handler(200, br#"{"errcode":0,"errmsg":"ok"}"#).is_ok());
        let err = handler(200, br#"{"errcode":93000,"errmsg":"invalid webhook url"}"#)
            .unwrap_err();
        match err {
            SendError::ProviderSend { code, message, .. } => {
                assert_eq!(code, "93000");
                assert_eq!(message, "invalid webhook url");
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
