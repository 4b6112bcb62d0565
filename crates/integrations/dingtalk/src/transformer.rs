use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use courier_core::{ProviderType, SendError};
use courier_provider::{BaseTransformer, RequestSpec, ResponseHandlerConfig};
use hmac::{Hmac, Mac};
use serde_json::json;
use sha2::Sha256;

use crate::message::{DingtalkContent, DingtalkMessage};

const WEBHOOK_URL: &str = "https://oapi.dingtalk.com/robot/send";

/// Compute the bot signature for one timestamp:
/// `base64(HMAC-SHA256(secret, "<timestamp>\n<secret>"))`.
///
/// Returned raw; the query serializer URL-encodes it exactly once.
fn sign(secret: &str, timestamp_ms: i64) -> String {
    let string_to_sign = format!("{timestamp_ms}\n{secret}");
    let mut mac = Hmac::<Sha256>::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(string_to_sign.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

/// Transformer shaping a [`DingtalkMessage`] into the (optionally signed)
/// bot webhook call.
pub fn transformer() -> BaseTransformer {
    BaseTransformer::new(
        ProviderType::Dingtalk,
        Box::new(|msg, account| {
            let msg = msg
                .as_any()
                .downcast_ref::<DingtalkMessage>()
                .ok_or_else(|| {
                    SendError::InvalidParam("dingtalk transformer got a foreign message".into())
                })?;
            if account.api_key.is_empty() {
                return Err(SendError::Configuration(format!(
                    "account '{}' has no access token",
                    account.name
                )));
            }

            let body = match &msg.content {
                DingtalkContent::Text { content } => json!({
                    "msgtype": "text",
                    "text": { "content": content },
                    "at": { "atMobiles": msg.at_mobiles, "isAtAll": msg.at_all },
                }),
                DingtalkContent::Markdown { title, text } => json!({
                    "msgtype": "markdown",
                    "markdown": { "title": title, "text": text },
                    "at": { "atMobiles": msg.at_mobiles, "isAtAll": msg.at_all },
                }),
            };

            let mut spec = RequestSpec::post(WEBHOOK_URL)
                .with_query("access_token", account.api_key.clone());
            if !account.api_secret.is_empty() {
                let timestamp = chrono::Utc::now().timestamp_millis();
                spec = spec
                    .with_query("timestamp", timestamp.to_string())
                    .with_query("sign", sign(&account.api_secret, timestamp));
            }
            let spec = spec.with_json(&body)?;

            let handler = ResponseHandlerConfig::json("errcode", vec!["0".into()], "errmsg")
                .into_handler("dingtalk");
            Ok((spec, handler))
        }),
    )
}

#[cfg(test)]
mod tests {
    use courier_core::Account;
    use courier_provider::Transformer;

    use super::*;

    fn account() -> Account {
        Account::new("bot").with_api_key("token-abc")
    }

    #[test]
    fn unsigned_request_carries_only_the_token() {
        let msg = DingtalkMessage::text("hello");
        let (spec, _) = transformer().transform(&msg, &account()).unwrap();

        assert_eq!(spec.url, WEBHOOK_URL);
        assert_eq!(
            spec.query,
            vec![("access_token".to_owned(), "token-abc".to_owned())]
        );
    }

    #[test]
    fn secret_adds_timestamp_and_signature() {
        let msg = DingtalkMessage::text("hello");
        let account = account().with_api_secret("SEC000");
        let (spec, _) = transformer().transform(&msg, &account).unwrap();

        let names: Vec<&str> = spec.query.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["access_token", "timestamp", "sign"]);
        // HMAC-SHA256 digests are 32 bytes: 44 chars of standard base64.
        assert_eq!(spec.query[2].1.len(), 44);
    }

    #[test]
    fn signature_is_deterministic_per_timestamp() {
        assert_eq!(sign("secret", 1_700_000_000_000), sign("secret", 1_700_000_000_000));
        assert_ne!(sign("secret", 1_700_000_000_000), sign("secret", 1_700_000_000_001));
        assert_ne!(sign("secret", 1_700_000_000_000), sign("other", 1_700_000_000_000));
    }

    #[test]
    fn text_body_shape() {
        let msg = DingtalkMessage::text("on-call ping").at_mobile("13800000001");
        let (spec, _) = transformer().transform(&msg, &account()).unwrap();
        let body: serde_json::Value = serde_json::from_slice(&spec.body).unwrap();
        assert_eq!(body["msgtype"], "text");
        assert_eq!(body["text"]["content"], "on-call ping");
        assert_eq!(body["at"]["atMobiles"][0], "13800000001");
        assert_eq!(body["at"]["isAtAll"], false);
    }

    #[test]
    fn markdown_body_shape() {
        let msg = DingtalkMessage::markdown("Release", "## v1.2 shipped");
        let (spec, _) = transformer().transform(&msg, &account()).unwrap();
        let body: serde_json::Value = serde_json::from_slice(&spec.body).unwrap();
        assert_eq!(body["msgtype"], "markdown");
        assert_eq!(body["markdown"]["title"], "Release");
    }

    #[test]
    fn classifier_reads_errcode() {
        let msg = DingtalkMessage::text("hello");
        let (_, handler) = transformer().transform(&msg, &account()).unwrap();
        assert!(handler(200, br#"{"errcode":0,"errmsg":"ok"}"#).is_ok());
        assert!(
            handler(200, br#"{"errcode":310000,"errmsg":"sign not match"}"#).is_err()
        );
    }

    #[test]
    fn missing_token_is_a_configuration_error() {
        let msg = DingtalkMessage::text("hello");
        let err = match transformer().transform(&msg, &Account::new("tokenless")) {
            Ok(_) => panic!("expected an error"),
            Err(e) => e,
        };
        assert!(matches!(err, SendError::Configuration(_)));
    }
}
