use courier_core::{Message, ProviderType, SendError};
use courier_provider::{BaseTransformer, RequestSpec, ResponseHandlerConfig};
use serde_json::json;

use crate::message::EmailApiMessage;
use crate::{effective_from, resolve_account};

const API_URL: &str = "https://api.resend.com/emails";

/// Transformer shaping an [`EmailApiMessage`] into the Resend API call.
///
/// The message id doubles as the `Idempotency-Key`, so a retried delivery
/// cannot double-send.
pub fn transformer() -> BaseTransformer {
    BaseTransformer::new(
        ProviderType::EmailApi,
        Box::new(|msg, account| {
            let msg = msg
                .as_any()
                .downcast_ref::<EmailApiMessage>()
                .ok_or_else(|| {
                    SendError::InvalidParam("resend transformer got a foreign message".into())
                })?;
            if account.api_key.is_empty() {
                return Err(SendError::Configuration(format!(
                    "account '{}' has no API key",
                    account.name
                )));
            }

            let mut body = json!({
                "from": effective_from(&msg.from, account)?,
                "to": msg.to,
                "subject": msg.subject,
            });
            if !msg.cc.is_empty() {
                body["cc"] = json!(msg.cc);
            }
            if !msg.bcc.is_empty() {
                body["bcc"] = json!(msg.bcc);
            }
            if let Some(reply_to) = &msg.reply_to {
                body["reply_to"] = json!(reply_to);
            }
            if let Some(html) = &msg.html {
                body["html"] = json!(html);
            }
            if let Some(text) = &msg.text {
                body["text"] = json!(text);
            }
            if !msg.attachments.is_empty() {
                body["attachments"] = json!(
                    msg.attachments
                        .iter()
                        .map(|a| json!({"filename": a.filename, "content": a.content_base64}))
                        .collect::<Vec<_>>()
                );
            }

            let spec = RequestSpec::post(API_URL)
                .with_header("Authorization", format!("Bearer {}", account.api_key))
                .with_header("Idempotency-Key", msg.msg_id().to_owned())
                .with_json(&body)?;

            let handler =
                ResponseHandlerConfig::status_only().into_handler("emailapi.resend");
            Ok((spec, handler))
        }),
    )
    .with_sub_provider(crate::SUB_RESEND)
    .with_config_resolver(Box::new(resolve_account))
}

#[cfg(test)]
mod tests {
    use courier_core::{Account, Message};
    use courier_provider::{BodyType, Transformer};

    use super::*;
    use crate::EmailApiAttachment;

    fn account() -> Account {
        Account::new("resend-main")
            .with_sub_type("resend")
            .with_api_key("re_test_key")
            .with_extra("from", "noreply@example.com")
    }

    fn message() -> EmailApiMessage {
        EmailApiMessage::resend()
            .from("ops@example.com")
            .to("dev@example.com")
            .subject("deploy")
            .html("<p>done</p>")
    }

    #[test]
    fn request_shape() {
        let msg = message();
        let msg_id = msg.msg_id().to_owned();
        let (spec, _) = transformer().transform(&msg, &account()).unwrap();

        assert_eq!(spec.url, API_URL);
        assert_eq!(spec.body_type, BodyType::Json);
        assert!(
            spec.headers
                .contains(&("Authorization".into(), "Bearer re_test_key".into()))
        );
        assert!(spec.headers.contains(&("Idempotency-Key".into(), msg_id)));

        let body: serde_json::Value = serde_json::from_slice(&spec.body).unwrap();
        assert_eq!(body["from"], "ops@example.com");
        assert_eq!(body["to"][0], "dev@example.com");
        assert_eq!(body["html"], "<p>done</p>");
        assert!(body.get("cc").is_none());
    }

    #[test]
    fn account_default_from_fills_in() {
        let msg = EmailApiMessage::resend()
            .to("dev@example.com")
            .subject("s")
            .text("t");
        let (spec, _) = transformer().transform(&msg, &account()).unwrap();
        let body: serde_json::Value = serde_json::from_slice(&spec.body).unwrap();
        assert_eq!(body["from"], "noreply@example.com");
    }

    #[test]
    fn no_from_anywhere_fails() {
        let msg = EmailApiMessage::resend()
            .to("dev@example.com")
            .subject("s")
            .text("t");
        let account = Account::new("resend-bare")
            .with_sub_type("resend")
            .with_api_key("k");
        assert!(matches!(
            transformer().transform(&msg, &account),
            Err(SendError::InvalidParam(_))
        ));
    }

    #[test]
    fn attachments_serialize() {
        let msg = message().attach(EmailApiAttachment {
            filename: "report.pdf".into(),
            content_base64: "JVBERi0=".into(),
        });
        let (spec, _) = transformer().transform(&msg, &account()).unwrap();
        let body: serde_json::Value = serde_json::from_slice(&spec.body).unwrap();
        assert_eq!(body["attachments"][0]["filename"], "report.pdf");
        assert_eq!(body["attachments"][0]["content"], "JVBERi0=");
    }

    #[test]
    fn mismatched_account_sub_type_is_rejected() {
        let brevo_account = Account::new("brevo-main")
            .with_sub_type("brevo")
            .with_api_key("k")
            .with_extra("from", "noreply@example.com");
        assert!(matches!(
            transformer().transform(&message(), &brevo_account),
            Err(SendError::Configuration(_))
        ));
    }

    #[test]
    fn matches_only_resend_messages() {
        let t = transformer();
        assert!(t.can_transform(&message()));
        assert!(!t.can_transform(&EmailApiMessage::brevo().to("x@example.com")));
    }

    #[test]
    fn non_2xx_is_classified_by_status() {
        let (_, handler) = transformer().transform(&message(), &account()).unwrap();
        assert!(handler(200, br#"{"id":"49a!"}"#).is_ok());
        let err = handler(422, br#"{"message":"from not verified"}"#).unwrap_err();
        assert!(!err.is_retryable());
        assert!(matches!(err, SendError::ProviderSend { .. }));
    }
}
