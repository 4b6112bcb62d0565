use courier_core::{ProviderType, SendError};
use courier_provider::{BaseTransformer, RequestSpec, ResponseHandlerConfig};
use serde_json::json;

use crate::message::EmailApiMessage;
use crate::{effective_from, resolve_account};

const API_URL: &str = "https://api.brevo.com/v3/smtp/email";

fn address_list(addresses: &[String]) -> serde_json::Value {
    json!(
        addresses
            .iter()
            .map(|email| json!({ "email": email }))
            .collect::<Vec<_>>()
    )
}

/// Transformer shaping an [`EmailApiMessage`] into the Brevo API call.
pub fn transformer() -> BaseTransformer {
    BaseTransformer::new(
        ProviderType::EmailApi,
        Box::new(|msg, account| {
            let msg = msg
                .as_any()
                .downcast_ref::<EmailApiMessage>()
                .ok_or_else(|| {
                    SendError::InvalidParam("brevo transformer got a foreign message".into())
                })?;
            if account.api_key.is_empty() {
                return Err(SendError::Configuration(format!(
                    "account '{}' has no API key",
                    account.name
                )));
            }

            let mut body = json!({
                "sender": { "email": effective_from(&msg.from, account)? },
                "to": address_list(&msg.to),
            });
            if !msg.subject.is_empty() {
                body["subject"] = json!(msg.subject);
            }
            if !msg.cc.is_empty() {
                body["cc"] = address_list(&msg.cc);
            }
            if !msg.bcc.is_empty() {
                body["bcc"] = address_list(&msg.bcc);
            }
            if let Some(reply_to) = &msg.reply_to {
                body["replyTo"] = json!({ "email": reply_to });
            }
            if let Some(html) = &msg.html {
                body["htmlContent"] = json!(html);
            }
            if let Some(text) = &msg.text {
                body["textContent"] = json!(text);
            }
            if let Some(template_id) = msg.template_id {
                body["templateId"] = json!(template_id);
            }
            if !msg.params.is_empty() {
                body["params"] = json!(msg.params);
            }
            if !msg.attachments.is_empty() {
                body["attachment"] = json!(
                    msg.attachments
                        .iter()
                        .map(|a| json!({"name": a.filename, "content": a.content_base64}))
                        .collect::<Vec<_>>()
                );
            }

            let spec = RequestSpec::post(API_URL)
                .with_header("api-key", account.api_key.clone())
                .with_header("Accept", "application/json")
                .with_json(&body)?;

            let handler = ResponseHandlerConfig::status_only().into_handler("emailapi.brevo");
            Ok((spec, handler))
        }),
    )
    .with_sub_provider(crate::SUB_BREVO)
    .with_config_resolver(Box::new(resolve_account))
}

#[cfg(test)]
mod tests {
    use courier_core::Account;
    use courier_provider::Transformer;

    use super::*;

    fn account() -> Account {
        Account::new("brevo-main")
            .with_sub_type("brevo")
            .with_api_key("xkeysib-test")
            .with_extra("from", "noreply@example.com")
    }

    #[test]
    fn inline_body_shape() {
        let msg = EmailApiMessage::brevo()
            .from("ops@example.com")
            .to("dev@example.com")
            .cc("lead@example.com")
            .subject("weekly digest")
            .html("<h1>stats</h1>")
            .text("stats");
        let (spec, _) = transformer().transform(&msg, &account()).unwrap();

        assert_eq!(spec.url, API_URL);
        assert!(
            spec.headers
                .contains(&("api-key".into(), "xkeysib-test".into()))
        );

        let body: serde_json::Value = serde_json::from_slice(&spec.body).unwrap();
        assert_eq!(body["sender"]["email"], "ops@example.com");
        assert_eq!(body["to"][0]["email"], "dev@example.com");
        assert_eq!(body["cc"][0]["email"], "lead@example.com");
        assert_eq!(body["htmlContent"], "<h1>stats</h1>");
        assert_eq!(body["textContent"], "stats");
    }

    #[test]
    fn template_shape() {
        let msg = EmailApiMessage::brevo()
            .to("dev@example.com")
            .template(12)
            .param("name", "Ada")
            .param("count", 3);
        let (spec, _) = transformer().transform(&msg, &account()).unwrap();
        let body: serde_json::Value = serde_json::from_slice(&spec.body).unwrap();

        assert_eq!(body["templateId"], 12);
        assert_eq!(body["params"]["name"], "Ada");
        assert_eq!(body["params"]["count"], 3);
        assert!(body.get("htmlContent").is_none());
        assert!(body.get("subject").is_none());
    }

    #[test]
    fn classifier_accepts_created() {
        let msg = EmailApiMessage::brevo()
            .to("dev@example.com")
            .template(1);
        let (_, handler) = transformer().transform(&msg, &account()).unwrap();
        assert!(handler(201, br#"{"messageId":"<202601@smtp-relay>"}"#).is_ok());
        assert!(handler(400, br#"{"code":"invalid_parameter"}"#).is_err());
    }

    #[test]
    fn matches_only_brevo_messages() {
        let t = transformer();
        assert!(t.can_transform(&EmailApiMessage::brevo().to("x@example.com")));
        assert!(!t.can_transform(&EmailApiMessage::resend().to("x@example.com")));
    }
}
