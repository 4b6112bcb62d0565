use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use courier_core::{ProviderType, SendError};
use courier_provider::{BaseTransformer, RequestSpec, ResponseHandlerConfig};
use hmac::{Hmac, Mac};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use sha1::Sha1;

use crate::message::SmsMessage;

const API_URL: &str = "https://dysmsapi.aliyuncs.com/";
const API_VERSION: &str = "2017-05-25";
const DEFAULT_REGION: &str = "cn-hangzhou";

/// RFC3986 unreserved characters stay literal; everything else is encoded.
const RFC3986: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Percent-encode one component per Aliyun's POP canonicalisation rules.
fn pop_encode(value: &str) -> String {
    utf8_percent_encode(value, RFC3986).to_string()
}

/// Sort parameters and join them into the canonicalised query string.
fn canonicalize(params: &[(String, String)]) -> String {
    let mut sorted: Vec<&(String, String)> = params.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(&b.0));
    sorted
        .iter()
        .map(|(name, value)| format!("{}={}", pop_encode(name), pop_encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// `base64(HMAC-SHA1(secret + "&", "GET&%2F&" + encode(query)))`.
fn sign(secret: &str, canonical_query: &str) -> String {
    let string_to_sign = format!("GET&{}&{}", pop_encode("/"), pop_encode(canonical_query));
    let mut mac = Hmac::<Sha1>::new_from_slice(format!("{secret}&").as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(string_to_sign.as_bytes());
    BASE64.encode(mac.finalize().into_bytes())
}

/// Transformer shaping an [`SmsMessage`] into the signed `SendSms` GET.
pub fn transformer() -> BaseTransformer {
    BaseTransformer::new(
        ProviderType::Sms,
        Box::new(|msg, account| {
            let msg = msg.as_any().downcast_ref::<SmsMessage>().ok_or_else(|| {
                SendError::InvalidParam("aliyun transformer got a foreign message".into())
            })?;
            if account.api_key.is_empty() || account.api_secret.is_empty() {
                return Err(SendError::Configuration(format!(
                    "account '{}' is missing the access key pair",
                    account.name
                )));
            }

            let region = account
                .extra_str("region")
                .unwrap_or(DEFAULT_REGION)
                .to_owned();
            let timestamp = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string();
            let nonce = uuid::Uuid::new_v4().to_string();
            let template_param = serde_json::to_string(&msg.template_params)
                .map_err(|e| SendError::Serialization(e.to_string()))?;

            let mut params: Vec<(String, String)> = vec![
                ("AccessKeyId".into(), account.api_key.clone()),
                ("Action".into(), "SendSms".into()),
                ("Format".into(), "JSON".into()),
                ("PhoneNumbers".into(), msg.phones.join(",")),
                ("RegionId".into(), region),
                ("SignName".into(), msg.sign_name.clone()),
                ("SignatureMethod".into(), "HMAC-SHA1".into()),
                ("SignatureNonce".into(), nonce),
                ("SignatureVersion".into(), "1.0".into()),
                ("TemplateCode".into(), msg.template_code.clone()),
                ("TemplateParam".into(), template_param),
                ("Timestamp".into(), timestamp),
                ("Version".into(), API_VERSION.into()),
            ];
            if let Some(out_id) = &msg.out_id {
                params.push(("OutId".into(), out_id.clone()));
            }

            let signature = sign(&account.api_secret, &canonicalize(&params));
            params.push(("Signature".into(), signature));

            let mut spec = RequestSpec::get(API_URL);
            for (name, value) in params {
                spec = spec.with_query(name, value);
            }

            let handler = ResponseHandlerConfig::json("Code", vec!["OK".into()], "Message")
                .into_handler("sms.aliyun");
            Ok((spec, handler))
        }),
    )
    .with_sub_provider(crate::SUB_ALIYUN)
}
