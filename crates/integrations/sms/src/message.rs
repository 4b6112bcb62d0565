use std::any::Any;

use courier_core::{Message, ProviderType, SendError, new_msg_id};
use serde_json::Map;

/// A templated SMS for one or more recipients.
///
/// Aliyun delivers by template: the gateway substitutes `template_params`
/// into the registered template identified by `template_code`, under the
/// approved signature `sign_name`.
#[derive(Debug, Clone)]
pub struct SmsMessage {
    id: String,
    pub(crate) phones: Vec<String>,
    pub(crate) sign_name: String,
    pub(crate) template_code: String,
    pub(crate) template_params: Map<String, serde_json::Value>,
    pub(crate) out_id: Option<String>,
}

impl SmsMessage {
    /// Start building an SMS under the given signature and template.
    pub fn new(sign_name: impl Into<String>, template_code: impl Into<String>) -> Self {
        Self {
            id: new_msg_id(),
            phones: Vec::new(),
            sign_name: sign_name.into(),
            template_code: template_code.into(),
            template_params: Map::new(),
            out_id: None,
        }
    }

    /// Add a recipient phone number.
    #[must_use]
    pub fn to(mut self, phone: impl Into<String>) -> Self {
        self.phones.push(phone.into());
        self
    }

    /// Set a template substitution parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.template_params.insert(key.into(), value.into());
        self
    }

    /// External correlation id echoed back in delivery reports.
    #[must_use]
    pub fn with_out_id(mut self, out_id: impl Into<String>) -> Self {
        self.out_id = Some(out_id.into());
        self
    }
}

impl Message for SmsMessage {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Sms
    }

    fn msg_id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<(), SendError> {
        if self.phones.is_empty() {
            return Err(SendError::InvalidParam("sms has no recipients".into()));
        }
        if self.phones.iter().any(String::is_empty) {
            return Err(SendError::InvalidParam("sms recipient is empty".into()));
        }
        if self.sign_name.is_empty() {
            return Err(SendError::InvalidParam("sms sign_name is empty".into()));
        }
        if self.template_code.is_empty() {
            return Err(SendError::InvalidParam("sms template_code is empty".into()));
        }
        Ok(())
    }

    fn sub_provider(&self) -> Option<&str> {
        Some(crate::SUB_ALIYUN)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_message_validates() {
        let msg = SmsMessage::new("Acme", "SMS_001")
            .to("+8613800000000")
            .param("code", "431287");
        assert!(msg.validate().is_ok());
        assert_eq!(msg.provider_type(), ProviderType::Sms);
        assert_eq!(msg.sub_provider(), Some("aliyun"));
    }

    #[test]
    fn missing_fields_fail() {
        assert!(SmsMessage::new("Acme", "SMS_001").validate().is_err());
        assert!(
            SmsMessage::new("", "SMS_001")
                .to("+86138")
                .validate()
                .is_err()
        );
        assert!(SmsMessage::new("Acme", "").to("+86138").validate().is_err());
        assert!(
            SmsMessage::new("Acme", "SMS_001")
                .to("")
                .validate()
                .is_err()
        );
    }

    #[test]
    fn params_accumulate() {
        let msg = SmsMessage::new("Acme", "SMS_001")
            .to("+86138")
            .param("code", "1234")
            .param("minutes", 5);
        assert_eq!(msg.template_params.len(), 2);
    }
}
