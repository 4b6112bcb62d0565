use std::sync::Arc;

use courier_core::SendError;
use serde_json::Value;

/// How to decode the vendor response body before checking it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseBodyType {
    #[default]
    Json,
    Text,
}

/// Pure function deciding whether a vendor response denotes success.
pub type ResponseHandler = Arc<dyn Fn(u16, &[u8]) -> Result<(), SendError> + Send + Sync>;

/// Declarative recipe for a [`ResponseHandler`].
///
/// The classification rule: the HTTP status must be 2xx; when
/// `check_body` is set the body is decoded per `body_type` and the value at
/// `code_path` must equal one of `success_values` (string equality on the
/// normalised form). Any mismatch yields a structured error carrying the
/// vendor code and the text found at `message_path`.
#[derive(Debug, Clone, Default)]
pub struct ResponseHandlerConfig {
    /// Body decoding hint.
    pub body_type: ResponseBodyType,

    /// Whether a 2xx status alone is sufficient.
    pub check_body: bool,

    /// Substring that must appear in a text body for success. Implies a
    /// body check for text responses.
    pub success_pattern: Option<String>,

    /// Dotted key plucking the business code out of a JSON body.
    pub code_path: String,

    /// Accepted code literals.
    pub success_values: Vec<String>,

    /// Dotted key for the human-readable vendor error text.
    pub message_path: String,
}

impl ResponseHandlerConfig {
    /// Status-only classification: any 2xx is success.
    pub fn status_only() -> Self {
        Self::default()
    }

    /// JSON business-code classification.
    pub fn json(
        code_path: impl Into<String>,
        success_values: Vec<String>,
        message_path: impl Into<String>,
    ) -> Self {
        Self {
            body_type: ResponseBodyType::Json,
            check_body: true,
            success_pattern: None,
            code_path: code_path.into(),
            success_values,
            message_path: message_path.into(),
        }
    }

    /// Text-substring classification.
    pub fn text_pattern(pattern: impl Into<String>) -> Self {
        Self {
            body_type: ResponseBodyType::Text,
            check_body: true,
            success_pattern: Some(pattern.into()),
            ..Self::default()
        }
    }

    /// Build the classifier closure. `provider` is the context tag carried
    /// by produced errors (`provider` or `provider.subprovider`).
    pub fn into_handler(self, provider: impl Into<String>) -> ResponseHandler {
        let provider = provider.into();
        Arc::new(move |status, body| classify(&provider, &self, status, body))
    }
}

/// Map a non-2xx HTTP status to the error taxonomy: 429 is a rate limit,
/// remaining 4xx are permanent, 5xx are transient.
pub fn status_error(provider: &str, status: u16, body: &[u8]) -> SendError {
    if status == 429 {
        return SendError::RateLimited;
    }
    SendError::ProviderSend {
        provider: provider.to_owned(),
        code: status.to_string(),
        message: String::from_utf8_lossy(body)
            .chars()
            .take(200)
            .collect(),
        retryable: status >= 500,
    }
}

fn classify(
    provider: &str,
    config: &ResponseHandlerConfig,
    status: u16,
    body: &[u8],
) -> Result<(), SendError> {
    if !(200..300).contains(&status) {
        return Err(status_error(provider, status, body));
    }

    if !config.check_body && config.success_pattern.is_none() {
        return Ok(());
    }

    match config.body_type {
        ResponseBodyType::Text => {
            let text = String::from_utf8_lossy(body);
            match &config.success_pattern {
                Some(pattern) if !text.contains(pattern.as_str()) => {
                    Err(SendError::ProviderSend {
                        provider: provider.to_owned(),
                        code: "pattern_mismatch".to_owned(),
                        message: text.chars().take(200).collect(),
                        retryable: false,
                    })
                }
                _ => Ok(()),
            }
        }
        ResponseBodyType::Json => {
            let value: Value = serde_json::from_slice(body).map_err(|e| {
                SendError::Serialization(format!("[{provider}] undecodable response: {e}"))
            })?;

            let code = pluck(&value, &config.code_path)
                .map(normalise)
                .unwrap_or_default();
            if config.success_values.iter().any(|v| v == &code) {
                return Ok(());
            }

            let message = pluck(&value, &config.message_path)
                .map(normalise)
                .unwrap_or_else(|| "unknown vendor error".to_owned());
            Err(SendError::ProviderSend {
                provider: provider.to_owned(),
                code,
                message,
                retryable: false,
            })
        }
    }
}

/// Walk a dotted key path into a JSON value.
fn pluck<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return None;
    }
    let mut current = value;
    for key in path.split('.') {
        current = current.get(key)?;
    }
    Some(current)
}

/// Normalise a plucked JSON scalar to its string form for comparison.
fn normalise(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}
