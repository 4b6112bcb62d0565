use std::any::Any;

use bytes::Bytes;
use courier_core::{Message, ProviderType, SendError, new_msg_id};
use courier_provider::ResponseHandlerConfig;

/// A fully caller-specified HTTP request.
pub struct WebhookMessage {
    id: String,
    pub(crate) method: reqwest::Method,
    pub(crate) url: String,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) body: Bytes,
    pub(crate) content_type: Option<String>,
    pub(crate) expect: ResponseHandlerConfig,
}

impl WebhookMessage {
    /// Start building a webhook request for the given URL. Defaults:
    /// `POST`, empty body, any 2xx accepted.
    pub fn builder(url: impl Into<String>) -> WebhookMessageBuilder {
        WebhookMessageBuilder {
            method: reqwest::Method::POST,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: Bytes::new(),
            content_type: None,
            expect: ResponseHandlerConfig::status_only(),
        }
    }

    /// The target URL.
    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Message for WebhookMessage {
    fn provider_type(&self) -> ProviderType {
        ProviderType::Webhook
    }

    fn msg_id(&self) -> &str {
        &self.id
    }

    fn validate(&self) -> Result<(), SendError> {
        if self.url.is_empty() {
            return Err(SendError::InvalidParam("webhook URL is empty".into()));
        }
        if !self.url.starts_with("http://") && !self.url.starts_with("https://") {
            return Err(SendError::InvalidParam(format!(
                "webhook URL '{}' is not http(s)",
                self.url
            )));
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl std::fmt::Debug for WebhookMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookMessage")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("url", &self.url)
            .field("body_len", &self.body.len())
            .finish_non_exhaustive()
    }
}

/// Fluent builder for [`WebhookMessage`]. Builders never perform I/O.
pub struct WebhookMessageBuilder {
    method: reqwest::Method,
    url: String,
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
    body: Bytes,
    content_type: Option<String>,
    expect: ResponseHandlerConfig,
}

impl WebhookMessageBuilder {
    /// Set the HTTP method.
    #[must_use]
    pub fn method(mut self, method: reqwest::Method) -> Self {
        self.method = method;
        self
    }

    /// Add a header.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add a query parameter.
    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// JSON-encode a body.
    pub fn json_body<T: serde::Serialize>(mut self, value: &T) -> Result<Self, SendError> {
        self.body = Bytes::from(
            serde_json::to_vec(value).map_err(|e| SendError::Serialization(e.to_string()))?,
        );
        self.content_type = Some("application/json".to_owned());
        Ok(self)
    }

    /// Set a raw body with an explicit content type.
    #[must_use]
    pub fn raw_body(mut self, body: Bytes, content_type: impl Into<String>) -> Self {
        self.body = body;
        self.content_type = Some(content_type.into());
        self
    }

    /// Classify responses by a JSON business code instead of status only.
    #[must_use]
    pub fn expect_json_code(
        mut self,
        code_path: impl Into<String>,
        success_values: Vec<String>,
        message_path: impl Into<String>,
    ) -> Self {
        self.expect = ResponseHandlerConfig::json(code_path, success_values, message_path);
        self
    }

    /// Classify responses by a substring of the text body.
    #[must_use]
    pub fn expect_text_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.expect = ResponseHandlerConfig::text_pattern(pattern);
        self
    }

    /// Finish the message. The returned message passes `validate` when the
    /// URL is http(s).
    pub fn build(self) -> WebhookMessage {
        WebhookMessage {
            id: new_msg_id(),
            method: self.method,
            url: self.url,
            headers: self.headers,
            query: self.query,
            body: self.body,
            content_type: self.content_type,
            expect: self.expect,
        }
    }
}
