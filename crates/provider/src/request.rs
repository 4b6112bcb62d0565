use bytes::Bytes;

/// Encoding of the request body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyType {
    /// JSON body, `Content-Type: application/json`.
    Json,
    /// URL-encoded form body, `Content-Type: application/x-www-form-urlencoded`.
    Form,
    /// Multipart form; the body lives in [`RequestSpec::parts`].
    Multipart,
    /// Plain text body.
    Text,
    /// Pre-encoded body; the transformer sets any content-type header
    /// itself.
    Raw,
}

/// Payload of one multipart form part.
#[derive(Debug, Clone)]
pub enum PartData {
    /// A plain text field.
    Text(String),
    /// A file part with filename and mime type.
    Bytes {
        data: Bytes,
        filename: String,
        mime: String,
    },
}

/// One multipart form part.
#[derive(Debug, Clone)]
pub struct FormPart {
    pub name: String,
    pub data: PartData,
}

/// The wire-level request a transformer produces from a message.
///
/// This is the complete recipe for one HTTP call: the shell executes it
/// verbatim, adding nothing but the content-type implied by
/// [`BodyType`].
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: reqwest::Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub query: Vec<(String, String)>,
    pub body: Bytes,
    pub body_type: BodyType,
    /// Multipart parts; only read when `body_type` is
    /// [`BodyType::Multipart`].
    pub parts: Vec<FormPart>,
}

impl RequestSpec {
    /// A GET request for the given URL.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(reqwest::Method::GET, url)
    }

    /// A POST request for the given URL.
    pub fn post(url: impl Into<String>) -> Self {
        Self::new(reqwest::Method::POST, url)
    }

    /// A request with the given method and URL, empty raw body.
    pub fn new(method: reqwest::Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            query: Vec::new(),
            body: Bytes::new(),
            body_type: BodyType::Raw,
            parts: Vec::new(),
        }
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add a query parameter.
    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Set a JSON body from a serialisable value.
    pub fn with_json<T: serde::Serialize>(
        mut self,
        value: &T,
    ) -> Result<Self, courier_core::SendError> {
        self.body = Bytes::from(
            serde_json::to_vec(value)
                .map_err(|e| courier_core::SendError::Serialization(e.to_string()))?,
        );
        self.body_type = BodyType::Json;
        Ok(self)
    }

    /// Set a URL-encoded form body from a serialisable value.
    pub fn with_form<T: serde::Serialize>(
        mut self,
        value: &T,
    ) -> Result<Self, courier_core::SendError> {
        self.body = Bytes::from(
            serde_urlencoded::to_string(value)
                .map_err(|e| courier_core::SendError::Serialization(e.to_string()))?
                .into_bytes(),
        );
        self.body_type = BodyType::Form;
        Ok(self)
    }

    /// Set a plain text body.
    #[must_use]
    pub fn with_text(mut self, body: impl Into<String>) -> Self {
        self.body = Bytes::from(body.into().into_bytes());
        self.body_type = BodyType::Text;
        self
    }

    /// Set a pre-encoded body.
    #[must_use]
    pub fn with_raw(mut self, body: Bytes) -> Self {
        self.body = body;
        self.body_type = BodyType::Raw;
        self
    }

    /// Add a multipart text field.
    #[must_use]
    pub fn with_part_text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parts.push(FormPart {
            name: name.into(),
            data: PartData::Text(value.into()),
        });
        self.body_type = BodyType::Multipart;
        self
    }

    /// Add a multipart file field.
    #[must_use]
    pub fn with_part_bytes(
        mut self,
        name: impl Into<String>,
        data: Bytes,
        filename: impl Into<String>,
        mime: impl Into<String>,
    ) -> Self {
        self.parts.push(FormPart {
            name: name.into(),
            data: PartData::Bytes {
                data,
                filename: filename.into(),
                mime: mime.into(),
            },
        });
        self.body_type = BodyType::Multipart;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_body_sets_type_and_bytes() {
        let spec = RequestSpec::post("https://api.example.com")
            .with_json(&serde_json::json!({"k": "v"}))
            .unwrap();
        assert_eq!(spec.body_type, BodyType::Json);
        assert_eq!(spec.body.as_ref(), br#"{"k":"v"}"#);
    }

    #[test]
    fn form_body_encodes_pairs() {
        let spec = RequestSpec::post("https://api.example.com")
            .with_form(&[("a", "1"), ("b", "x y")])
            .unwrap();
        assert_eq!(spec.body_type, BodyType::Form);
        let body = String::from_utf8(spec.body.to_vec()).unwrap();
        assert!(body.contains("a=1"));
        assert!(body.contains("b=x+y"));
    }

    #[test]
    fn multipart_parts_accumulate() {
        let spec = RequestSpec::post("https://api.example.com")
            .with_part_text("chat_id", "42")
            .with_part_bytes("photo", Bytes::from_static(b"png"), "p.png", "image/png");
        assert_eq!(spec.body_type, BodyType::Multipart);
        assert_eq!(spec.parts.len(), 2);
    }

    #[test]
    fn headers_and_query_preserve_order() {
        let spec = RequestSpec::get("https://api.example.com")
            .with_query("b", "2")
            .with_query("a", "1")
            .with_header("X-One", "1");
        assert_eq!(spec.query[0].0, "b");
        assert_eq!(spec.headers[0].0, "X-One");
    }
}
