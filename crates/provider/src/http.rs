use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use courier_core::{
    AccountSelector, Message, ProviderConfig, ProviderType, SendError, SendResult,
};
use tracing::{debug, warn};

use crate::provider::{Provider, ProviderSendOptions};
use crate::request::{BodyType, PartData, RequestSpec};
use crate::transformer::Transformer;

/// Cap on how much of a vendor response body is read and classified.
const MAX_RESPONSE_BYTES: usize = 64 * 1024;

/// Generic HTTP execution shell over any set of [`Transformer`]s.
///
/// One `HttpProvider` serves one channel family: it selects an account,
/// asks the first matching transformer for a [`RequestSpec`] and
/// classifier, executes the request, and assembles the [`SendResult`].
/// Delivery outcomes feed the selector's health log so the health-based
/// strategy can route around failing accounts.
pub struct HttpProvider {
    name: String,
    provider_type: ProviderType,
    selector: AccountSelector,
    transformers: Vec<Arc<dyn Transformer>>,
    client: reqwest::Client,
}

impl HttpProvider {
    /// Create a provider for the given family over a validated config.
    ///
    /// Fails when the config is disabled, has no enabled account, or no
    /// transformer is supplied.
    pub fn new(
        provider_type: ProviderType,
        config: &ProviderConfig,
        transformers: Vec<Arc<dyn Transformer>>,
    ) -> Result<Self, SendError> {
        if config.disabled {
            return Err(SendError::Configuration(format!(
                "provider '{provider_type}' is disabled"
            )));
        }
        if transformers.is_empty() {
            return Err(SendError::Configuration(format!(
                "provider '{provider_type}' has no transformers"
            )));
        }
        let selector = AccountSelector::new(config)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");
        Ok(Self {
            name: provider_type.to_string(),
            provider_type,
            selector,
            transformers,
            client,
        })
    }

    /// Replace the default HTTP client (shared connection pools, tests).
    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// The selector driving account choice for this provider.
    pub fn selector(&self) -> &AccountSelector {
        &self.selector
    }

    fn build_request(
        &self,
        client: &reqwest::Client,
        spec: &RequestSpec,
        timeout: Option<Duration>,
    ) -> reqwest::RequestBuilder {
        let mut request = client.request(spec.method.clone(), &spec.url);

        if !spec.query.is_empty() {
            request = request.query(&spec.query);
        }
        for (name, value) in &spec.headers {
            request = request.header(name, value);
        }

        request = match spec.body_type {
            BodyType::Json => request
                .header(reqwest::header::CONTENT_TYPE, "application/json")
                .body(spec.body.clone()),
            BodyType::Form => request
                .header(
                    reqwest::header::CONTENT_TYPE,
                    "application/x-www-form-urlencoded",
                )
                .body(spec.body.clone()),
            BodyType::Text => request
                .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=utf-8")
                .body(spec.body.clone()),
            BodyType::Raw => request.body(spec.body.clone()),
            BodyType::Multipart => {
                let mut form = reqwest::multipart::Form::new();
                for part in &spec.parts {
                    form = match &part.data {
                        PartData::Text(value) => form.text(part.name.clone(), value.clone()),
                        PartData::Bytes {
                            data,
                            filename,
                            mime,
                        } => {
                            let file = reqwest::multipart::Part::bytes(data.to_vec())
                                .file_name(filename.clone())
                                .mime_str(mime)
                                .unwrap_or_else(|_| {
                                    reqwest::multipart::Part::bytes(data.to_vec())
                                        .file_name(filename.clone())
                                });
                            form.part(part.name.clone(), file)
                        }
                    };
                }
                request.multipart(form)
            }
        };

        if let Some(timeout) = timeout {
            request = request.timeout(timeout);
        }
        request
    }
}

/// Map a transport-level failure into the error taxonomy.
fn map_transport(err: &reqwest::Error, timeout: Option<Duration>) -> SendError {
    if err.is_timeout() {
        if let Some(timeout) = timeout {
            return SendError::Timeout(timeout);
        }
    }
    SendError::Transport(err.to_string())
}

#[async_trait]
impl Provider for HttpProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider_type(&self) -> ProviderType {
        self.provider_type
    }

    async fn send(
        &self,
        msg: &dyn Message,
        options: &ProviderSendOptions,
    ) -> Result<SendResult, SendError> {
        let start = Instant::now();

        let account = self
            .selector
            .select(options.account_name.as_deref(), msg.sub_provider())?;

        let transformer = self
            .transformers
            .iter()
            .find(|t| t.can_transform(msg))
            .ok_or_else(|| {
                SendError::Configuration(format!(
                    "no transformer for {} message (sub-provider {:?})",
                    self.provider_type,
                    msg.sub_provider()
                ))
            })?;

        let (spec, handler) = transformer.transform(msg, &account)?;

        debug!(
            provider = %self.name,
            account = %account.name,
            msg_id = %msg.msg_id(),
            url = %spec.url,
            "executing provider request"
        );

        let client = options.http_client.as_ref().unwrap_or(&self.client);
        let request = self.build_request(client, &spec, options.timeout);

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                self.selector.mark_failure(&account.name);
                warn!(provider = %self.name, account = %account.name, error = %e, "transport failure");
                return Err(map_transport(&e, options.timeout));
            }
        };

        let status = response.status().as_u16();
        let mut body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                self.selector.mark_failure(&account.name);
                return Err(map_transport(&e, options.timeout));
            }
        };
        body.truncate(MAX_RESPONSE_BYTES);

        let outcome = handler(status, &body);
        match &outcome {
            Ok(()) => self.selector.mark_success(&account.name),
            Err(_) => self.selector.mark_failure(&account.name),
        }

        let result = SendResult {
            request_id: msg.msg_id().to_owned(),
            provider_name: self.name.clone(),
            account_name: account.name,
            elapsed: start.elapsed(),
            status_code: Some(status),
            response_excerpt: SendResult::excerpt_of(&String::from_utf8_lossy(&body)),
        };

        outcome.map(|()| result)
    }
}

impl std::fmt::Debug for HttpProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpProvider")
            .field("name", &self.name)
            .field("transformers", &self.transformers.len())
            .field("selector", &self.selector)
            .finish_non_exhaustive()
    }
}
