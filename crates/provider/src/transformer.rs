use std::sync::Arc;

use courier_core::{Account, Message, ProviderType, SendError};

use crate::request::RequestSpec;
use crate::response::ResponseHandler;

/// Hook run before a message is shaped into a request. Any error aborts
/// the transform.
pub type BeforeTransformHook =
    Arc<dyn Fn(&dyn Message, &Account) -> Result<(), SendError> + Send + Sync>;

/// Hook run after the response classifier. Receives the classifier's
/// outcome and may replace it.
pub type AfterTransformHook =
    Arc<dyn Fn(&Account, Result<(), SendError>) -> Result<(), SendError> + Send + Sync>;

/// Late-binds the account a message is actually sent with (e.g. when a
/// message pins a sub-vendor whose credentials differ from the selected
/// account's defaults).
pub type ConfigResolver =
    Box<dyn Fn(&dyn Message, &Account) -> Result<Account, SendError> + Send + Sync>;

/// The request-shaping half of a transformer.
pub type TransformFn = Box<
    dyn Fn(&dyn Message, &Account) -> Result<(RequestSpec, ResponseHandler), SendError>
        + Send
        + Sync,
>;

/// Stateless translator from a typed message to an HTTP request spec plus
/// a response classifier.
///
/// Transformers dispatch on `(ProviderType, SubProvider)`; the concrete
/// message shape is recovered by downcasting inside
/// [`transform`](Self::transform), the single place in the system where a
/// message's concrete type is inspected.
pub trait Transformer: Send + Sync {
    /// Whether this transformer understands the message.
    fn can_transform(&self, msg: &dyn Message) -> bool;

    /// Shape the message into a wire request and its classifier.
    fn transform(
        &self,
        msg: &dyn Message,
        account: &Account,
    ) -> Result<(RequestSpec, ResponseHandler), SendError>;
}

/// Composable [`Transformer`] covering the shape every vendor shares.
///
/// Construction wires up, in order: an optional config resolver (account
/// late-binding), before-hooks (message validation is installed by
/// default), the single request-shaping handler, and after-hooks that may
/// override the classifier's verdict.
pub struct BaseTransformer {
    provider_type: ProviderType,
    sub_provider: Option<String>,
    before_hooks: Vec<BeforeTransformHook>,
    after_hooks: Vec<AfterTransformHook>,
    config_resolver: Option<ConfigResolver>,
    handler: TransformFn,
}

impl BaseTransformer {
    /// Create a transformer for a channel family.
    ///
    /// The message's own `validate` is installed as the first before-hook.
    pub fn new(provider_type: ProviderType, handler: TransformFn) -> Self {
        Self {
            provider_type,
            sub_provider: None,
            before_hooks: vec![Arc::new(|msg: &dyn Message, _: &Account| msg.validate())],
            after_hooks: Vec::new(),
            config_resolver: None,
            handler,
        }
    }

    /// Narrow the transformer to one sub-vendor.
    #[must_use]
    pub fn with_sub_provider(mut self, sub_provider: impl Into<String>) -> Self {
        self.sub_provider = Some(sub_provider.into());
        self
    }

    /// Append a before-hook.
    #[must_use]
    pub fn with_before_hook(mut self, hook: BeforeTransformHook) -> Self {
        self.before_hooks.push(hook);
        self
    }

    /// Append an after-hook.
    #[must_use]
    pub fn with_after_hook(mut self, hook: AfterTransformHook) -> Self {
        self.after_hooks.push(hook);
        self
    }

    /// Install the account resolver.
    #[must_use]
    pub fn with_config_resolver(mut self, resolver: ConfigResolver) -> Self {
        self.config_resolver = Some(resolver);
        self
    }

    /// The context tag carried by errors from this transformer's
    /// responses: `provider` or `provider.subprovider`.
    pub fn context_tag(&self) -> String {
        match &self.sub_provider {
            Some(sub) => format!("{}.{sub}", self.provider_type),
            None => self.provider_type.to_string(),
        }
    }
}

impl Transformer for BaseTransformer {
    fn can_transform(&self, msg: &dyn Message) -> bool {
        if msg.provider_type() != self.provider_type {
            return false;
        }
        match (&self.sub_provider, msg.sub_provider()) {
            (Some(own), Some(msgs)) => own == msgs,
            (Some(_), None) => false,
            (None, _) => true,
        }
    }

    fn transform(
        &self,
        msg: &dyn Message,
        account: &Account,
    ) -> Result<(RequestSpec, ResponseHandler), SendError> {
        let account = match &self.config_resolver {
            Some(resolver) => resolver(msg, account)?,
            None => account.clone(),
        };

        for hook in &self.before_hooks {
            hook(msg, &account)?;
        }

        let (spec, handler) = (self.handler)(msg, &account)?;

        if self.after_hooks.is_empty() {
            return Ok((spec, handler));
        }

        let hooks = self.after_hooks.clone();
        let wrapped: ResponseHandler = Arc::new(move |status, body| {
            let mut outcome = handler(status, body);
            for hook in &hooks {
                outcome = hook(&account, outcome);
            }
            outcome
        });
        Ok((spec, wrapped))
    }
}
