use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::SendError;

fn default_weight() -> u32 {
    1
}

/// The smallest addressable credential unit inside a provider.
///
/// Accounts carry three tiers of data: routing metadata (`name`,
/// `sub_type`, `weight`, `disabled`), vendor credentials (`api_key`,
/// `api_secret`, `app_id`; free-form, meaning is vendor-specific), and a
/// vendor-specific `extra` map (SMTP host/port, region, default sender,
/// ...).
///
/// Accounts are plain values: the selector clones one out per call and the
/// transformer reads it. Credentials never appear in `Debug` output.
#[derive(Clone, Serialize, Deserialize)]
pub struct Account {
    /// Account name, unique within a provider.
    pub name: String,

    /// Vendor discriminator inside the channel family (e.g. `aliyun` under
    /// `sms`). Accounts without a sub-type serve any sub-vendor.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_type: Option<String>,

    /// Relative selection weight for the weighted strategy. Zero is treated
    /// as one.
    #[serde(default = "default_weight")]
    pub weight: u32,

    /// Disabled accounts are never selected.
    #[serde(default)]
    pub disabled: bool,

    /// Primary credential (API key, bot token, webhook key, SMTP user...).
    #[serde(default)]
    pub api_key: String,

    /// Secondary credential (API secret, signing secret, SMTP password...).
    #[serde(default)]
    pub api_secret: String,

    /// Vendor application / tenant identifier where one exists.
    #[serde(default)]
    pub app_id: String,

    /// Vendor-specific fields that do not fit the common shape.
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl Account {
    /// Create an enabled account with weight 1 and empty credentials.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sub_type: None,
            weight: 1,
            disabled: false,
            api_key: String::new(),
            api_secret: String::new(),
            app_id: String::new(),
            extra: Map::new(),
        }
    }

    /// Set the sub-vendor discriminator.
    #[must_use]
    pub fn with_sub_type(mut self, sub_type: impl Into<String>) -> Self {
        self.sub_type = Some(sub_type.into());
        self
    }

    /// Set the selection weight.
    #[must_use]
    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    /// Mark the account disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Set the primary credential.
    #[must_use]
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = api_key.into();
        self
    }

    /// Set the secondary credential.
    #[must_use]
    pub fn with_api_secret(mut self, api_secret: impl Into<String>) -> Self {
        self.api_secret = api_secret.into();
        self
    }

    /// Set the vendor application identifier.
    #[must_use]
    pub fn with_app_id(mut self, app_id: impl Into<String>) -> Self {
        self.app_id = app_id.into();
        self
    }

    /// Add a vendor-specific extra field.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    /// Weight with the zero-means-one rule applied.
    pub fn effective_weight(&self) -> u32 {
        self.weight.max(1)
    }

    /// Read an extra field as a string.
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }

    /// Read an extra field as an unsigned integer.
    pub fn extra_u64(&self, key: &str) -> Option<u64> {
        self.extra.get(key).and_then(Value::as_u64)
    }

    /// Read a required extra field, failing with a configuration error.
    pub fn require_extra_str(&self, key: &str) -> Result<&str, SendError> {
        self.extra_str(key).ok_or_else(|| {
            SendError::Configuration(format!(
                "account '{}' is missing required field '{key}'",
                self.name
            ))
        })
    }
}

impl std::fmt::Debug for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("name", &self.name)
            .field("sub_type", &self.sub_type)
            .field("weight", &self.weight)
            .field("disabled", &self.disabled)
            .field("api_key", &"[REDACTED]")
            .field("api_secret", &"[REDACTED]")
            .field("app_id", &self.app_id)
            .finish_non_exhaustive()
    }
}
