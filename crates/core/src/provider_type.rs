use serde::{Deserialize, Serialize};

/// Tag identifying a channel family.
///
/// Every registered provider and every message carries exactly one of these
/// tags; the [`Sender`](https://docs.rs/courier-sender) routes by it. A
/// secondary, vendor-level discriminator (the sub-provider, e.g. `aliyun`
/// under [`Sms`](Self::Sms)) is a plain string carried by messages and
/// accounts, not part of this enum.
///
/// `Lark` and `ServerChan` are valid routing tags even though no in-tree
/// transformer ships for them; user-supplied providers may register under
/// any tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// Text messages delivered through SMS gateway vendors.
    Sms,
    /// Email delivered over SMTP.
    Email,
    /// Email delivered through HTTP email APIs (Resend, Brevo, ...).
    #[serde(rename = "emailapi")]
    EmailApi,
    /// WeCom (WeChat Work) group bot.
    #[serde(rename = "wecombot")]
    WecomBot,
    /// DingTalk group bot.
    Dingtalk,
    /// Lark / Feishu group bot.
    Lark,
    /// Telegram Bot API.
    Telegram,
    /// ServerChan push channel.
    #[serde(rename = "serverchan")]
    ServerChan,
    /// Generic HTTP webhook.
    Webhook,
}

impl ProviderType {
    /// Returns the canonical lowercase name of this channel family.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sms => "sms",
            Self::Email => "email",
            Self::EmailApi => "emailapi",
            Self::WecomBot => "wecombot",
            Self::Dingtalk => "dingtalk",
            Self::Lark => "lark",
            Self::Telegram => "telegram",
            Self::ServerChan => "serverchan",
            Self::Webhook => "webhook",
        }
    }
}

impl std::fmt::Display for ProviderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_as_str() {
        assert_eq!(ProviderType::Sms.to_string(), "sms");
        assert_eq!(ProviderType::EmailApi.to_string(), "emailapi");
        assert_eq!(ProviderType::WecomBot.to_string(), "wecombot");
        assert_eq!(ProviderType::ServerChan.to_string(), "serverchan");
    }

    #[test]
    fn serde_roundtrip() {
        let json = serde_json::to_string(&ProviderType::EmailApi).unwrap();
        assert_eq!(json, "\"emailapi\"");
        let back: ProviderType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ProviderType::EmailApi);
    }

    #[test]
    fn usable_as_map_key() {
        let mut map = std::collections::HashMap::new();
        map.insert(ProviderType::Telegram, "t");
        assert_eq!(map.get(&ProviderType::Telegram), Some(&"t"));
    }
}
