use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::account::Account;
use crate::error::SendError;

/// Algorithm for picking one account from a provider's account set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Stateful cursor advancing by one per call, wrapping modulo N.
    #[default]
    RoundRobin,
    /// Uniform over enabled accounts.
    Random,
    /// Probability proportional to account weight.
    Weighted,
    /// Skip recently failed accounts, round-robin among the healthy.
    HealthBased,
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::RoundRobin => "round_robin",
            Self::Random => "random",
            Self::Weighted => "weighted",
            Self::HealthBased => "health_based",
        };
        f.write_str(name)
    }
}

/// Provider-level configuration: a selection strategy over an ordered
/// sequence of accounts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Account-selection strategy.
    #[serde(default)]
    pub strategy: Strategy,

    /// A disabled provider is excluded from registration.
    #[serde(default)]
    pub disabled: bool,

    /// Ordered account set. Order is the tie-break for every strategy.
    #[serde(default)]
    pub accounts: Vec<Account>,
}

impl ProviderConfig {
    /// Create a round-robin configuration over the given accounts.
    pub fn new(accounts: Vec<Account>) -> Self {
        Self {
            strategy: Strategy::RoundRobin,
            disabled: false,
            accounts,
        }
    }

    /// Set the selection strategy.
    #[must_use]
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Validate the configuration.
    ///
    /// Fails when no account is enabled or when account names collide.
    pub fn validate(&self) -> Result<(), SendError> {
        if !self.accounts.iter().any(|a| !a.disabled) {
            return Err(SendError::Configuration(
                "provider has no enabled account".into(),
            ));
        }
        let mut seen = HashSet::new();
        for account in &self.accounts {
            if !seen.insert(account.name.as_str()) {
                return Err(SendError::Configuration(format!(
                    "duplicate account name '{}'",
                    account.name
                )));
            }
        }
        Ok(())
    }

    /// Enabled accounts in configuration order.
    pub fn enabled_accounts(&self) -> Vec<Account> {
        self.accounts.iter().filter(|a| !a.disabled).cloned().collect()
    }
}
