use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use rand::Rng;
use tracing::debug;

use crate::account::Account;
use crate::config::{ProviderConfig, Strategy};
use crate::error::SendError;

/// Default cooldown before a failed account is considered healthy again.
const DEFAULT_COOLDOWN: Duration = Duration::from_secs(30);

/// Picks one account per call from a provider's enabled account set.
///
/// The selector owns all per-provider selection state: the round-robin
/// cursor and the health log fed by [`mark_failure`](Self::mark_failure).
/// Every method is safe under concurrent callers; the cursor advances
/// exactly once per successful selection.
pub struct AccountSelector {
    accounts: Vec<Account>,
    strategy: Strategy,
    cursor: AtomicUsize,
    cooldown: Duration,
    /// Last failure instant per account name. Entries are cleared on
    /// success.
    health: Mutex<HashMap<String, Instant>>,
}

impl AccountSelector {
    /// Build a selector over the enabled accounts of a validated config.
    pub fn new(config: &ProviderConfig) -> Result<Self, SendError> {
        config.validate()?;
        Ok(Self {
            accounts: config.enabled_accounts(),
            strategy: config.strategy,
            cursor: AtomicUsize::new(0),
            cooldown: DEFAULT_COOLDOWN,
            health: Mutex::new(HashMap::new()),
        })
    }

    /// Override the health cooldown (health_based strategy only).
    #[must_use]
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// The selection strategy in effect.
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Number of enabled accounts under selection.
    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    /// Returns `true` if no accounts are under selection.
    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    /// Select one account.
    ///
    /// A `hint` must name an enabled account exactly, or the call fails
    /// with [`SendError::AccountNotFound`]; the hint bypasses both the
    /// strategy and the `sub_type` filter. Without a hint, candidates are
    /// first narrowed to accounts matching `sub_type` (accounts with no
    /// sub-type match anything), then the strategy picks one. Ties break by
    /// configuration order.
    pub fn select(
        &self,
        hint: Option<&str>,
        sub_type: Option<&str>,
    ) -> Result<Account, SendError> {
        if let Some(name) = hint {
            return self
                .accounts
                .iter()
                .find(|a| a.name == name)
                .cloned()
                .ok_or_else(|| SendError::AccountNotFound(name.to_owned()));
        }

        let candidates: Vec<usize> = self
            .accounts
            .iter()
            .enumerate()
            .filter(|(_, a)| match (sub_type, a.sub_type.as_deref()) {
                (Some(wanted), Some(have)) => wanted == have,
                _ => true,
            })
            .map(|(i, _)| i)
            .collect();

        if candidates.is_empty() {
            return Err(SendError::AccountNotFound(format!(
                "no enabled account for sub-provider '{}'",
                sub_type.unwrap_or("")
            )));
        }

        let index = match self.strategy {
            Strategy::RoundRobin => self.next_round_robin(candidates.len()),
            Strategy::Random => rand::rng().random_range(0..candidates.len()),
            Strategy::Weighted => self.pick_weighted(&candidates),
            Strategy::HealthBased => self.pick_healthy(&candidates),
        };

        Ok(self.accounts[candidates[index]].clone())
    }

    /// Record a delivery failure for health-based selection.
    pub fn mark_failure(&self, account_name: &str) {
        debug!(account = %account_name, "marking account unhealthy");
        self.health
            .lock()
            .expect("health lock poisoned")
            .insert(account_name.to_owned(), Instant::now());
    }

    /// Clear a previous failure record.
    pub fn mark_success(&self, account_name: &str) {
        self.health
            .lock()
            .expect("health lock poisoned")
            .remove(account_name);
    }

    fn next_round_robin(&self, len: usize) -> usize {
        self.cursor.fetch_add(1, Ordering::Relaxed) % len
    }

    /// Draw a uniform integer in `[0, Σw)` and walk the prefix sums.
    fn pick_weighted(&self, candidates: &[usize]) -> usize {
        let total: u64 = candidates
            .iter()
            .map(|&i| u64::from(self.accounts[i].effective_weight()))
            .sum();
        let mut draw = rand::rng().random_range(0..total);
        for (pos, &i) in candidates.iter().enumerate() {
            let w = u64::from(self.accounts[i].effective_weight());
            if draw < w {
                return pos;
            }
            draw -= w;
        }
        candidates.len() - 1
    }

    /// Round-robin among accounts outside their failure cooldown; when
    /// every candidate is cooling down, pick the least-recently-failed.
    fn pick_healthy(&self, candidates: &[usize]) -> usize {
        let health = self.health.lock().expect("health lock poisoned");
        let now = Instant::now();

        let healthy: Vec<usize> = candidates
            .iter()
            .enumerate()
            .filter(|&(_, &i)| {
                health
                    .get(&self.accounts[i].name)
                    .is_none_or(|failed_at| now.duration_since(*failed_at) >= self.cooldown)
            })
            .map(|(pos, _)| pos)
            .collect();

        if healthy.is_empty() {
            // All cooling down: least-recently-failed wins.
            return candidates
                .iter()
                .enumerate()
                .min_by_key(|&(_, &i)| health.get(&self.accounts[i].name).copied())
                .map_or(0, |(pos, _)| pos);
        }

        healthy[self.next_round_robin(healthy.len())]
    }
}

impl std::fmt::Debug for AccountSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountSelector")
            .field("strategy", &self.strategy)
            .field("accounts", &self.accounts.len())
            .finish_non_exhaustive()
    }
}
