use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};

/// Sink for dispatch counters, keyed by provider name.
///
/// The engine records two operation kinds: an *enqueue* when an async send
/// is accepted, and a *sent* when a delivery attempt chain terminates.
/// Both advance the provider's total; only *sent* moves the
/// success/failure split. Recording happens after the observable event it
/// describes.
pub trait MetricsCollector: Send + Sync {
    /// An async send was accepted for later delivery.
    fn record_enqueue(&self, provider: &str);

    /// A delivery attempt chain terminated.
    fn record_sent(&self, provider: &str, success: bool, elapsed: Duration);
}

/// Point-in-time counters for one provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderMetricsSnapshot {
    /// Operations recorded (enqueues + terminations).
    pub total: u64,
    /// Successful deliveries.
    pub success: u64,
    /// Failed deliveries.
    pub failed: u64,
    /// Sum of elapsed time across terminated deliveries, in milliseconds.
    pub elapsed_ms_total: u64,
}

#[derive(Debug, Default)]
struct ProviderCounters {
    total: AtomicU64,
    success: AtomicU64,
    failed: AtomicU64,
    elapsed_ms_total: AtomicU64,
}

/// In-process [`MetricsCollector`] over relaxed atomic counters.
///
/// Counters reset when the process restarts; export to a real metrics
/// backend is out of scope for the engine.
#[derive(Debug, Default)]
pub struct InMemoryMetrics {
    providers: DashMap<String, ProviderCounters>,
}

impl InMemoryMetrics {
    /// Create an empty collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counters for one provider, zeroed when it has never been seen.
    pub fn snapshot(&self, provider: &str) -> ProviderMetricsSnapshot {
        self.providers
            .get(provider)
            .map(|counters| ProviderMetricsSnapshot {
                total: counters.total.load(Ordering::Relaxed),
                success: counters.success.load(Ordering::Relaxed),
                failed: counters.failed.load(Ordering::Relaxed),
                elapsed_ms_total: counters.elapsed_ms_total.load(Ordering::Relaxed),
            })
            .unwrap_or_default()
    }

    /// Snapshot of every provider seen so far.
    pub fn snapshot_all(&self) -> Vec<(String, ProviderMetricsSnapshot)> {
        let mut all: Vec<_> = self
            .providers
            .iter()
            .map(|entry| (entry.key().clone(), self.snapshot(entry.key())))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }
}

impl MetricsCollector for InMemoryMetrics {
    fn record_enqueue(&self, provider: &str) {
        let counters = self.providers.entry(provider.to_owned()).or_default();
        counters.total.fetch_add(1, Ordering::Relaxed);
    }

    fn record_sent(&self, provider: &str, success: bool, elapsed: Duration) {
        let counters = self.providers.entry(provider.to_owned()).or_default();
        counters.total.fetch_add(1, Ordering::Relaxed);
        if success {
            counters.success.fetch_add(1, Ordering::Relaxed);
        } else {
            counters.failed.fetch_add(1, Ordering::Relaxed);
        }
        #[allow(clippy::cast_possible_truncation)]
        counters
            .elapsed_ms_total
            .fetch_add(elapsed.as_millis() as u64, Ordering::Relaxed);
    }
}
