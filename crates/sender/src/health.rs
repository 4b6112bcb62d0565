use serde::{Deserialize, Serialize};

use crate::circuit_breaker::CircuitState;

/// Overall health classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    /// Every provider is operational.
    Healthy,
    /// Some providers are failing.
    Degraded,
    /// No provider is operational.
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Unhealthy => "unhealthy",
        };
        f.write_str(name)
    }
}

/// Health summary for a single provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderHealth {
    /// Provider name.
    pub provider: String,
    /// Whether the provider's health check passed.
    pub healthy: bool,
    /// Health check error message (if unhealthy).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Circuit breaker state, when one is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_state: Option<CircuitState>,
}

/// Aggregated health across every registered provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// Overall classification.
    pub status: HealthStatus,
    /// Per-provider detail.
    pub providers: Vec<ProviderHealth>,
}

impl HealthReport {
    /// Aggregate per-provider health into an overall status.
    ///
    /// An open circuit counts as unhealthy even when the vendor's health
    /// endpoint answers. No providers at all is healthy (nothing can
    /// fail).
    pub fn aggregate(providers: Vec<ProviderHealth>) -> Self {
        let operational = |p: &ProviderHealth| {
            p.healthy && p.circuit_state != Some(CircuitState::Open)
        };
        let healthy_count = providers.iter().filter(|p| operational(p)).count();
        let status = if providers.is_empty() || healthy_count == providers.len() {
            HealthStatus::Healthy
        } else if healthy_count == 0 {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Degraded
        };
        Self { status, providers }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(provider: &str, healthy: bool, circuit: Option<CircuitState>) -> ProviderHealth {
        ProviderHealth {
            provider: provider.to_owned(),
            healthy,
            error: None,
            circuit_state: circuit,
        }
    }

    #[test]
    fn all_healthy() {
        let report = HealthReport::aggregate(vec![
            entry("sms", true, Some(CircuitState::Closed)),
            entry("email", true, None),
        ]);
        assert_eq!(report.status, HealthStatus::Healthy);
    }

    #[test]
    fn some_failing_is_degraded() {
        let report = HealthReport::aggregate(vec![
            entry("sms", true, None),
            entry("email", false, None),
        ]);
        assert_eq!(report.status, HealthStatus::Degraded);
    }

    #[test]
    fn all_failing_is_unhealthy() {
        let report = HealthReport::aggregate(vec![entry("sms", false, None)]);
        assert_eq!(report.status, HealthStatus::Unhealthy);
    }

    #[test]
    fn open_circuit_counts_as_unhealthy() {
        let report =
            HealthReport::aggregate(vec![entry("sms", true, Some(CircuitState::Open))]);
        assert_eq!(report.status, HealthStatus::Unhealthy);
    }

    #[test]
    fn empty_registry_is_healthy() {
        let report = HealthReport::aggregate(vec![]);
        assert_eq!(report.status, HealthStatus::Healthy);
    }
}
