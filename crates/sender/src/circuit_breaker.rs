use std::time::{Duration, Instant};

use courier_core::SendError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Maximum time a half-open probe can be in flight before its slot is
/// reclaimed. Covers probes whose future was dropped (per-call timeout,
/// caller cancellation) without reporting an outcome.
const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// State of a circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation — requests flow through.
    Closed,
    /// Provider is failing — requests are rejected immediately.
    Open,
    /// Recovery probe — a single request is allowed to test provider
    /// health.
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Configuration for a per-provider circuit breaker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    /// Number of consecutive failures before opening the circuit.
    pub failure_threshold: u32,
    /// How long to wait in `Open` state before admitting a probe.
    pub reset_timeout: Duration,
}

impl CircuitBreakerConfig {
    /// Validate configuration values.
    ///
    /// `reset_timeout = 0` is intentionally allowed (useful for testing).
    pub fn validate(&self) -> Result<(), SendError> {
        if self.failure_threshold < 1 {
            return Err(SendError::Configuration(
                "failure_threshold must be >= 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
        }
    }
}

/// Internal mutable state for a single circuit breaker.
#[derive(Debug)]
struct CircuitData {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    /// Set while the half-open probe is in flight; only one probe is
    /// admitted per `HalfOpen` window. Probes older than
    /// [`PROBE_TIMEOUT`] are considered stale.
    probe_started_at: Option<Instant>,
}

impl Default for CircuitData {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
            probe_started_at: None,
        }
    }
}

impl CircuitData {
    fn probe_active(&self) -> bool {
        self.probe_started_at
            .is_some_and(|at| at.elapsed() < PROBE_TIMEOUT)
    }
}

/// Per-provider failure isolation with half-open probing.
///
/// Transitions: `Closed` opens after `failure_threshold` consecutive
/// failures; `Open` admits a single probe once `reset_timeout` has elapsed;
/// a successful probe closes the circuit, a failed one re-opens it with a
/// fresh timeout. Transitions are serialised under one lock; a success in
/// `Closed` resets the failure counter.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    data: Mutex<CircuitData>,
}

impl CircuitBreaker {
    /// Create a circuit breaker with the given configuration.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            data: Mutex::new(CircuitData::default()),
        }
    }

    /// Acquire permission to issue a request.
    ///
    /// Returns [`SendError::CircuitOpen`] while the circuit rejects calls.
    /// In `HalfOpen` the first caller reserves the probe slot and **must**
    /// follow up with [`record_success`](Self::record_success) or
    /// [`record_failure`](Self::record_failure); concurrent callers are
    /// rejected until the probe completes.
    pub fn try_acquire_permit(&self) -> Result<(), SendError> {
        let mut data = self.data.lock();
        match data.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let elapsed = data
                    .last_failure_at
                    .map_or(Duration::MAX, |at| at.elapsed());
                if elapsed >= self.config.reset_timeout {
                    debug!("circuit breaker transitioning from open to half-open");
                    data.state = CircuitState::HalfOpen;
                    data.probe_started_at = Some(Instant::now());
                    Ok(())
                } else {
                    Err(SendError::CircuitOpen)
                }
            }
            CircuitState::HalfOpen => {
                if data.probe_active() {
                    Err(SendError::CircuitOpen)
                } else {
                    data.probe_started_at = Some(Instant::now());
                    Ok(())
                }
            }
        }
    }

    /// Record a successful execution.
    pub fn record_success(&self) {
        let mut data = self.data.lock();
        match data.state {
            CircuitState::HalfOpen => {
                info!("circuit breaker closing after successful probe");
                *data = CircuitData::default();
            }
            CircuitState::Closed => {
                data.consecutive_failures = 0;
            }
            CircuitState::Open => {}
        }
    }

    /// Record a failed execution.
    pub fn record_failure(&self) {
        let mut data = self.data.lock();
        let now = Instant::now();
        match data.state {
            CircuitState::Closed => {
                data.consecutive_failures += 1;
                data.last_failure_at = Some(now);
                if data.consecutive_failures >= self.config.failure_threshold {
                    info!(
                        failures = data.consecutive_failures,
                        threshold = self.config.failure_threshold,
                        "circuit breaker opening"
                    );
                    data.state = CircuitState::Open;
                }
            }
            CircuitState::HalfOpen => {
                info!("circuit breaker re-opening after half-open probe failure");
                data.state = CircuitState::Open;
                data.last_failure_at = Some(now);
                data.probe_started_at = None;
            }
            CircuitState::Open => {
                data.last_failure_at = Some(now);
            }
        }
    }

    /// Current state without triggering transitions.
    pub fn state(&self) -> CircuitState {
        self.data.lock().state
    }

    /// The configuration for this circuit breaker.
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Reset to `Closed`.
    pub fn reset(&self) {
        *self.data.lock() = CircuitData::default();
    }
}

impl std::fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("config", &self.config)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
