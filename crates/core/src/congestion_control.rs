//! Pluggable congestion control for window-based transports.
//!
//! The host transport owns the congestion window and reports acknowledgments, losses and
//! state changes through the [`CongestionControl`] callback contract. The controller answers
//! with a [`GrowthDirective`] per acknowledgment and a new slow-start threshold per loss; the
//! host performs the window arithmetic (see [`TransportWindow`](crate::window::TransportWindow)).
//!
//! # Callback sequence
//!
//! ```text
//!   connection start ──▶ CongestionControlConfig::build(initial_window, initial_threshold)
//!          │
//!          ▼
//!   ┌─▶ on_ack(AckSample) ──▶ GrowthDirective ──▶ host grows cwnd
//!   │      │
//!   │      ├─ loss detected ──▶ on_loss(cwnd) ──▶ new ssthresh
//!   │      │                    on_state(CaState::Loss)
//!   │      │                    on_event(CaEvent::Loss)
//!   │      │
//!   │      ├─ loss was spurious ─▶ on_undo(cwnd) ──▶ restored cwnd
//!   │      │
//!   │      └─ idle restart ─────▶ on_event(CaEvent::RestartAfterIdle)
//!   └──────┘
//! ```
//!
//! # Algorithm selection
//!
//! | Algorithm | Module | Behavior |
//! |-----------|--------|----------|
//! | NDM (default) | [`crate::ndm`] | Entropy-classified RTT jitter biases a recurrent predictor |
//! | Reno | [`crate::reno`] | Halve on loss, defer all growth to the host's linear rule |

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::ndm::{NdmConfig, NdmController, NdmStats};
use crate::reno::RenoController;

// =============================================================================
// Callback types
// =============================================================================

/// One acknowledgment as seen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckSample {
    /// Segments newly acknowledged.
    pub acked: u32,
    /// Smoothed RTT at the time of the acknowledgment.
    pub rtt: Duration,
    /// Congestion window (segments) before growth is applied.
    pub cwnd: u32,
    /// Whether the sender was limited by the window rather than by the application.
    pub window_limited: bool,
}

/// What the host should do with its window after an acknowledgment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GrowthDirective {
    /// Exponential growth by `acked` segments, capped at ssthresh.
    SlowStart { acked: u32 },
    /// Add `step` credits to the additive-increase counter; the window grows by one segment
    /// per `cwnd` credits.
    AdditiveIncrease { step: u32 },
    /// Apply the host's standard Reno rule to `acked` segments.
    Reno { acked: u32 },
    /// Leave the window unchanged.
    Hold,
}

/// Discrete events reported by the host.
#[derive(
    clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CaEvent {
    /// A loss was detected.
    Loss,
    /// Transmission restarts after an idle period.
    RestartAfterIdle,
}

/// Host congestion states.
#[derive(
    clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CaState {
    Open,
    Disorder,
    Cwr,
    Recovery,
    /// Retransmission timeout recovery.
    Loss,
}

/// Minimal export for host diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Diagnostics {
    /// Valid samples in the RTT history.
    pub sample_count: u32,
    /// Minimum RTT, if any sample was seen.
    pub min_rtt: Option<Duration>,
    /// Last entropy score (zero for algorithms without one).
    pub entropy: u16,
}

// =============================================================================
// Callback contract
// =============================================================================

/// Callback contract between a host transport and a congestion controller.
///
/// Every method runs synchronously with bounded work; one controller serves one connection
/// and is never shared.
pub trait CongestionControl: Send {
    fn on_ack(&mut self, ack: AckSample) -> GrowthDirective;

    /// Returns the new slow-start threshold and records `cwnd` for a later undo.
    fn on_loss(&mut self, cwnd: u32) -> u32;

    /// Returns the window to restore after a spurious loss.
    fn on_undo(&mut self, cwnd: u32) -> u32;

    fn on_event(&mut self, event: CaEvent);

    fn on_state(&mut self, state: CaState);

    fn ssthresh(&self) -> u32;

    fn export_diagnostics(&self) -> Diagnostics;

    fn stats(&self) -> CongestionControlStats;

    fn algorithm(&self) -> CongestionControlAlgorithm;
}

// =============================================================================
// Algorithm Identification
// =============================================================================

/// Identifies the congestion control algorithm in use.
#[derive(
    clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum CongestionControlAlgorithm {
    /// Entropy-aware decision engine.
    #[default]
    Ndm,
    /// Classic Reno: halve on loss, linear growth.
    Reno,
}

impl fmt::Display for CongestionControlAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CongestionControlAlgorithm::Ndm => write!(f, "NDM"),
            CongestionControlAlgorithm::Reno => write!(f, "Reno"),
        }
    }
}

impl std::str::FromStr for CongestionControlAlgorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ndm" | "ndm-tcp" => Ok(CongestionControlAlgorithm::Ndm),
            "reno" => Ok(CongestionControlAlgorithm::Reno),
            _ => Err(ConfigError::UnknownAlgorithm(s.to_string())),
        }
    }
}

// =============================================================================
// Algorithm-Agnostic Statistics
// =============================================================================

/// Statistics common to every algorithm.
///
/// For NDM-specific data, match on [`CongestionController::Ndm`] and call
/// [`NdmController::stats`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CongestionControlStats {
    pub algorithm: CongestionControlAlgorithm,
    pub ssthresh: u32,
    /// Window recorded at the last loss.
    pub prior_cwnd: u32,
    pub min_rtt: Option<Duration>,
    pub total_acks: u64,
    pub total_losses: u64,
    pub total_undos: u64,
}

// =============================================================================
// Configuration
// =============================================================================

/// Selects and configures the controller for new connections.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CongestionControlConfig {
    pub algorithm: CongestionControlAlgorithm,
    /// Tuning for [`CongestionControlAlgorithm::Ndm`]; ignored by Reno.
    pub ndm: NdmConfig,
}

impl CongestionControlConfig {
    pub fn new(algorithm: CongestionControlAlgorithm) -> Self {
        Self {
            algorithm,
            ndm: NdmConfig::default(),
        }
    }

    pub fn from_ndm_config(config: NdmConfig) -> Self {
        Self {
            algorithm: CongestionControlAlgorithm::Ndm,
            ndm: config,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.algorithm {
            CongestionControlAlgorithm::Ndm => self.ndm.validate(),
            CongestionControlAlgorithm::Reno => Ok(()),
        }
    }

    /// Create the controller for a new connection.
    ///
    /// An `initial_threshold` of zero means "no threshold" (infinite ssthresh).
    pub fn build(
        &self,
        initial_window: u32,
        initial_threshold: u32,
    ) -> Result<CongestionController, ConfigError> {
        self.validate()?;
        Ok(match self.algorithm {
            CongestionControlAlgorithm::Ndm => CongestionController::Ndm(Box::new(
                NdmController::new(self.ndm.clone(), initial_window, initial_threshold),
            )),
            CongestionControlAlgorithm::Reno => CongestionController::Reno(RenoController::new(
                initial_window,
                initial_threshold,
            )),
        })
    }
}

// =============================================================================
// Enum dispatch
// =============================================================================

/// Static dispatch over the available controllers.
#[derive(Debug)]
pub enum CongestionController {
    Ndm(Box<NdmController>),
    Reno(RenoController),
}

impl CongestionController {
    /// NDM-specific statistics, if this is an NDM controller.
    pub fn ndm_stats(&self) -> Option<NdmStats> {
        match self {
            CongestionController::Ndm(c) => Some(c.stats()),
            CongestionController::Reno(_) => None,
        }
    }
}

impl CongestionControl for CongestionController {
    fn on_ack(&mut self, ack: AckSample) -> GrowthDirective {
        match self {
            CongestionController::Ndm(c) => c.on_ack(ack),
            CongestionController::Reno(c) => c.on_ack(ack),
        }
    }

    fn on_loss(&mut self, cwnd: u32) -> u32 {
        match self {
            CongestionController::Ndm(c) => c.on_loss(cwnd),
            CongestionController::Reno(c) => c.on_loss(cwnd),
        }
    }

    fn on_undo(&mut self, cwnd: u32) -> u32 {
        match self {
            CongestionController::Ndm(c) => c.on_undo(cwnd),
            CongestionController::Reno(c) => c.on_undo(cwnd),
        }
    }

    fn on_event(&mut self, event: CaEvent) {
        match self {
            CongestionController::Ndm(c) => c.on_event(event),
            CongestionController::Reno(c) => c.on_event(event),
        }
    }

    fn on_state(&mut self, state: CaState) {
        match self {
            CongestionController::Ndm(c) => c.on_state(state),
            CongestionController::Reno(_) => {}
        }
    }

    fn ssthresh(&self) -> u32 {
        match self {
            CongestionController::Ndm(c) => c.ssthresh(),
            CongestionController::Reno(c) => c.ssthresh(),
        }
    }

    fn export_diagnostics(&self) -> Diagnostics {
        match self {
            CongestionController::Ndm(c) => c.export_diagnostics(),
            CongestionController::Reno(c) => c.export_diagnostics(),
        }
    }

    fn stats(&self) -> CongestionControlStats {
        match self {
            CongestionController::Ndm(c) => c.common_stats(),
            CongestionController::Reno(c) => c.stats(),
        }
    }

    fn algorithm(&self) -> CongestionControlAlgorithm {
        match self {
            CongestionController::Ndm(_) => CongestionControlAlgorithm::Ndm,
            CongestionController::Reno(_) => CongestionControlAlgorithm::Reno,
        }
    }
}
