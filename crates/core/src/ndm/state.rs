//! Per-connection state and the growth phase machine.
//!
//! ```text
//!                cwnd >= ssthresh
//!   ┌───────────┐ ───────────────▶ ┌──────────────────────┐
//!   │ SlowStart │                  │ CongestionAvoidance  │
//!   └───────────┘ ◀─────────────── └──────────────────────┘
//!                 cwnd < ssthresh
//!                 (loss, undo)
//! ```
//!
//! The phase is derived from the window on every acknowledgment and after an undo; no event
//! sets it directly.

use serde::Serialize;

use super::config::{NdmConfig, HIDDEN_UNITS, HOST_STATE_BUDGET, INFINITE_SSTHRESH};
use super::history::RttHistory;
use super::plasticity::Plasticity;
use super::predictor::HiddenState;

/// Window growth regime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum Phase {
    #[default]
    SlowStart = 0,
    CongestionAvoidance = 1,
}

impl Phase {
    pub fn from_window(cwnd: u32, ssthresh: u32) -> Self {
        if cwnd < ssthresh {
            Phase::SlowStart
        } else {
            Phase::CongestionAvoidance
        }
    }

    pub fn is_slow_start(self) -> bool {
        self == Phase::SlowStart
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::SlowStart => write!(f, "SlowStart"),
            Phase::CongestionAvoidance => write!(f, "CongestionAvoidance"),
        }
    }
}

/// Derived classification flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Signals {
    /// Entropy has been computed from at least `min_samples` samples.
    pub has_enough_data: bool,
    /// Low entropy or a loss since the last refresh.
    pub congestion_detected: bool,
    /// A loss was seen since the last refresh.
    pub loss_recent: bool,
}

impl Signals {
    pub(crate) fn mark_loss(&mut self) {
        self.congestion_detected = true;
        self.loss_recent = true;
    }
}

/// Everything the engine keeps for one connection.
#[derive(Debug, Clone)]
pub(crate) struct ConnectionState {
    /// Smallest RTT seen in µs, `u32::MAX` until the first sample.
    pub min_rtt_us: u32,
    pub ssthresh: u32,
    pub prior_cwnd: u32,
    pub history: RttHistory,
    pub hidden: HiddenState,
    pub entropy: u16,
    pub plasticity: Plasticity,
    pub cached_signal: u16,
    pub acks_since_refresh: u16,
    /// Slow-start credit withheld by a previous halved round.
    pub slow_start_carry: u16,
    pub consecutive_skips: u8,
    pub phase: Phase,
    pub signals: Signals,
}

const _: () = assert!(
    std::mem::size_of::<ConnectionState>() <= HOST_STATE_BUDGET,
    "per-connection state exceeds the host budget"
);

impl ConnectionState {
    pub fn new(config: &NdmConfig, initial_window: u32, initial_threshold: u32) -> Self {
        let ssthresh = match initial_threshold {
            0 => INFINITE_SSTHRESH,
            t => t.min(INFINITE_SSTHRESH),
        };
        Self {
            min_rtt_us: u32::MAX,
            ssthresh,
            prior_cwnd: initial_window,
            history: RttHistory::new(config.history_capacity),
            hidden: [0; HIDDEN_UNITS],
            entropy: 0,
            plasticity: Plasticity::new(&config.plasticity),
            cached_signal: config.signal_unit / 2,
            acks_since_refresh: 0,
            slow_start_carry: 0,
            consecutive_skips: 0,
            phase: Phase::from_window(initial_window, ssthresh),
            signals: Signals::default(),
        }
    }

    pub fn min_rtt_known(&self) -> bool {
        self.min_rtt_us != u32::MAX
    }
}
