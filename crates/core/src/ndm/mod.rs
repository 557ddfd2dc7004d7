//! NDM-TCP: entropy-aware congestion control.
//!
//! Loss-based controllers treat every RTT excursion and every loss the same way. On
//! wireless or virtualized paths much of that variability is noise. NDM-TCP keeps a short
//! history of quantized RTTs and measures how *disordered* it is:
//!
//! - **Low entropy**: RTTs cluster or move together. Treated as a real congestion trend.
//! - **High entropy**: RTTs scatter across their range. Treated as noise and largely ignored.
//!
//! That classification biases a small fixed-weight recurrent predictor whose output scales
//! the additive increase.
//!
//! ## Per-acknowledgment pipeline
//!
//! ```text
//!   AckSample
//!      │
//!      ▼
//!   min_rtt, RttHistory::push ──every K acks──▶ EntropyEstimator ──▶ congestion_detected
//!      │                                                                     │
//!      ▼                                                                     ▼
//!   Phase::from_window(cwnd, ssthresh)            fast path? ──yes──▶ cached signal
//!      │                                              │no
//!      │                                              ▼
//!      │                                       predictor::forward ──▶ signal, hidden'
//!      ▼                                              │
//!   actuate(phase, congestion, signal) ◀──────────────┘
//!      │
//!      ▼
//!   GrowthDirective, Plasticity::decay
//! ```
//!
//! ## Growth and reduction
//!
//! | Situation | Directive |
//! |-----------|-----------|
//! | Slow start, noise | `SlowStart { acked }` |
//! | Slow start, congestion | `SlowStart { acked / 2 }` (remainder carried) |
//! | Avoidance, noise | `AdditiveIncrease { acked · signal / unit }` |
//! | Avoidance, congestion | `AdditiveIncrease { acked · signal / (2 · unit) }` |
//! | Avoidance, < `min_samples` | `Reno { acked }` |
//! | Loss, entropy above threshold | `ssthresh = cwnd / 3` |
//! | Loss, otherwise or plasticity ≥ reactive | `ssthresh = cwnd / 2` |
//!
//! ## Precision profiles
//!
//! [`Precision::Standard`] and [`Precision::Compact`] run the same code with different
//! fixed-point units and scales. Every constant lives in [`NdmConfig`].
//!
//! ## Memory
//!
//! Per-connection state is a plain struct checked at compile time against
//! [`HOST_STATE_BUDGET`]. Weights and activation tables are `static` and shared.

mod activation;
mod config;
mod controller;
mod entropy;
mod history;
mod plasticity;
mod predictor;
mod state;
mod stats;

#[cfg(test)]
mod tests;

// Re-export public API
pub use config::{
    EntropyMethod, NdmConfig, PlasticityParams, Precision, SkipPolicy, HOST_STATE_BUDGET,
    INFINITE_SSTHRESH,
};
pub use controller::NdmController;
pub use entropy::EntropyEstimator;
pub use history::RttHistory;
pub use predictor::{
    forward, Features, HiddenState, Observation, Prediction, PredictorWeights, DEFAULT_WEIGHTS,
};
pub use state::{Phase, Signals};
pub use stats::NdmStats;
