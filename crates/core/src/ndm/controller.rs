//! NDM-TCP controller.

use std::time::Duration;

use crate::congestion_control::{
    AckSample, CaEvent, CaState, CongestionControlAlgorithm, CongestionControlStats,
    Diagnostics, GrowthDirective,
};

use super::config::NdmConfig;
use super::entropy::EntropyEstimator;
use super::history::quantize;
use super::predictor::{self, Features, HiddenState, Observation, PredictorWeights};
use super::state::{ConnectionState, Phase, Signals};
use super::stats::NdmStats;
use super::DEFAULT_WEIGHTS;

/// Entropy-aware congestion controller for a single connection.
///
/// All callbacks take `&mut self`; the controller is owned by whatever processes the
/// connection's events and is never shared. Weights are `'static` and shared by every
/// controller.
#[derive(Debug)]
pub struct NdmController {
    config: NdmConfig,
    estimator: EntropyEstimator,
    weights: &'static PredictorWeights,
    pub(crate) state: ConnectionState,

    // Statistics
    total_acks: u64,
    entropy_refreshes: u64,
    predictor_runs: u64,
    predictor_skips: u64,
    total_losses: u64,
    total_undos: u64,
    idle_restarts: u64,
}

impl NdmController {
    /// Create a controller with the built-in weights.
    ///
    /// An `initial_threshold` of zero means "no threshold".
    ///
    /// # Panics
    ///
    /// If `config` fails [`NdmConfig::validate`].
    pub fn new(config: NdmConfig, initial_window: u32, initial_threshold: u32) -> Self {
        Self::with_weights(config, &DEFAULT_WEIGHTS, initial_window, initial_threshold)
    }

    pub fn with_weights(
        config: NdmConfig,
        weights: &'static PredictorWeights,
        initial_window: u32,
        initial_threshold: u32,
    ) -> Self {
        if let Err(err) = config.validate() {
            panic!("invalid NDM configuration: {err}");
        }
        let state = ConnectionState::new(&config, initial_window, initial_threshold);
        Self {
            estimator: EntropyEstimator::from_config(&config),
            weights,
            state,
            config,
            total_acks: 0,
            entropy_refreshes: 0,
            predictor_runs: 0,
            predictor_skips: 0,
            total_losses: 0,
            total_undos: 0,
            idle_restarts: 0,
        }
    }

    // =========================================================================
    // Acknowledgments
    // =========================================================================

    /// Process one acknowledgment and decide how the window grows.
    pub fn on_ack(&mut self, ack: AckSample) -> GrowthDirective {
        if ack.acked == 0 {
            return GrowthDirective::Hold;
        }
        self.total_acks += 1;

        let rtt_us = micros(ack.rtt);
        if !ack.rtt.is_zero() {
            self.state.min_rtt_us = self.state.min_rtt_us.min(rtt_us);
            self.state.history.push(quantize(
                rtt_us,
                self.state.min_rtt_us,
                self.config.rtt_quantum_us,
                self.config.max_quantized_rtt,
            ));
        }

        self.state.acks_since_refresh = self.state.acks_since_refresh.saturating_add(1);
        if self.state.acks_since_refresh >= self.config.refresh_interval {
            self.refresh_entropy();
        }

        self.state.phase = Phase::from_window(ack.cwnd, self.state.ssthresh);

        if !ack.window_limited {
            return GrowthDirective::Hold;
        }

        let signal = self.congestion_signal(rtt_us);
        let directive = self.actuate(ack.acked, signal);
        self.state
            .plasticity
            .decay(&self.config.plasticity);
        directive
    }

    fn refresh_entropy(&mut self) {
        let state = &mut self.state;
        state.acks_since_refresh = 0;
        state.signals.loss_recent = false;
        self.entropy_refreshes += 1;

        let was_congested = state.signals.congestion_detected;
        match self.estimator.estimate(&state.history) {
            Some(entropy) => {
                state.entropy = entropy;
                state.signals.has_enough_data = true;
                state.signals.congestion_detected = entropy < self.config.entropy_threshold;
            }
            None => {
                state.entropy = 0;
                state.signals.congestion_detected = false;
            }
        }

        if was_congested != state.signals.congestion_detected {
            tracing::debug!(
                entropy = state.entropy,
                threshold = self.config.entropy_threshold,
                samples = state.history.len(),
                congestion_detected = state.signals.congestion_detected,
                "Entropy classification changed"
            );
        }
    }

    /// Cached signal on the fast path, otherwise a fresh predictor run.
    fn congestion_signal(&mut self, rtt_us: u32) -> u16 {
        let skip = &self.config.skip;
        let state = &mut self.state;
        if state.entropy < skip.entropy_ceiling
            && state.plasticity.value() > skip.plasticity_floor
            && state.consecutive_skips < skip.max_consecutive
        {
            state.consecutive_skips += 1;
            self.predictor_skips += 1;
            return state.cached_signal;
        }

        let observation = Observation {
            rtt_us,
            min_rtt_us: state.min_rtt_us,
            entropy: state.entropy,
            entropy_scale: self.config.entropy_scale,
            plasticity: state.plasticity.value(),
            plasticity_ceiling: self.config.plasticity.ceiling,
            slow_start: state.phase.is_slow_start(),
            congestion_detected: state.signals.congestion_detected,
            loss_recent: state.signals.loss_recent,
        };
        let unit = self.config.signal_unit;
        let features = Features::normalize(&observation, unit);
        let damped = state.entropy > self.config.entropy_threshold;
        let prediction =
            predictor::forward(self.weights, &features, &state.hidden, unit, damped);

        state.hidden = prediction.hidden;
        state.cached_signal = prediction.signal;
        state.consecutive_skips = 0;
        self.predictor_runs += 1;

        tracing::trace!(signal = prediction.signal, damped, "Predictor run");
        prediction.signal
    }

    fn actuate(&mut self, acked: u32, signal: u16) -> GrowthDirective {
        let config = &self.config;
        let state = &mut self.state;
        let congestion = state.signals.congestion_detected;

        match state.phase {
            Phase::SlowStart if congestion => {
                let divisor = config.slow_start_congestion_divisor;
                let total = acked.saturating_add(state.slow_start_carry as u32);
                state.slow_start_carry = (total % divisor).min(u16::MAX as u32) as u16;
                match total / divisor {
                    0 => GrowthDirective::Hold,
                    acked => GrowthDirective::SlowStart { acked },
                }
            }
            Phase::SlowStart => GrowthDirective::SlowStart { acked },
            Phase::CongestionAvoidance if state.signals.has_enough_data => {
                let divisor = if congestion {
                    config.conservative_growth_divisor
                } else {
                    config.aggressive_growth_divisor
                };
                let step = acked as u64 * signal as u64
                    / (config.signal_unit as u64 * divisor as u64);
                GrowthDirective::AdditiveIncrease {
                    step: step.clamp(1, u32::MAX as u64) as u32,
                }
            }
            Phase::CongestionAvoidance => GrowthDirective::Reno { acked },
        }
    }

    // =========================================================================
    // Loss, undo and events
    // =========================================================================

    /// Loss or backoff: returns the new ssthresh and remembers `cwnd` for undo.
    pub fn on_loss(&mut self, cwnd: u32) -> u32 {
        let config = &self.config;
        let state = &mut self.state;
        state.signals.mark_loss();
        state
            .plasticity
            .boost(config.plasticity.loss_boost, &config.plasticity);

        let noisy = state.entropy > config.entropy_threshold
            && state.plasticity.value() < config.reactive_plasticity;
        let divisor = if noisy {
            config.gentle_reduction_divisor
        } else {
            config.standard_reduction_divisor
        };
        let ssthresh = (cwnd / divisor).max(config.min_ssthresh);

        state.ssthresh = ssthresh;
        state.prior_cwnd = cwnd;
        self.total_losses += 1;

        tracing::debug!(
            cwnd,
            ssthresh,
            divisor,
            entropy = state.entropy,
            plasticity = state.plasticity.value(),
            "Loss: reducing ssthresh"
        );
        ssthresh
    }

    /// Spurious loss: the window goes back to at least what it was before the loss.
    pub fn on_undo(&mut self, cwnd: u32) -> u32 {
        let restored = cwnd.max(self.state.prior_cwnd);
        self.state.phase = Phase::from_window(restored, self.state.ssthresh);
        self.total_undos += 1;

        tracing::debug!(
            cwnd,
            restored,
            prior_cwnd = self.state.prior_cwnd,
            phase = %self.state.phase,
            "Undo: restoring window"
        );
        restored
    }

    pub fn on_event(&mut self, event: CaEvent) {
        match event {
            CaEvent::Loss => self.state.signals.mark_loss(),
            CaEvent::RestartAfterIdle => {
                self.state.plasticity.reset(&self.config.plasticity);
                self.idle_restarts += 1;
                tracing::debug!(
                    plasticity = self.state.plasticity.value(),
                    "Restart after idle: plasticity reset"
                );
            }
        }
    }

    /// Only entering [`CaState::Loss`] affects the engine.
    pub fn on_state(&mut self, ca_state: CaState) {
        if ca_state == CaState::Loss {
            let params = &self.config.plasticity;
            self.state.signals.mark_loss();
            self.state.plasticity.boost(params.state_loss_boost, params);
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &NdmConfig {
        &self.config
    }

    pub fn ssthresh(&self) -> u32 {
        self.state.ssthresh
    }

    pub fn prior_cwnd(&self) -> u32 {
        self.state.prior_cwnd
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn entropy(&self) -> u16 {
        self.state.entropy
    }

    pub fn plasticity(&self) -> u16 {
        self.state.plasticity.value()
    }

    pub fn signals(&self) -> Signals {
        self.state.signals
    }

    pub fn cached_signal(&self) -> u16 {
        self.state.cached_signal
    }

    pub fn hidden(&self) -> HiddenState {
        self.state.hidden
    }

    pub fn consecutive_skips(&self) -> u8 {
        self.state.consecutive_skips
    }

    pub fn min_rtt(&self) -> Option<Duration> {
        self.state
            .min_rtt_known()
            .then(|| Duration::from_micros(self.state.min_rtt_us as u64))
    }

    pub fn export_diagnostics(&self) -> Diagnostics {
        Diagnostics {
            sample_count: self.state.history.len() as u32,
            min_rtt: self.min_rtt(),
            entropy: self.state.entropy,
        }
    }

    pub fn stats(&self) -> NdmStats {
        NdmStats {
            precision: self.config.precision,
            phase: self.state.phase,
            ssthresh: self.state.ssthresh,
            prior_cwnd: self.state.prior_cwnd,
            min_rtt: self.min_rtt(),
            sample_count: self.state.history.len() as u32,
            entropy: self.state.entropy,
            entropy_scale: self.config.entropy_scale,
            plasticity: self.state.plasticity.value(),
            signal: self.state.cached_signal,
            signal_unit: self.config.signal_unit,
            hidden: self.state.hidden,
            signals: self.state.signals,
            total_acks: self.total_acks,
            entropy_refreshes: self.entropy_refreshes,
            predictor_runs: self.predictor_runs,
            predictor_skips: self.predictor_skips,
            total_losses: self.total_losses,
            total_undos: self.total_undos,
            idle_restarts: self.idle_restarts,
        }
    }

    pub(crate) fn common_stats(&self) -> CongestionControlStats {
        CongestionControlStats {
            algorithm: CongestionControlAlgorithm::Ndm,
            ssthresh: self.state.ssthresh,
            prior_cwnd: self.state.prior_cwnd,
            min_rtt: self.min_rtt(),
            total_acks: self.total_acks,
            total_losses: self.total_losses,
            total_undos: self.total_undos,
        }
    }
}

fn micros(rtt: Duration) -> u32 {
    rtt.as_micros().clamp(1, u32::MAX as u128 - 1) as u32
}
