//! Reno fallback controller.
//!
//! Halves ssthresh on loss and hands every growth decision back to the host's standard
//! rule. Useful as a baseline when comparing NDM-TCP on the same trace, and as a fallback
//! when the adaptive engine is not wanted.

use std::time::Duration;

use crate::congestion_control::{
    AckSample, CaEvent, CongestionControlAlgorithm, CongestionControlStats, Diagnostics,
    GrowthDirective,
};
use crate::ndm::INFINITE_SSTHRESH;

/// ssthresh never drops below this many segments.
const MIN_SSTHRESH: u32 = 2;

/// Classic loss-halving controller.
#[derive(Debug, Clone)]
pub struct RenoController {
    ssthresh: u32,
    prior_cwnd: u32,
    /// `u32::MAX` until the first sample.
    min_rtt_us: u32,
    total_acks: u64,
    total_losses: u64,
    total_undos: u64,
}

impl RenoController {
    pub fn new(initial_window: u32, initial_threshold: u32) -> Self {
        Self {
            ssthresh: match initial_threshold {
                0 => INFINITE_SSTHRESH,
                t => t.min(INFINITE_SSTHRESH),
            },
            prior_cwnd: initial_window,
            min_rtt_us: u32::MAX,
            total_acks: 0,
            total_losses: 0,
            total_undos: 0,
        }
    }

    /// Growth is left to the host; only the minimum RTT is tracked.
    pub fn on_ack(&mut self, ack: AckSample) -> GrowthDirective {
        if ack.acked == 0 {
            return GrowthDirective::Hold;
        }
        self.total_acks += 1;
        if !ack.rtt.is_zero() {
            let rtt_us = ack.rtt.as_micros().min(u32::MAX as u128 - 1) as u32;
            self.min_rtt_us = self.min_rtt_us.min(rtt_us);
        }
        if !ack.window_limited {
            return GrowthDirective::Hold;
        }
        GrowthDirective::Reno { acked: ack.acked }
    }

    pub fn on_loss(&mut self, cwnd: u32) -> u32 {
        self.ssthresh = (cwnd / 2).max(MIN_SSTHRESH);
        self.prior_cwnd = cwnd;
        self.total_losses += 1;
        tracing::debug!(cwnd, ssthresh = self.ssthresh, "Reno loss: halving");
        self.ssthresh
    }

    pub fn on_undo(&mut self, cwnd: u32) -> u32 {
        self.total_undos += 1;
        cwnd.max(self.prior_cwnd)
    }

    /// No discrete event changes Reno's state.
    pub fn on_event(&mut self, _event: CaEvent) {}

    pub fn ssthresh(&self) -> u32 {
        self.ssthresh
    }

    pub fn min_rtt(&self) -> Option<Duration> {
        (self.min_rtt_us != u32::MAX).then(|| Duration::from_micros(self.min_rtt_us as u64))
    }

    pub fn export_diagnostics(&self) -> Diagnostics {
        Diagnostics {
            sample_count: 0,
            min_rtt: self.min_rtt(),
            entropy: 0,
        }
    }

    pub fn stats(&self) -> CongestionControlStats {
        CongestionControlStats {
            algorithm: CongestionControlAlgorithm::Reno,
            ssthresh: self.ssthresh,
            prior_cwnd: self.prior_cwnd,
            min_rtt: self.min_rtt(),
            total_acks: self.total_acks,
            total_losses: self.total_losses,
            total_undos: self.total_undos,
        }
    }
}
