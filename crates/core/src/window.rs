//! Reference host window.
//!
//! The decision engine never touches the congestion window itself. [`TransportWindow`] is the
//! host side of the contract: it applies [`GrowthDirective`]s with the standard slow-start and
//! additive-increase arithmetic, and handles loss recovery and undo. The replay tool and the
//! tests drive controllers through it.
//!
//! Windows are counted in segments.

use serde::Serialize;

use crate::congestion_control::GrowthDirective;
use crate::ndm::INFINITE_SSTHRESH;

/// Upper bound on the window unless configured otherwise.
pub const DEFAULT_WINDOW_CLAMP: u32 = 65_535;

/// Congestion window with slow start, additive increase and recovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransportWindow {
    cwnd: u32,
    ssthresh: u32,
    /// Credits toward the next one-segment additive increase.
    cwnd_cnt: u32,
    clamp: u32,
    /// ssthresh before the last loss, restored by undo.
    prior_ssthresh: u32,
}

impl TransportWindow {
    /// An `initial_threshold` of zero means "no threshold".
    pub fn new(initial_window: u32, initial_threshold: u32) -> Self {
        let ssthresh = match initial_threshold {
            0 => INFINITE_SSTHRESH,
            t => t,
        };
        Self {
            cwnd: initial_window.max(1),
            ssthresh,
            cwnd_cnt: 0,
            clamp: DEFAULT_WINDOW_CLAMP,
            prior_ssthresh: ssthresh,
        }
    }

    pub fn with_clamp(mut self, clamp: u32) -> Self {
        self.clamp = clamp.max(1);
        self.cwnd = self.cwnd.min(self.clamp);
        self
    }

    pub fn cwnd(&self) -> u32 {
        self.cwnd
    }

    pub fn ssthresh(&self) -> u32 {
        self.ssthresh
    }

    pub fn in_slow_start(&self) -> bool {
        self.cwnd < self.ssthresh
    }

    /// Apply a growth directive; returns the new window.
    pub fn apply(&mut self, directive: GrowthDirective) -> u32 {
        match directive {
            GrowthDirective::SlowStart { acked } => {
                let leftover = self.slow_start(acked);
                if leftover > 0 {
                    self.cong_avoid_ai(self.cwnd, leftover);
                }
            }
            GrowthDirective::AdditiveIncrease { step } => self.cong_avoid_ai(self.cwnd, step),
            GrowthDirective::Reno { acked } => self.reno(acked),
            GrowthDirective::Hold => {}
        }
        self.cwnd
    }

    /// Grow by `acked` segments without crossing ssthresh; returns the unused part.
    pub fn slow_start(&mut self, acked: u32) -> u32 {
        let target = self.cwnd.saturating_add(acked).min(self.ssthresh);
        let used = target.saturating_sub(self.cwnd);
        self.cwnd = target.min(self.clamp).max(self.cwnd.min(self.clamp));
        acked - used.min(acked)
    }

    /// Add `acked` credits; each `w` credits grow the window by one segment.
    pub fn cong_avoid_ai(&mut self, w: u32, acked: u32) {
        let w = w.max(1);
        if self.cwnd_cnt >= w {
            self.cwnd_cnt = 0;
            self.cwnd = self.cwnd.saturating_add(1);
        }
        self.cwnd_cnt = self.cwnd_cnt.saturating_add(acked);
        if self.cwnd_cnt >= w {
            let delta = self.cwnd_cnt / w;
            self.cwnd_cnt -= delta * w;
            self.cwnd = self.cwnd.saturating_add(delta);
        }
        self.cwnd = self.cwnd.min(self.clamp);
    }

    /// Standard Reno increase: slow start below ssthresh, then one segment per window.
    pub fn reno(&mut self, acked: u32) {
        let mut acked = acked;
        if self.in_slow_start() {
            acked = self.slow_start(acked);
            if acked == 0 {
                return;
            }
        }
        self.cong_avoid_ai(self.cwnd, acked);
    }

    /// Install the controller's new ssthresh. A timeout collapses the window to one segment,
    /// fast recovery ends at the new threshold.
    pub fn enter_recovery(&mut self, new_ssthresh: u32, timeout: bool) {
        self.prior_ssthresh = self.ssthresh;
        self.ssthresh = new_ssthresh;
        let cwnd = if timeout { 1 } else { new_ssthresh.max(1) };
        self.cwnd = cwnd.min(self.clamp);
        self.cwnd_cnt = 0;
    }

    /// Undo a spurious reduction with the controller's restored window.
    pub fn undo(&mut self, restored: u32) {
        self.cwnd = restored.clamp(1, self.clamp);
        self.ssthresh = self.ssthresh.max(self.prior_ssthresh);
    }
}
