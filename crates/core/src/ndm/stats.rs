//! NDM-TCP statistics snapshot.

use std::time::Duration;

use serde::Serialize;

use super::config::{Precision, INFINITE_SSTHRESH};
use super::predictor::HiddenState;
use super::state::{Phase, Signals};

/// Snapshot of an [`NdmController`](super::NdmController) for telemetry and debugging.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NdmStats {
    pub precision: Precision,
    pub phase: Phase,
    /// Current slow-start threshold (segments).
    pub ssthresh: u32,
    /// Window recorded at the last loss.
    pub prior_cwnd: u32,
    pub min_rtt: Option<Duration>,
    /// Valid samples in the RTT history.
    pub sample_count: u32,
    pub entropy: u16,
    pub entropy_scale: u16,
    pub plasticity: u16,
    /// Last congestion-pressure output.
    pub signal: u16,
    pub signal_unit: u16,
    pub hidden: HiddenState,
    pub signals: Signals,
    pub total_acks: u64,
    pub entropy_refreshes: u64,
    pub predictor_runs: u64,
    /// Acknowledgments answered from the cached signal.
    pub predictor_skips: u64,
    pub total_losses: u64,
    pub total_undos: u64,
    pub idle_restarts: u64,
}

impl NdmStats {
    /// Fraction of predictor invocations served by the fast path.
    pub fn skip_ratio(&self) -> f64 {
        let total = self.predictor_runs + self.predictor_skips;
        if total == 0 {
            0.0
        } else {
            self.predictor_skips as f64 / total as f64
        }
    }
}

impl std::fmt::Display for NdmStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "NDM[{}] ssthresh={} entropy={}/{} {} plasticity={} signal={:.2} rtt={:?} samples={}",
            self.phase,
            format_segments(self.ssthresh),
            self.entropy,
            self.entropy_scale,
            if self.signals.congestion_detected {
                "congestion"
            } else {
                "noise"
            },
            self.plasticity,
            self.signal as f64 / self.signal_unit.max(1) as f64,
            self.min_rtt,
            self.sample_count,
        )
    }
}

fn format_segments(segments: u32) -> String {
    if segments >= INFINITE_SSTHRESH {
        "inf".to_string()
    } else {
        format!("{segments}seg")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats() -> NdmStats {
        NdmStats {
            precision: Precision::Standard,
            phase: Phase::CongestionAvoidance,
            ssthresh: 20,
            prior_cwnd: 40,
            min_rtt: Some(Duration::from_millis(20)),
            sample_count: 16,
            entropy: 333,
            entropy_scale: 1000,
            plasticity: 407,
            signal: 768,
            signal_unit: 1024,
            hidden: [0; 4],
            signals: Signals::default(),
            total_acks: 100,
            entropy_refreshes: 12,
            predictor_runs: 75,
            predictor_skips: 25,
            total_losses: 1,
            total_undos: 0,
            idle_restarts: 0,
        }
    }

    #[test]
    fn test_stats_display() {
        let display = stats().to_string();
        assert!(display.contains("NDM[CongestionAvoidance]"));
        assert!(display.contains("ssthresh=20seg"));
        assert!(display.contains("entropy=333/1000 noise"));
        assert!(display.contains("signal=0.75"));
        assert!(display.contains("rtt=Some(20ms)"));
    }

    #[test]
    fn test_infinite_ssthresh_display() {
        let stats = NdmStats {
            ssthresh: INFINITE_SSTHRESH,
            ..stats()
        };
        assert!(stats.to_string().contains("ssthresh=inf"));
    }

    #[test]
    fn test_skip_ratio() {
        assert!((stats().skip_ratio() - 0.25).abs() < f64::EPSILON);
        let idle = NdmStats {
            predictor_runs: 0,
            predictor_skips: 0,
            ..stats()
        };
        assert_eq!(idle.skip_ratio(), 0.0);
    }

    #[test]
    fn test_serializes() {
        let json = serde_json::to_value(stats()).unwrap();
        assert_eq!(json["phase"], "congestion_avoidance");
        assert_eq!(json["precision"], "standard");
        assert_eq!(json["entropy"], 333);
    }
}
