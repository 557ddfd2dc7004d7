//! Deterministic synthetic traces.
//!
//! [`TraceGenerator`] turns a [`NetworkProfile`] and a seed into a [`TraceEvent`] sequence
//! with the same shape every time, so replays are reproducible.

use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::replay::TraceEvent;

/// RTT and loss behavior of a simulated path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkProfile {
    pub base_rtt: Duration,
    /// Uniform jitter as a fraction of the base RTT, e.g. 0.1 for ±10%.
    pub jitter: f64,
    /// Queue build-up per acknowledgment; drained by every loss.
    pub queue_growth: Duration,
    /// Probability that an acknowledgment is followed by a loss.
    pub loss_rate: f64,
    /// Probability that a loss turns out to be spurious and is undone.
    pub spurious_loss_ratio: f64,
}

impl NetworkProfile {
    /// LAN: 1ms RTT, ±2% jitter, no loss.
    pub const LAN: Self = Self {
        base_rtt: Duration::from_millis(1),
        jitter: 0.02,
        queue_growth: Duration::ZERO,
        loss_rate: 0.0,
        spurious_loss_ratio: 0.0,
    };

    /// Datacenter: 10ms RTT, ±5% jitter, 0.1% loss.
    pub const DATACENTER: Self = Self {
        base_rtt: Duration::from_millis(10),
        jitter: 0.05,
        queue_growth: Duration::ZERO,
        loss_rate: 0.001,
        spurious_loss_ratio: 0.0,
    };

    /// Wireless: 30ms RTT, ±40% jitter, 1% loss of which half is spurious.
    pub const WIRELESS: Self = Self {
        base_rtt: Duration::from_millis(30),
        jitter: 0.4,
        queue_growth: Duration::ZERO,
        loss_rate: 0.01,
        spurious_loss_ratio: 0.5,
    };

    /// Bufferbloat: 40ms base RTT growing 200µs per ack until a loss drains the queue.
    pub const BUFFERBLOAT: Self = Self {
        base_rtt: Duration::from_millis(40),
        jitter: 0.0,
        queue_growth: Duration::from_micros(200),
        loss_rate: 0.005,
        spurious_loss_ratio: 0.0,
    };

    /// Intercontinental: 135ms RTT, ±20% jitter, 0.5% loss.
    ///
    /// The ±27 ms swing exceeds the compact profile's ~8 ms quantization span, so under
    /// [`Precision::Compact`](crate::ndm::Precision::Compact) much of it saturates.
    pub const INTERCONTINENTAL: Self = Self {
        base_rtt: Duration::from_millis(135),
        jitter: 0.2,
        queue_growth: Duration::ZERO,
        loss_rate: 0.005,
        spurious_loss_ratio: 0.1,
    };
}

/// Named profiles for the command line.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkPreset {
    Lan,
    #[default]
    Datacenter,
    Wireless,
    Bufferbloat,
    Intercontinental,
}

impl NetworkPreset {
    pub fn profile(self) -> NetworkProfile {
        match self {
            NetworkPreset::Lan => NetworkProfile::LAN,
            NetworkPreset::Datacenter => NetworkProfile::DATACENTER,
            NetworkPreset::Wireless => NetworkProfile::WIRELESS,
            NetworkPreset::Bufferbloat => NetworkProfile::BUFFERBLOAT,
            NetworkPreset::Intercontinental => NetworkProfile::INTERCONTINENTAL,
        }
    }
}

/// Seeded trace generator.
#[derive(Debug)]
pub struct TraceGenerator {
    profile: NetworkProfile,
    rng: SmallRng,
    queue: Duration,
}

impl TraceGenerator {
    pub fn new(profile: NetworkProfile, seed: u64) -> Self {
        Self {
            profile,
            rng: SmallRng::seed_from_u64(seed),
            queue: Duration::ZERO,
        }
    }

    /// Next RTT sample in microseconds, never zero.
    pub fn next_rtt_us(&mut self) -> u64 {
        let base = (self.profile.base_rtt + self.queue).as_micros() as f64;
        let jitter = self.profile.jitter.clamp(0.0, 0.99);
        let factor = if jitter > 0.0 {
            self.rng.gen_range(1.0 - jitter..=1.0 + jitter)
        } else {
            1.0
        };
        self.queue += self.profile.queue_growth;
        ((base * factor) as u64).max(1)
    }

    /// `acks` acknowledgments interleaved with the losses and undos the profile produces.
    pub fn generate(&mut self, acks: usize) -> Vec<TraceEvent> {
        let mut events = Vec::with_capacity(acks + acks / 16);
        for _ in 0..acks {
            let rtt_us = self.next_rtt_us();
            let acked = self.rng.gen_range(1..=2);
            events.push(TraceEvent::Ack {
                acked,
                rtt_us,
                window_limited: true,
            });

            if self.profile.loss_rate > 0.0 && self.rng.gen_bool(self.profile.loss_rate.min(1.0)) {
                events.push(TraceEvent::Loss { timeout: false });
                self.queue = Duration::ZERO;
                let spurious = self.profile.spurious_loss_ratio.clamp(0.0, 1.0);
                if spurious > 0.0 && self.rng.gen_bool(spurious) {
                    events.push(TraceEvent::Undo);
                }
            }
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_trace() {
        let a = TraceGenerator::new(NetworkProfile::WIRELESS, 7).generate(500);
        let b = TraceGenerator::new(NetworkProfile::WIRELESS, 7).generate(500);
        let c = TraceGenerator::new(NetworkProfile::WIRELESS, 8).generate(500);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_lan_has_no_losses() {
        let events = TraceGenerator::new(NetworkProfile::LAN, 1).generate(200);
        assert_eq!(events.len(), 200);
        assert!(events
            .iter()
            .all(|e| matches!(e, TraceEvent::Ack { rtt_us, .. } if *rtt_us >= 980 && *rtt_us <= 1020)));
    }

    #[test]
    fn test_bufferbloat_ramps() {
        let profile = NetworkProfile {
            loss_rate: 0.0,
            ..NetworkProfile::BUFFERBLOAT
        };
        let mut generator = TraceGenerator::new(profile, 3);
        let first = generator.next_rtt_us();
        let second = generator.next_rtt_us();
        assert_eq!(first, 40_000);
        assert_eq!(second, 40_200);
    }

    #[test]
    fn test_generator_debug_shows_profile() {
        let generator = TraceGenerator::new(NetworkProfile::LAN, 5);
        let debug = format!("{generator:?}");
        assert!(debug.starts_with("TraceGenerator"));
        assert!(debug.contains("base_rtt"));
    }

    #[test]
    fn test_every_preset_has_a_profile() {
        for preset in [
            NetworkPreset::Lan,
            NetworkPreset::Datacenter,
            NetworkPreset::Wireless,
            NetworkPreset::Bufferbloat,
            NetworkPreset::Intercontinental,
        ] {
            assert!(preset.profile().base_rtt > Duration::ZERO);
        }
    }
}
