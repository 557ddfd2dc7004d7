//! NDM-TCP configuration and constants.

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

// ============================================================================
// Structural constants
// ============================================================================

/// Maximum number of RTT slots any profile may keep.
pub(crate) const MAX_HISTORY: usize = 16;

/// Upper bound on entropy histogram bins; the `c·log2 c` table covers counts up to 16.
pub(crate) const MAX_ENTROPY_BINS: u8 = 16;

/// Number of recurrent hidden units.
pub(crate) const HIDDEN_UNITS: usize = 4;

/// Number of normalized predictor inputs.
pub(crate) const INPUT_FEATURES: usize = 6;

/// Shift of the Q10 fixed-point format used by weights, tables and decay factors.
pub(crate) const Q10_SHIFT: u32 = 10;

/// 1.0 in Q10.
pub(crate) const Q10_ONE: i32 = 1 << Q10_SHIFT;

/// Largest fixed-point unit a profile may select (hidden activations are stored as `i16`).
pub(crate) const MAX_SIGNAL_UNIT: u16 = 4096;

/// Smallest fixed-point unit that still resolves the activation tables.
pub(crate) const MIN_SIGNAL_UNIT: u16 = 16;

/// ssthresh value meaning "no threshold yet".
pub const INFINITE_SSTHRESH: u32 = 0x7fff_ffff;

/// Per-connection storage the host reserves for congestion-control private data (bytes).
pub const HOST_STATE_BUDGET: usize = 104;

// ============================================================================
// Precision profiles
// ============================================================================

/// Numeric precision profile.
///
/// Both profiles run the same algorithm; they differ in fixed-point unit, entropy scale,
/// history width and quantization step.
#[derive(
    clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    /// 1024-unit signals, 16-sample history quantized to 1 ms.
    #[default]
    Standard,
    /// 128-unit signals, 8-sample history quantized to 32 µs.
    ///
    /// Samples saturate 255 steps (about 8.2 ms) above the minimum RTT. Jitter wider than
    /// that piles into the top bin and scores lower than it would under `Standard`.
    Compact,
}

impl Precision {
    pub fn preset(self) -> NdmConfig {
        match self {
            Precision::Standard => NdmConfig::standard(),
            Precision::Compact => NdmConfig::compact(),
        }
    }
}

impl std::fmt::Display for Precision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Precision::Standard => write!(f, "standard"),
            Precision::Compact => write!(f, "compact"),
        }
    }
}

impl std::str::FromStr for Precision {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "standard" => Ok(Precision::Standard),
            "compact" => Ok(Precision::Compact),
            _ => Err(ConfigError::UnknownPrecision(s.to_string())),
        }
    }
}

/// How the entropy estimator evaluates `log2`.
#[derive(
    clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EntropyMethod {
    /// Exact `c·log2 c` lookup for small occupancy counts.
    #[default]
    Lookup,
    /// Leading-zero bit length with a linear mantissa.
    BitLength,
}

// ============================================================================
// Plasticity and fast-path parameters
// ============================================================================

/// Plasticity controller tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlasticityParams {
    /// Value on connection start and after an idle restart.
    pub base: u16,
    pub floor: u16,
    pub ceiling: u16,
    /// Multiplicative decay per growth round, Q10 (1024 = no decay).
    pub decay_q10: u16,
    /// Added on an explicit loss/backoff.
    pub loss_boost: u16,
    /// Added when the host enters its loss state.
    pub state_loss_boost: u16,
}

/// When the engine may reuse the cached congestion signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipPolicy {
    /// Skip only while entropy is strictly below this value.
    pub entropy_ceiling: u16,
    /// Skip only while plasticity is strictly above this value.
    pub plasticity_floor: u16,
    /// Consecutive skips allowed before a forced recomputation. Zero disables the fast path.
    pub max_consecutive: u8,
}

// ============================================================================
// Engine configuration
// ============================================================================

/// Configuration for [`NdmController`](super::NdmController).
///
/// Construct from a [`Precision`] preset and override individual fields. Call
/// [`validate`](Self::validate) before building controllers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NdmConfig {
    /// Profile this configuration was derived from.
    pub precision: Precision,

    /// Fixed-point representation of 1.0 for features, hidden state and the output signal.
    pub signal_unit: u16,

    /// RTT ring capacity (W).
    pub history_capacity: u8,
    /// Width of one quantization step in microseconds, measured above the minimum RTT.
    pub rtt_quantum_us: u32,
    /// Largest quantized value stored; larger excesses over the minimum RTT are clamped.
    pub max_quantized_rtt: u16,

    /// Acknowledgments between entropy refreshes (K).
    pub refresh_interval: u16,
    /// Samples required before entropy is considered defined.
    pub min_samples: u8,
    pub entropy_bins: u8,
    pub entropy_method: EntropyMethod,
    /// Full-scale entropy value.
    pub entropy_scale: u16,
    /// Entropy below this value is classified as congestion, above it as noise.
    pub entropy_threshold: u16,

    /// Slow-start growth divisor while congestion is detected.
    pub slow_start_congestion_divisor: u32,
    /// Congestion-avoidance divisor while the variability is judged to be noise.
    pub aggressive_growth_divisor: u32,
    /// Congestion-avoidance divisor while congestion is detected.
    pub conservative_growth_divisor: u32,

    /// ssthresh divisor for a loss at high entropy.
    pub gentle_reduction_divisor: u32,
    /// ssthresh divisor for a loss at low entropy or high plasticity.
    pub standard_reduction_divisor: u32,
    /// ssthresh never drops below this many segments.
    pub min_ssthresh: u32,
    /// At or above this plasticity a loss always takes the standard reduction.
    pub reactive_plasticity: u16,

    pub plasticity: PlasticityParams,
    pub skip: SkipPolicy,
}

impl Default for NdmConfig {
    fn default() -> Self {
        Self::standard()
    }
}

impl NdmConfig {
    /// 16-bit profile: 1 ms quantization, entropy on a 0–1000 scale.
    pub fn standard() -> Self {
        Self {
            precision: Precision::Standard,
            signal_unit: 1024,
            history_capacity: 16,
            rtt_quantum_us: 1_000,
            max_quantized_rtt: u16::MAX,
            refresh_interval: 8,
            min_samples: 8,
            entropy_bins: 8,
            entropy_method: EntropyMethod::Lookup,
            entropy_scale: 1000,
            // A two-value oscillation scores ~333; anything above is noise
            entropy_threshold: 300,
            slow_start_congestion_divisor: 2,
            aggressive_growth_divisor: 1,
            conservative_growth_divisor: 2,
            gentle_reduction_divisor: 3,
            standard_reduction_divisor: 2,
            min_ssthresh: 2,
            reactive_plasticity: 900,
            plasticity: PlasticityParams {
                base: 307,
                floor: 100,
                ceiling: 1024,
                decay_q10: 1018, // ~0.994 per round
                loss_boost: 100,
                state_loss_boost: 150,
            },
            skip: SkipPolicy {
                entropy_ceiling: 150,
                plasticity_floor: 800,
                max_consecutive: 8,
            },
        }
    }

    /// 8-bit profile: 32 µs quantization, entropy on a 0–255 scale.
    pub fn compact() -> Self {
        Self {
            precision: Precision::Compact,
            signal_unit: 128,
            history_capacity: 8,
            rtt_quantum_us: 32,
            max_quantized_rtt: u8::MAX as u16,
            refresh_interval: 16,
            min_samples: 8,
            entropy_bins: 8,
            entropy_method: EntropyMethod::BitLength,
            entropy_scale: 255,
            entropy_threshold: 76,
            slow_start_congestion_divisor: 2,
            aggressive_growth_divisor: 1,
            conservative_growth_divisor: 2,
            gentle_reduction_divisor: 3,
            standard_reduction_divisor: 2,
            min_ssthresh: 2,
            reactive_plasticity: 224,
            plasticity: PlasticityParams {
                base: 76,
                floor: 25,
                ceiling: 255,
                decay_q10: 1014,
                loss_boost: 40,
                state_loss_boost: 50,
            },
            skip: SkipPolicy {
                entropy_ceiling: 38,
                plasticity_floor: 200,
                max_consecutive: 16,
            },
        }
    }

    /// Check every field against the bounds the engine relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range(
            "signal_unit",
            self.signal_unit as u64,
            MIN_SIGNAL_UNIT as u64,
            MAX_SIGNAL_UNIT as u64,
        )?;
        check_range("min_samples", self.min_samples as u64, 2, MAX_HISTORY as u64)?;
        check_range(
            "history_capacity",
            self.history_capacity as u64,
            self.min_samples as u64,
            MAX_HISTORY as u64,
        )?;
        check_range("rtt_quantum_us", self.rtt_quantum_us as u64, 1, u32::MAX as u64)?;
        check_range("max_quantized_rtt", self.max_quantized_rtt as u64, 1, u16::MAX as u64)?;
        check_range("refresh_interval", self.refresh_interval as u64, 1, u16::MAX as u64)?;
        check_range(
            "entropy_bins",
            self.entropy_bins as u64,
            2,
            MAX_ENTROPY_BINS as u64,
        )?;
        check_range("entropy_scale", self.entropy_scale as u64, 1, u16::MAX as u64)?;
        check_range(
            "entropy_threshold",
            self.entropy_threshold as u64,
            0,
            self.entropy_scale as u64,
        )?;

        for (field, divisor) in [
            (
                "slow_start_congestion_divisor",
                self.slow_start_congestion_divisor,
            ),
            ("aggressive_growth_divisor", self.aggressive_growth_divisor),
            ("conservative_growth_divisor", self.conservative_growth_divisor),
            ("gentle_reduction_divisor", self.gentle_reduction_divisor),
            ("standard_reduction_divisor", self.standard_reduction_divisor),
        ] {
            if divisor == 0 {
                return Err(ConfigError::ZeroDivisor { field });
            }
        }
        check_range("min_ssthresh", self.min_ssthresh as u64, 1, INFINITE_SSTHRESH as u64)?;

        let p = &self.plasticity;
        if p.ceiling == 0 || !(p.floor <= p.base && p.base <= p.ceiling) {
            return Err(ConfigError::PlasticityOrder {
                floor: p.floor,
                base: p.base,
                ceiling: p.ceiling,
            });
        }
        check_range("plasticity.decay_q10", p.decay_q10 as u64, 1, Q10_ONE as u64)?;
        check_range(
            "reactive_plasticity",
            self.reactive_plasticity as u64,
            0,
            p.ceiling as u64,
        )?;
        Ok(())
    }
}

fn check_range(field: &'static str, value: u64, min: u64, max: u64) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}
