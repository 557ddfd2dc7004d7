//! Fixed-weight recurrent predictor.
//!
//! One hidden layer of [`HIDDEN_UNITS`] tanh units, each fed by the normalized features and by
//! its own previous activation, followed by a sigmoid output:
//!
//! ```text
//!   features (6) ──W_in──▶ Σ ──tanh──▶ h_t ──W_out──▶ Σ ──(÷2 if noisy)──sigmoid──▶ signal
//!                          ▲              │
//!                          └──w_rec·h_t-1─┘
//! ```
//!
//! [`forward`] is a pure function: the caller owns the hidden state and decides whether to
//! commit the returned one.

use super::activation;
use super::config::{HIDDEN_UNITS, INPUT_FEATURES, Q10_SHIFT};

/// Hidden activations in the profile's fixed-point unit.
pub type HiddenState = [i16; HIDDEN_UNITS];

/// Predictor weights in Q10.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredictorWeights {
    pub input: [[i16; INPUT_FEATURES]; HIDDEN_UNITS],
    /// Weight of a unit's previous activation on itself.
    pub recurrent: i16,
    pub output: [i16; HIDDEN_UNITS],
}

/// Weights shared by every connection.
pub static DEFAULT_WEIGHTS: PredictorWeights = PredictorWeights {
    input: [
        [-1000, -983, -966, -949, -932, -915],
        [-963, -946, -929, -912, -895, -878],
        [-926, -909, -892, -875, -858, -841],
        [-889, -872, -855, -838, -821, -804],
    ],
    recurrent: 500,
    output: [-1000, -987, -974, -961],
};

/// Raw network state sampled for one predictor run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    pub rtt_us: u32,
    /// Baseline RTT; zero or unknown falls back to `rtt_us`.
    pub min_rtt_us: u32,
    pub entropy: u16,
    pub entropy_scale: u16,
    pub plasticity: u16,
    pub plasticity_ceiling: u16,
    pub slow_start: bool,
    pub congestion_detected: bool,
    pub loss_recent: bool,
}

/// Inputs normalized to `[-unit, unit]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Features(pub [i32; INPUT_FEATURES]);

impl Features {
    pub fn normalize(obs: &Observation, unit: u16) -> Self {
        let u = unit as i64;
        let indicator = |set: bool, when_set: i64| if set { when_set } else { -when_set };

        let baseline: i64 = match obs.min_rtt_us {
            0 | u32::MAX => obs.rtt_us.max(1) as i64,
            min => min as i64,
        };
        let rtt_ratio = obs.rtt_us as i64 * u / baseline - u;
        let entropy = obs.entropy as i64 * 2 * u / obs.entropy_scale.max(1) as i64 - u;
        let plasticity = obs.plasticity as i64 * 2 * u / obs.plasticity_ceiling.max(1) as i64 - u;

        let clamp = |v: i64| v.clamp(-u, u) as i32;
        Self([
            clamp(rtt_ratio),
            clamp(entropy),
            indicator(obs.slow_start, u) as i32,
            indicator(obs.congestion_detected, -u) as i32,
            clamp(plasticity),
            indicator(obs.loss_recent, -u) as i32,
        ])
    }
}

/// Output of one predictor run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prediction {
    /// Congestion pressure in `[0, unit]`.
    pub signal: u16,
    pub hidden: HiddenState,
}

/// Run the predictor once. When `damped` is set the pre-activation output is halved.
pub fn forward(
    weights: &PredictorWeights,
    features: &Features,
    hidden: &HiddenState,
    unit: u16,
    damped: bool,
) -> Prediction {
    let mut next = [0i16; HIDDEN_UNITS];
    for (i, row) in weights.input.iter().enumerate() {
        let weighted: i64 = row
            .iter()
            .zip(features.0.iter())
            .map(|(&w, &f)| w as i64 * f as i64)
            .sum();
        let recurrent = hidden[i] as i64 * weights.recurrent as i64;
        let acc = saturate((weighted + recurrent) >> Q10_SHIFT);
        next[i] = activation::tanh(acc, unit) as i16;
    }

    let out: i64 = next
        .iter()
        .zip(weights.output.iter())
        .map(|(&h, &w)| h as i64 * w as i64)
        .sum::<i64>()
        >> Q10_SHIFT;
    let out = if damped { out / 2 } else { out };

    Prediction {
        signal: activation::sigmoid(saturate(out), unit) as u16,
        hidden: next,
    }
}

fn saturate(v: i64) -> i32 {
    v.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}
