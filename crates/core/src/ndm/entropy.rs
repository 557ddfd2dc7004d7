//! Histogram entropy over the RTT history.
//!
//! Samples are binned over the history's own `[min, max]` span, so the score measures how
//! evenly the recent RTTs spread across that span, not how large the span is:
//!
//! ```text
//!   all equal            one dominant bin        two extremes          uniform
//!   ████████             ██████░░                ████······████        ██████████
//!   H = 0                H low                   H = 1 bit             H = log2(B)
//! ```
//!
//! The result is normalized by `log2(B)` and scaled to the profile's entropy scale.

use super::config::{EntropyMethod, NdmConfig, MAX_ENTROPY_BINS, Q10_SHIFT};
use super::history::RttHistory;

/// `c · log2(c)` in Q10 for `c = 0..=16`.
const C_LOG2_C: [u32; 17] = [
    0, 0, 2048, 4869, 8192, 11888, 15882, 20123, 24576, 29214, 34017, 38967, 44052, 49260,
    54582, 60010, 65536,
];

/// Approximate `log2(x)` in Q10 from the bit length of `x`, with the bits below the most
/// significant one taken as a linear mantissa. Exact at powers of two, monotone.
pub(crate) fn log2_q10(x: u32) -> u32 {
    if x == 0 {
        return 0;
    }
    let msb = 31 - x.leading_zeros();
    let shifted = if msb >= Q10_SHIFT {
        x >> (msb - Q10_SHIFT)
    } else {
        x << (Q10_SHIFT - msb)
    };
    let mantissa = shifted & ((1 << Q10_SHIFT) - 1);
    (msb << Q10_SHIFT) | mantissa
}

/// Computes the normalized entropy score of an [`RttHistory`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntropyEstimator {
    bins: u8,
    method: EntropyMethod,
    scale: u16,
    min_samples: u8,
}

impl EntropyEstimator {
    pub fn new(bins: u8, method: EntropyMethod, scale: u16, min_samples: u8) -> Self {
        Self {
            bins: bins.clamp(2, MAX_ENTROPY_BINS),
            method,
            scale,
            min_samples: min_samples.max(1),
        }
    }

    pub fn from_config(config: &NdmConfig) -> Self {
        Self::new(
            config.entropy_bins,
            config.entropy_method,
            config.entropy_scale,
            config.min_samples,
        )
    }

    /// Entropy score in `[0, scale]`, or `None` while the history holds fewer than
    /// `min_samples` samples.
    pub fn estimate(&self, history: &RttHistory) -> Option<u16> {
        let n = history.len();
        if n < self.min_samples as usize {
            return None;
        }
        let (min, max) = history.bounds()?;
        let range = (max - min) as u32;
        if range == 0 {
            return Some(0);
        }

        let mut counts = [0u8; MAX_ENTROPY_BINS as usize];
        let top = self.bins as u32 - 1;
        for sample in history.iter() {
            let bin = ((sample - min) as u32 * top / range).min(top);
            counts[bin as usize] += 1;
        }
        let counts = &counts[..self.bins as usize];

        let n = n as u64;
        // H·N and log2(B)·B, both in Q10 bits
        let (weighted, max_weighted) = match self.method {
            EntropyMethod::Lookup => {
                let occupied: u64 = counts.iter().map(|&c| C_LOG2_C[c as usize] as u64).sum();
                let total = C_LOG2_C[n as usize] as u64;
                (
                    total.saturating_sub(occupied),
                    C_LOG2_C[self.bins as usize] as u64,
                )
            }
            EntropyMethod::BitLength => {
                let log_n = log2_q10(n as u32) as u64;
                let weighted = counts
                    .iter()
                    .filter(|&&c| c > 0)
                    .map(|&c| c as u64 * (log_n - log2_q10(c as u32) as u64))
                    .sum();
                (weighted, self.bins as u64 * log2_q10(self.bins as u32) as u64)
            }
        };

        // score = (weighted / n) / (max_weighted / bins) * scale
        let denominator = n * max_weighted;
        if denominator == 0 {
            return Some(0);
        }
        let score = weighted * self.bins as u64 * self.scale as u64 / denominator;
        Some(score.min(self.scale as u64) as u16)
    }
}
