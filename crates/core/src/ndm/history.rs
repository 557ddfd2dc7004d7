//! Bounded ring of quantized RTT samples.

use super::config::MAX_HISTORY;

/// Quantize the queueing delay above `min_rtt_us` to `quantum_us` steps, offset by one and
/// clamped to `[1, max]`.
///
/// Only the spread of the history matters to the entropy estimate, so storing the excess
/// over the minimum keeps narrow sample widths usable on long paths. A sample keeps the
/// baseline it was quantized against; a later, lower minimum only shifts newer samples.
pub(crate) fn quantize(rtt_us: u32, min_rtt_us: u32, quantum_us: u32, max: u16) -> u16 {
    let excess = rtt_us.saturating_sub(min_rtt_us) / quantum_us.max(1);
    excess.saturating_add(1).min(max.max(1) as u32) as u16
}

/// Fixed-capacity RTT history, oldest sample overwritten first.
///
/// Storage is inline so the whole ring lives inside the per-connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RttHistory {
    slots: [u16; MAX_HISTORY],
    /// Next slot to write.
    head: u8,
    len: u8,
    capacity: u8,
}

impl RttHistory {
    /// Capacity is clamped to `1..=16`.
    pub fn new(capacity: u8) -> Self {
        Self {
            slots: [0; MAX_HISTORY],
            head: 0,
            len: 0,
            capacity: capacity.clamp(1, MAX_HISTORY as u8),
        }
    }

    pub fn push(&mut self, sample: u16) {
        self.slots[self.head as usize] = sample;
        self.head = (self.head + 1) % self.capacity;
        if self.len < self.capacity {
            self.len += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity as usize
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity
    }

    /// Valid samples, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = u16> + '_ {
        let start = if self.is_full() { self.head as usize } else { 0 };
        let cap = self.capacity as usize;
        (0..self.len as usize).map(move |i| self.slots[(start + i) % cap])
    }

    pub fn min(&self) -> Option<u16> {
        self.iter().min()
    }

    pub fn max(&self) -> Option<u16> {
        self.iter().max()
    }

    /// `(min, max)` in one pass.
    pub fn bounds(&self) -> Option<(u16, u16)> {
        self.iter().fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }

    /// `max - min`, zero when empty.
    pub fn range(&self) -> u16 {
        self.bounds().map(|(lo, hi)| hi - lo).unwrap_or(0)
    }
}
