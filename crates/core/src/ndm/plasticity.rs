//! Plasticity: how reactive the engine currently is.

use super::config::{PlasticityParams, Q10_SHIFT};

/// Bounded confidence scalar, always within `[floor, ceiling]` of its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plasticity(u16);

impl Plasticity {
    pub fn new(params: &PlasticityParams) -> Self {
        Self(params.base.clamp(params.floor, params.ceiling))
    }

    pub fn value(self) -> u16 {
        self.0
    }

    /// Multiplicative decay toward the floor.
    pub fn decay(&mut self, params: &PlasticityParams) {
        let decayed = (self.0 as u32 * params.decay_q10 as u32) >> Q10_SHIFT;
        self.0 = (decayed as u16).clamp(params.floor, params.ceiling);
    }

    pub fn boost(&mut self, amount: u16, params: &PlasticityParams) {
        self.0 = self.0.saturating_add(amount).clamp(params.floor, params.ceiling);
    }

    pub fn reset(&mut self, params: &PlasticityParams) {
        *self = Self::new(params);
    }
}
