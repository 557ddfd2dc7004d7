//! Table-driven activation functions.
//!
//! Both tables are sampled at 65 evenly spaced points in Q10 and linearly interpolated.
//! Inputs and outputs are expressed in the caller's fixed-point unit, so the same tables
//! serve every precision profile.

use super::config::Q10_ONE;

const TABLE_POINTS: i64 = 64;

/// `tanh(x)` for `x` in `[-3, 3]`, Q10.
#[rustfmt::skip]
const TANH_Q10: [i16; 65] = [
    -1019, -1018, -1017, -1015, -1013, -1011, -1008, -1005, -1001, -997, -991, -985, -977,
    -968, -956, -943, -927, -908, -886, -859, -829, -793, -752, -704, -650, -590, -522, -448,
    -367, -281, -190, -96, 0, 96, 190, 281, 367, 448, 522, 590, 650, 704, 752, 793, 829, 859,
    886, 908, 927, 943, 956, 968, 977, 985, 991, 997, 1001, 1005, 1008, 1011, 1013, 1015, 1017,
    1018, 1019,
];

/// `1 / (1 + e^-x)` for `x` in `[-6, 6]`, Q10.
#[rustfmt::skip]
const SIGMOID_Q10: [i16; 65] = [
    3, 3, 4, 4, 5, 6, 8, 9, 11, 14, 16, 20, 24, 28, 34, 41, 49, 58, 69, 82, 98, 116, 136, 160,
    187, 217, 251, 288, 329, 372, 417, 464, 512, 560, 607, 652, 695, 736, 773, 807, 837, 864,
    888, 908, 926, 942, 955, 966, 975, 983, 990, 996, 1000, 1004, 1008, 1010, 1013, 1015, 1016,
    1018, 1019, 1020, 1020, 1021, 1021,
];

/// A monotone lookup table with saturation outside its sampled span.
#[derive(Debug)]
pub(crate) struct ActivationTable {
    values: &'static [i16; 65],
    /// Half-width of the sampled input span, Q10.
    half_span: i64,
    /// Output below the span.
    low: i64,
    /// Output above the span.
    high: i64,
}

/// Tanh-like, output in `[-unit, unit]`.
pub(crate) static TANH: ActivationTable = ActivationTable {
    values: &TANH_Q10,
    half_span: 3 * Q10_ONE as i64,
    low: -(Q10_ONE as i64),
    high: Q10_ONE as i64,
};

/// Sigmoid-like, output in `[0, unit]`, half-unit at zero.
pub(crate) static SIGMOID: ActivationTable = ActivationTable {
    values: &SIGMOID_Q10,
    half_span: 6 * Q10_ONE as i64,
    low: 0,
    high: Q10_ONE as i64,
};

impl ActivationTable {
    /// Evaluate at `x`, where `unit` represents 1.0 for both input and output.
    pub(crate) fn eval(&self, x: i32, unit: u16) -> i32 {
        let unit = unit.max(1) as i64;
        let x_q10 = x as i64 * Q10_ONE as i64 / unit;
        let y_q10 = self.eval_q10(x_q10);
        (y_q10 * unit / Q10_ONE as i64) as i32
    }

    fn eval_q10(&self, x: i64) -> i64 {
        if x < -self.half_span {
            return self.low;
        }
        if x > self.half_span {
            return self.high;
        }
        let step = 2 * self.half_span / TABLE_POINTS;
        let offset = x + self.half_span;
        let idx = (offset / step) as usize;
        let rem = offset % step;
        let lo = self.values[idx] as i64;
        match self.values.get(idx + 1) {
            Some(&hi) => lo + (hi as i64 - lo) * rem / step,
            None => lo,
        }
    }
}

pub(crate) fn tanh(x: i32, unit: u16) -> i32 {
    TANH.eval(x, unit)
}

pub(crate) fn sigmoid(x: i32, unit: u16) -> i32 {
    SIGMOID.eval(x, unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_points() {
        for unit in [128u16, 1024, 4096] {
            assert_eq!(tanh(0, unit), 0);
            assert_eq!(sigmoid(0, unit), unit as i32 / 2);
        }
    }

    #[test]
    fn test_saturation() {
        assert_eq!(tanh(i32::MAX, 1024), 1024);
        assert_eq!(tanh(i32::MIN, 1024), -1024);
        assert_eq!(sigmoid(i32::MAX, 1024), 1024);
        assert_eq!(sigmoid(i32::MIN, 1024), 0);
        assert_eq!(tanh(10 * 128, 128), 128);
        assert_eq!(sigmoid(-10 * 128, 128), 0);
    }

    #[test]
    fn test_monotone_and_bounded() {
        for unit in [128u16, 1024] {
            let u = unit as i32;
            let (mut prev_t, mut prev_s) = (i32::MIN, i32::MIN);
            for x in (-8 * u)..=(8 * u) {
                let t = tanh(x, unit);
                let s = sigmoid(x, unit);
                assert!(t >= prev_t && s >= prev_s, "not monotone at {x}/{unit}");
                assert!((-u..=u).contains(&t));
                assert!((0..=u).contains(&s));
                prev_t = t;
                prev_s = s;
            }
        }
    }

    #[test]
    fn test_tanh_nearly_odd() {
        for x in [50, 300, 1024, 2500] {
            let sum = tanh(-x, 1024) + tanh(x, 1024);
            assert!(sum.abs() <= 1, "tanh({x}) asymmetric by {sum}");
        }
    }

    #[test]
    fn test_interpolates_between_points() {
        // x = 0.5 sits between table points 37 (448 at 0.469) and 38 (522 at 0.5625)
        let y = tanh(512, 1024);
        assert!((470..=480).contains(&y), "tanh(0.5) = {y}");
    }
}
