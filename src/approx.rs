//! Utilities to approximate equality of floating point values.

/// Max error accepted when comparing forward outputs against a closed form.
pub const FORWARD_MAX_ERROR: f64 = 1e-4;

/// Absolute error accepted between analytic and numerical gradients.
pub const GRADIENT_ABS_ERROR: f64 = 5e-3;

/// Relative error accepted between analytic and numerical gradients.
pub const GRADIENT_REL_ERROR: f64 = 1e-2;

/// An acceptance band for comparing two floats.
///
/// Two values are close if their distance is within `abs`, or within `rel`
/// of the larger magnitude. Either bound may be zero to disable it. NaN is
/// never close to anything.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub abs: f64,
    pub rel: f64,
}

impl Tolerance {
    /// Purely absolute band used for forward checks.
    pub const FORWARD: Self = Self {
        abs: FORWARD_MAX_ERROR,
        rel: 0.0,
    };

    /// Band used for finite-difference gradient checks.
    pub const GRADIENT: Self = Self {
        abs: GRADIENT_ABS_ERROR,
        rel: GRADIENT_REL_ERROR,
    };

    /// The distance between `a` and `b` that this band still accepts.
    pub fn allowed(&self, a: f64, b: f64) -> f64 {
        self.abs.max(self.rel * a.abs().max(b.abs()))
    }

    pub fn close(&self, a: f64, b: f64) -> bool {
        (a - b).abs() <= self.allowed(a, b)
    }

    /// Whether every pair of elements is close. Slices of different length
    /// are never close.
    pub fn all_close(&self, a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(&x, &y)| self.close(x, y))
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::GRADIENT
    }
}

/// Largest elementwise distance between two equally long slices.
///
/// Returns NaN if any pair involves NaN.
pub fn max_abs_diff(a: &[f64], b: &[f64]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b)
        .map(|(&x, &y)| (x - y).abs())
        .fold(0.0, |acc, d| if d.is_nan() || acc.is_nan() { f64::NAN } else { acc.max(d) })
}
