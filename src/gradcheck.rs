//! Finite-difference gradient checking.
//!
//! Compares the analytic backward pass of a [`MergeOperator`] against central
//! differences of the scalar objective `L = Σ g_i · y_i`, where `g` is a fixed
//! upstream gradient. Every element of `x1` and `x2` is perturbed in turn, then
//! θ itself.

use std::fmt;

use crate::approx::Tolerance;
use crate::error::Result;
use crate::merge::MergeOperator;
use crate::tensors::Ten64;

/// Worst discrepancy found for one differentiated quantity.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Discrepancy {
    /// Flat index of the worst element (always 0 for θ).
    pub index: usize,
    pub analytic: f64,
    pub numeric: f64,
    /// Elements outside the tolerance band.
    pub failures: usize,
}

impl Discrepancy {
    pub fn error(&self) -> f64 {
        (self.analytic - self.numeric).abs()
    }

    fn record(&mut self, index: usize, analytic: f64, numeric: f64, tolerance: &Tolerance) {
        if !tolerance.close(analytic, numeric) {
            self.failures += 1;
        }
        let err = (analytic - numeric).abs();
        if err > self.error() || err.is_nan() {
            *self = Self {
                index,
                analytic,
                numeric,
                failures: self.failures,
            };
        }
    }
}

/// Outcome of [`GradientChecker::check`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GradReport {
    pub x1: Discrepancy,
    pub x2: Discrepancy,
    pub theta: Discrepancy,
}

impl GradReport {
    pub fn is_ok(&self) -> bool {
        self.x1.failures == 0 && self.x2.failures == 0 && self.theta.failures == 0
    }

    /// Panics with the report if any element failed.
    #[track_caller]
    pub fn assert_ok(&self) {
        assert!(self.is_ok(), "gradient check failed:\n{self}");
    }
}

impl fmt::Display for GradReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, d) in [("x1", &self.x1), ("x2", &self.x2), ("theta", &self.theta)] {
            writeln!(
                f,
                "{name}: {} failures, worst at {} (analytic {:.6e}, numeric {:.6e})",
                d.failures, d.index, d.analytic, d.numeric
            )?;
        }
        Ok(())
    }
}

/// Central-difference gradient checker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientChecker {
    /// Perturbation applied on each side of the evaluation point.
    pub step: f64,
    pub tolerance: Tolerance,
}

impl Default for GradientChecker {
    fn default() -> Self {
        Self {
            step: 1e-3,
            tolerance: Tolerance::GRADIENT,
        }
    }
}

impl GradientChecker {
    pub fn new(step: f64, tolerance: Tolerance) -> Self {
        Self { step, tolerance }
    }

    /// Checks every gradient of `op` at `(x1, x2)` under upstream gradient `g`.
    ///
    /// # Errors
    /// Propagates shape errors from the operator.
    pub fn check(&self, op: &MergeOperator, x1: &Ten64, x2: &Ten64, g: &Ten64) -> Result<GradReport> {
        let theta = op.theta();
        let (dx1, dx2, dtheta) = op.forward(x1, x2)?.backward_all(g)?;

        let objective = |theta: f64, a: &Ten64, b: &Ten64| -> Result<f64> {
            let fwd = MergeOperator::new(theta).forward(a, b)?;
            Ok(fwd.output().data.iter().zip(&g.data).map(|(y, g)| y * g).sum())
        };

        let mut report = GradReport::default();

        let mut probe = x1.clone();
        for i in 0..probe.data.len() {
            let orig = probe.data[i];
            probe.data[i] = orig + self.step;
            let plus = objective(theta, &probe, x2)?;
            probe.data[i] = orig - self.step;
            let minus = objective(theta, &probe, x2)?;
            probe.data[i] = orig;
            let numeric = (plus - minus) / (2.0 * self.step);
            report.x1.record(i, dx1.data[i], numeric, &self.tolerance);
        }

        let mut probe = x2.clone();
        for i in 0..probe.data.len() {
            let orig = probe.data[i];
            probe.data[i] = orig + self.step;
            let plus = objective(theta, x1, &probe)?;
            probe.data[i] = orig - self.step;
            let minus = objective(theta, x1, &probe)?;
            probe.data[i] = orig;
            let numeric = (plus - minus) / (2.0 * self.step);
            report.x2.record(i, dx2.data[i], numeric, &self.tolerance);
        }

        let plus = objective(theta + self.step, x1, x2)?;
        let minus = objective(theta - self.step, x1, x2)?;
        let numeric = (plus - minus) / (2.0 * self.step);
        report.theta.record(0, dtheta, numeric, &self.tolerance);

        Ok(report)
    }
}
