//! CPU kernels for the parametric merge.
//!
//! # Forward
//!
//! Per element, with logits `t1 = θ·x1`, `t2 = θ·x2` and `m = max(t1, t2)`:
//!
//! $$ y = \\frac{x_1 e_1 + x_2 e_2}{e_1 + e_2}, \\quad e_k = \\exp(t_k - m) $$
//!
//! Subtracting `m` bounds both exponents to `<= 0`, and the larger of `e1`,
//! `e2` is exactly `1`, so the denominator is always in `[1, 2]`. The kernel
//! gets there from `Δ = θ·(x1 - x2)` alone (`t_k - m` is `0` or `-|Δ|`), so
//! logits that overflow on their own for huge θ never meet as `inf - inf`.
//!
//! # Backward
//!
//! With `Δ = t1 - t2`, `c = e1·e2` and `d = e1 + e2`:
//!
//! - `∂y/∂x1 = ((Δ + 1)·c + e1²) / d²`
//! - `∂y/∂x2 = ((1 - Δ)·c + e2²) / d²`
//! - `∂y/∂θ  = (x1 - x2)²·c / d²`, summed over every element.
//!
//! Every kernel comes in a sequential and a `rayon` flavor with identical
//! per-element arithmetic; only the summation order of the θ reduction differs.
//!
//! Callers are expected to have checked shapes already; the kernels only
//! `debug_assert!` them.

use rayon::prelude::*;

/// Forward intermediates retained for one element.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MergeCell {
    /// `exp(θ·x1 - m)`
    pub e1: f64,
    /// `exp(θ·x2 - m)`
    pub e2: f64,
    /// `e1 + e2`, always in `[1, 2]` for finite inputs.
    pub denom: f64,
    /// `θ·x1 - θ·x2`
    pub logit_diff: f64,
    /// `x1 - x2`
    pub input_diff: f64,
}

/// Gradients produced by one backward kernel call.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KernelGrads {
    pub x1: Option<Vec<f64>>,
    pub x2: Option<Vec<f64>>,
    pub theta: f64,
}

#[inline]
fn blend(x1: f64, x2: f64, theta: f64) -> (f64, MergeCell) {
    let input_diff = x1 - x2;
    let logit_diff = theta * input_diff;
    // NaN falls through to the second arm and poisons e1
    let (e1, e2) = if logit_diff >= 0.0 {
        (1.0, (-logit_diff).exp())
    } else {
        (logit_diff.exp(), 1.0)
    };
    let denom = e1 + e2;
    let y = (x1 * e1 + x2 * e2) / denom;
    let cell = MergeCell {
        e1,
        e2,
        denom,
        logit_diff,
        input_diff,
    };
    (y, cell)
}

/// `(c, Δ·c)`. Once `c` underflows to `0` the product is `0` as well, even
/// when `Δ` itself has overflowed.
#[inline]
fn cross_terms(cell: &MergeCell) -> (f64, f64) {
    let cross = cell.e1 * cell.e2;
    if cross == 0.0 {
        (0.0, 0.0)
    } else {
        (cross, cell.logit_diff * cross)
    }
}

#[inline]
fn grad_x1(cell: &MergeCell, g: f64) -> f64 {
    let (cross, weighted) = cross_terms(cell);
    let denom_sq = cell.denom * cell.denom;
    g * (weighted + cross + cell.e1 * cell.e1) / denom_sq
}

#[inline]
fn grad_x2(cell: &MergeCell, g: f64) -> f64 {
    let (cross, weighted) = cross_terms(cell);
    let denom_sq = cell.denom * cell.denom;
    g * (cross - weighted + cell.e2 * cell.e2) / denom_sq
}

#[inline]
fn grad_theta(cell: &MergeCell, g: f64) -> f64 {
    let diff = cell.input_diff;
    let cross = cell.e1 * cell.e2;
    g * diff * diff * cross / (cell.denom * cell.denom)
}

/// Sequential forward pass. Returns `(y, cells)`.
pub fn merge_forward(x1: &[f64], x2: &[f64], theta: f64) -> (Vec<f64>, Vec<MergeCell>) {
    debug_assert_eq!(x1.len(), x2.len());

    let mut out = Vec::with_capacity(x1.len());
    let mut cells = Vec::with_capacity(x1.len());
    for (&a, &b) in x1.iter().zip(x2) {
        let (y, cell) = blend(a, b, theta);
        out.push(y);
        cells.push(cell);
    }
    (out, cells)
}

/// Parallel forward pass over the `rayon` pool. Returns `(y, cells)`.
pub fn par_merge_forward(x1: &[f64], x2: &[f64], theta: f64) -> (Vec<f64>, Vec<MergeCell>) {
    debug_assert_eq!(x1.len(), x2.len());

    let mut out = vec![0.0f64; x1.len()];
    let mut cells = vec![MergeCell::default(); x1.len()];

    out.par_iter_mut()
        .zip(cells.par_iter_mut())
        .zip(x1.par_iter().zip(x2.par_iter()))
        .for_each(|((y, cell), (&a, &b))| {
            let (value, c) = blend(a, b, theta);
            *y = value;
            *cell = c;
        });

    (out, cells)
}

/// Sequential backward pass.
///
/// `want_x1` / `want_x2` skip the corresponding input gradient; the θ gradient
/// is always produced.
pub fn merge_backward(
    cells: &[MergeCell],
    grad_out: &[f64],
    want_x1: bool,
    want_x2: bool,
) -> KernelGrads {
    debug_assert_eq!(cells.len(), grad_out.len());

    let dx1 = want_x1.then(|| {
        cells
            .iter()
            .zip(grad_out)
            .map(|(cell, &g)| grad_x1(cell, g))
            .collect()
    });
    let dx2 = want_x2.then(|| {
        cells
            .iter()
            .zip(grad_out)
            .map(|(cell, &g)| grad_x2(cell, g))
            .collect()
    });
    let dtheta = cells
        .iter()
        .zip(grad_out)
        .map(|(cell, &g)| grad_theta(cell, g))
        .sum();

    KernelGrads {
        x1: dx1,
        x2: dx2,
        theta: dtheta,
    }
}

/// Parallel backward pass; see [`merge_backward`].
pub fn par_merge_backward(
    cells: &[MergeCell],
    grad_out: &[f64],
    want_x1: bool,
    want_x2: bool,
) -> KernelGrads {
    debug_assert_eq!(cells.len(), grad_out.len());

    let dx1 = want_x1.then(|| {
        cells
            .par_iter()
            .zip(grad_out.par_iter())
            .map(|(cell, &g)| grad_x1(cell, g))
            .collect()
    });
    let dx2 = want_x2.then(|| {
        cells
            .par_iter()
            .zip(grad_out.par_iter())
            .map(|(cell, &g)| grad_x2(cell, g))
            .collect()
    });
    let dtheta = cells
        .par_iter()
        .zip(grad_out.par_iter())
        .map(|(cell, &g)| grad_theta(cell, g))
        .sum();

    KernelGrads {
        x1: dx1,
        x2: dx2,
        theta: dtheta,
    }
}
