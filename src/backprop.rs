//! Differentiable operations in closure form.
//!
//! # Backpropagation Primitives
//!
//! Functional counterpart of [`crate::merge`] for callers that keep their own
//! parameters in [`WithGrad`] wrappers and chain backward closures by hand.
//!
//! ## Autograd Pattern
//!
//! Each operation follows the same pattern:
//! 1. **Inputs** are references to `WithGrad` values.
//! 2. **Forward Pass** computes an output `Ten64`.
//! 3. **Backward Pass** returns a closure capturing the forward intermediates.
//! 4. **Gradient Application** is left to the caller (e.g. [`sgd`]).
//!
//! ## Usage Guidelines
//!
//! - Shape mismatches are returned as errors, never panics.
//! - The backward closures implement `Fn`, so they may be invoked repeatedly
//!   with different upstream gradients.

use crate::error::Result;
use crate::merge::MergeOperator;
use crate::tensors::{Ten64, WithGrad};

/// Parametric merge of `x1` and `x2` controlled by the scalar `theta`.
///
/// # Returns
/// - `out`: the merged tensor, same shape as the inputs.
/// - `back`: closure mapping `dL/d(out)` to `(dL/dx1, dL/dx2, dL/dθ)`.
///
/// # Errors
/// Fails before computing anything if `x1` and `x2` differ in shape; `back`
/// fails if the upstream gradient does not match the output shape.
///
/// # Example
/// ```rust
/// use parametric_merge::backprop::parametric_merge;
/// use parametric_merge::tensors::WithGrad;
/// use parametric_merge::tensor;
///
/// let x1 = WithGrad::new(tensor!([[0.5, -1.0], [2.0, 0.0]]));
/// let x2 = WithGrad::new(tensor!([[1.5, -3.0], [2.0, 1.0]]));
/// let theta = WithGrad::new(1.0);
/// let (out, back) = parametric_merge(&x1, &x2, &theta).unwrap();
/// let (dx1, _dx2, _dtheta) = back(&tensor!([[1.0, 1.0], [1.0, 1.0]])).unwrap();
/// assert_eq!(out.shape, dx1.shape);
/// ```
pub fn parametric_merge(
    x1: &WithGrad<Ten64>,
    x2: &WithGrad<Ten64>,
    theta: &WithGrad<f64>,
) -> Result<(Ten64, impl Fn(&Ten64) -> Result<(Ten64, Ten64, f64)> + use<>)> {
    let fwd = MergeOperator::new(theta.value).forward(&x1.value, &x2.value)?;
    let out = fwd.output().clone();

    let back = move |grad_output: &Ten64| fwd.backward_all(grad_output);

    Ok((out, back))
}

/// Performs an in-place Stochastic Gradient Descent (SGD) update on a scalar
/// parameter.
///
/// Applies `value = value - lr * grad` and then zeros the gradient.
pub fn sgd(w: &mut WithGrad<f64>, lr: f64) {
    w.value -= lr * w.grad;
    w.grad = 0.0;
}
