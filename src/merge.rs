//! The parametric merge operator.
//!
//! # Parametric Merge
//!
//! Blends two equally shaped tensors with a single learned scalar θ:
//!
//! $$ y_i = \\frac{x1_i e^{\\theta x1_i} + x2_i e^{\\theta x2_i}}{e^{\\theta x1_i} + e^{\\theta x2_i}} $$
//!
//! θ → +∞ approaches the elementwise max, θ → −∞ the elementwise min, and
//! θ = 0 is exactly the elementwise mean.
//!
//! ## Autograd Pattern
//!
//! 1. [`MergeOperator`] owns θ together with its gradient accumulator.
//! 2. [`MergeOperator::forward`] checks shapes and returns a [`MergeForward`],
//!    which owns the output and every intermediate the backward pass needs.
//! 3. [`MergeForward::backward`] maps `dL/dy` to [`MergeGrads`]. Since the
//!    cache travels with the forward result, backward can never run against
//!    stale buffers.
//! 4. The host adds [`MergeGrads::theta`] into the parameter, either itself or
//!    via [`MergeOperator::accumulate`].
//!
//! [`MergeLayer`] wraps the same steps for hosts that drive layers through a
//! stateful `forward`/`backward` pair instead of passing results around.
//!
//! ## Example
//!
//! ```rust
//! use parametric_merge::merge::{MergeOperator, Propagate};
//! use parametric_merge::tensor;
//!
//! let op = MergeOperator::new(0.0);
//! let fwd = op.forward(&tensor!([1.0, 4.0]), &tensor!([3.0, 2.0])).unwrap();
//! assert_eq!(fwd.output().data, vec![2.0, 3.0]);
//!
//! let grads = fwd.backward(&tensor!([1.0, 1.0]), Propagate::ALL).unwrap();
//! assert_eq!(grads.x1.unwrap().data, vec![0.5, 0.5]);
//! ```

use log::{debug, info};
use rand::Rng;

use crate::error::{MergeError, Result};
use crate::filler::Filler;
use crate::ops::cpu::MergeCell;
use crate::ops::dispatch;
use crate::tensors::{Ten64, Tensor, WithGrad};

/// Which input gradients a backward pass should produce.
///
/// The θ gradient is always produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Propagate {
    pub x1: bool,
    pub x2: bool,
}

impl Propagate {
    /// Gradients for both inputs.
    pub const ALL: Self = Self { x1: true, x2: true };
    /// Only the θ gradient.
    pub const PARAM_ONLY: Self = Self {
        x1: false,
        x2: false,
    };
}

impl Default for Propagate {
    fn default() -> Self {
        Self::ALL
    }
}

/// Construction settings for a [`MergeOperator`].
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MergeConfig {
    /// A θ the host already owns (e.g. restored from a checkpoint). When set,
    /// `filler` is not consulted.
    pub theta: Option<f64>,
    /// Initialization policy used when `theta` is `None`.
    pub filler: Filler,
}

/// Gradients returned by a backward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeGrads {
    /// `dL/dx1`, if requested.
    pub x1: Option<Ten64>,
    /// `dL/dx2`, if requested.
    pub x2: Option<Ten64>,
    /// `dL/dθ`, reduced over every element. To be added into the parameter's
    /// accumulator, not applied directly.
    pub theta: f64,
}

fn check_consistent(t: &Ten64) -> Result<()> {
    if t.data.len() != t.shape.iter().product::<usize>() {
        return Err(MergeError::InvalidTensor {
            shape: t.shape.clone(),
            len: t.data.len(),
        });
    }
    Ok(())
}

/// Owns the shared scalar parameter θ and runs the forward pass.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOperator {
    theta: WithGrad<f64>,
}

impl Default for MergeOperator {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl MergeOperator {
    /// Creates an operator with the given θ and a zeroed gradient.
    pub fn new(theta: f64) -> Self {
        Self {
            theta: WithGrad::new(theta),
        }
    }

    /// Creates an operator from a config, drawing θ from the filler when the
    /// config does not carry one.
    pub fn from_config<R: Rng + ?Sized>(config: &MergeConfig, rng: &mut R) -> Result<Self> {
        let theta = match config.theta {
            Some(theta) => {
                info!("theta already provided ({theta}); skipping parameter initialization");
                theta
            }
            None => {
                let theta = config.filler.sample(rng)?;
                info!("initialized theta = {theta} from {:?}", config.filler);
                theta
            }
        };
        Ok(Self::new(theta))
    }

    /// Current value of θ.
    pub fn theta(&self) -> f64 {
        self.theta.value
    }

    /// Overwrites θ, leaving the accumulated gradient untouched.
    pub fn set_theta(&mut self, theta: f64) {
        self.theta.value = theta;
    }

    /// Gradient accumulated into θ since the last [`zero_grad`](Self::zero_grad).
    pub fn theta_grad(&self) -> f64 {
        self.theta.grad
    }

    /// The parameter and its accumulator, for optimizers.
    pub fn param(&self) -> &WithGrad<f64> {
        &self.theta
    }

    pub fn param_mut(&mut self) -> &mut WithGrad<f64> {
        &mut self.theta
    }

    /// Adds the θ gradient of one backward pass into the accumulator.
    pub fn accumulate(&mut self, grads: &MergeGrads) {
        self.theta.grad += grads.theta;
    }

    pub fn zero_grad(&mut self) {
        self.theta.zero_grad();
    }

    /// Runs the forward pass.
    ///
    /// # Errors
    /// - [`MergeError::InvalidTensor`] if either input's data does not fill its shape.
    /// - [`MergeError::ShapeMismatch`] if `x1` and `x2` differ in shape.
    ///
    /// Both are reported before anything is computed.
    pub fn forward(&self, x1: &Ten64, x2: &Ten64) -> Result<MergeForward> {
        check_consistent(x1)?;
        check_consistent(x2)?;
        if !x1.same_shape(x2) {
            return Err(MergeError::shape_mismatch(&x1.shape, &x2.shape));
        }

        let theta = self.theta.value;
        let (out, cells) = dispatch::merge_forward(&x1.data, &x2.data, theta);

        Ok(MergeForward {
            theta,
            output: Tensor {
                shape: x1.shape.clone(),
                data: out,
            },
            cells,
        })
    }
}

/// Result of a forward pass: the output plus everything backward needs.
///
/// Consuming this in [`backward`](Self::backward) is the only way to obtain
/// gradients, so backward always sees the intermediates of the exact inputs
/// and θ that produced the output.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeForward {
    theta: f64,
    output: Ten64,
    cells: Vec<MergeCell>,
}

impl MergeForward {
    /// The merged tensor `y`.
    pub fn output(&self) -> &Ten64 {
        &self.output
    }

    pub fn into_output(self) -> Ten64 {
        self.output
    }

    /// The θ this result was computed with.
    pub fn theta(&self) -> f64 {
        self.theta
    }

    pub fn shape(&self) -> &[usize] {
        &self.output.shape
    }

    /// Per-element cached intermediates, in row-major order.
    pub fn cells(&self) -> &[MergeCell] {
        &self.cells
    }

    /// Runs the backward pass for upstream gradient `grad_out = dL/dy`.
    ///
    /// # Errors
    /// - [`MergeError::InvalidTensor`] if `grad_out`'s data does not fill its shape.
    /// - [`MergeError::ShapeMismatch`] if `grad_out` differs in shape from the output.
    pub fn backward(&self, grad_out: &Ten64, propagate: Propagate) -> Result<MergeGrads> {
        check_consistent(grad_out)?;
        if !grad_out.same_shape(&self.output) {
            return Err(MergeError::shape_mismatch(&self.output.shape, &grad_out.shape));
        }

        let grads =
            dispatch::merge_backward(&self.cells, &grad_out.data, propagate.x1, propagate.x2);
        let shape = &self.output.shape;

        Ok(MergeGrads {
            x1: grads.x1.map(|data| Tensor {
                shape: shape.clone(),
                data,
            }),
            x2: grads.x2.map(|data| Tensor {
                shape: shape.clone(),
                data,
            }),
            theta: grads.theta,
        })
    }

    /// Backward pass producing every gradient: `(dL/dx1, dL/dx2, dL/dθ)`.
    ///
    /// # Errors
    /// Same as [`backward`](Self::backward).
    pub fn backward_all(&self, grad_out: &Ten64) -> Result<(Ten64, Ten64, f64)> {
        let MergeGrads { x1, x2, theta } = self.backward(grad_out, Propagate::ALL)?;
        match (x1, x2) {
            (Some(x1), Some(x2)) => Ok((x1, x2, theta)),
            _ => unreachable!("both input gradients were requested"),
        }
    }
}

/// Stateful adapter for hosts that call `forward` then `backward` on a layer
/// object without carrying the forward result themselves.
///
/// The layer is either holding a valid forward cache or not. A successful
/// `forward` enters the cached state; a rejected `forward` or [`reset`](Self::reset)
/// leaves it.
#[derive(Debug, Clone, Default)]
pub struct MergeLayer {
    op: MergeOperator,
    cache: Option<MergeForward>,
}

impl MergeLayer {
    pub fn new(op: MergeOperator) -> Self {
        Self { op, cache: None }
    }

    pub fn operator(&self) -> &MergeOperator {
        &self.op
    }

    pub fn operator_mut(&mut self) -> &mut MergeOperator {
        &mut self.op
    }

    pub fn has_cache(&self) -> bool {
        self.cache.is_some()
    }

    /// Drops the cached forward pass.
    pub fn reset(&mut self) {
        self.cache = None;
    }

    /// Runs the forward pass and caches it for [`backward`](Self::backward).
    ///
    /// # Errors
    /// Same as [`MergeOperator::forward`]. On error any previous cache is
    /// dropped, so a following `backward` reports [`MergeError::MissingForwardCache`].
    pub fn forward(&mut self, x1: &Ten64, x2: &Ten64) -> Result<&Ten64> {
        let prev_shape = self.cache.take().map(|c| c.output.shape);
        let fwd = self.op.forward(x1, x2)?;
        if let Some(prev) = prev_shape.filter(|prev| *prev != x1.shape) {
            debug!("merge layer reshaped: {:?} -> {:?}", prev, x1.shape);
        }
        Ok(&self.cache.insert(fwd).output)
    }

    /// Runs the backward pass against the cached forward pass and accumulates
    /// `dL/dθ` into the owned parameter.
    ///
    /// Returns `(dL/dx1, dL/dx2)`, each `None` if not requested.
    ///
    /// # Errors
    /// - [`MergeError::MissingForwardCache`] if no forward pass is cached.
    /// - Same as [`MergeForward::backward`] otherwise.
    pub fn backward(
        &mut self,
        grad_out: &Ten64,
        propagate: Propagate,
    ) -> Result<(Option<Ten64>, Option<Ten64>)> {
        let fwd = self.cache.as_ref().ok_or(MergeError::MissingForwardCache)?;
        let grads = fwd.backward(grad_out, propagate)?;
        self.op.accumulate(&grads);
        Ok((grads.x1, grads.x2))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn default_theta_is_one() {
        assert_eq!(MergeOperator::default().theta(), 1.0);
        assert_eq!(MergeOperator::default().theta_grad(), 0.0);
    }

    #[test]
    fn config_theta_skips_filler() {
        let mut rng = StdRng::seed_from_u64(7);
        let config = MergeConfig {
            theta: Some(-2.5),
            filler: Filler::Uniform { min: 10.0, max: 20.0 },
        };
        let op = MergeOperator::from_config(&config, &mut rng).unwrap();
        assert_eq!(op.theta(), -2.5);
    }

    #[test]
    fn config_filler_is_used() {
        let mut rng = StdRng::seed_from_u64(7);
        let config = MergeConfig {
            theta: None,
            filler: Filler::Constant { value: 100.0 },
        };
        let op = MergeOperator::from_config(&config, &mut rng).unwrap();
        assert_eq!(op.theta(), 100.0);
    }

    #[test]
    fn forward_keeps_theta_it_ran_with() {
        let mut op = MergeOperator::new(3.0);
        let fwd = op.forward(&tensor!([1.0]), &tensor!([2.0])).unwrap();
        op.set_theta(-3.0);
        assert_eq!(fwd.theta(), 3.0);
    }

    #[test]
    fn rejects_inconsistent_tensor() {
        let op = MergeOperator::default();
        let broken = Tensor {
            shape: vec![2, 2],
            data: vec![1.0; 3],
        };
        let ok = Tensor::zeros(vec![2, 2]);
        assert_eq!(
            op.forward(&broken, &ok),
            Err(MergeError::InvalidTensor {
                shape: vec![2, 2],
                len: 3
            })
        );
    }

    #[test]
    fn accumulate_adds_up() {
        let mut op = MergeOperator::new(0.0);
        let fwd = op.forward(&tensor!([1.0, 0.0]), &tensor!([0.0, 1.0])).unwrap();
        let grads = fwd.backward(&tensor!([1.0, 1.0]), Propagate::PARAM_ONLY).unwrap();
        assert!(grads.x1.is_none() && grads.x2.is_none());
        op.accumulate(&grads);
        op.accumulate(&grads);
        // each element contributes (x1 - x2)² / 4 at θ = 0
        assert!((op.theta_grad() - 1.0).abs() < 1e-12);
        op.zero_grad();
        assert_eq!(op.theta_grad(), 0.0);
    }
}
