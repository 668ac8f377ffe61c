//! parametric_merge: a differentiable, learnable blend between max, mean and min.
//!
//! Merges two equally shaped tensors `x1`, `x2` with a single learned scalar θ:
//! a softmax-weighted average of the two inputs with logits `θ·x1`, `θ·x2`.
//! Large positive θ approaches the elementwise max, large negative θ the
//! elementwise min, and θ = 0 is the elementwise mean.
//!
//! # Features
//!
//! - Overflow-free forward pass for any finite θ (log-sum-exp stabilization).
//! - Exact analytic backward pass for both inputs and the shared θ.
//! - Typed forward results, so backward can never run on stale caches.
//! - `rayon` data parallelism with a sequential fallback.
//!
//! # Modules
//!
//! - [`merge`] — The operator, its config, and the stateful layer adapter.
//! - [`backprop`] — Closure-style forward/backward API over `WithGrad` values.
//! - [`tensors`] — Minimal tensor and gradient containers.
//! - [`ops`] — Element kernels and their dispatch.
//! - [`backend`] — Sequential vs. parallel execution switch.
//! - [`filler`] — θ initialization policies.
//! - [`gradcheck`] — Finite-difference gradient checking.
//!
//! # Example
//!
//! ```rust
//! use parametric_merge::{MergeOperator, Propagate, tensor};
//!
//! let mut op = MergeOperator::new(100.0);
//! let fwd = op.forward(&tensor!([0.2, -0.5]), &tensor!([0.1, 0.5])).unwrap();
//! assert!((fwd.output().data[0] - 0.2).abs() < 1e-4);
//! assert!((fwd.output().data[1] - 0.5).abs() < 1e-4);
//!
//! let grads = fwd.backward(&tensor!([1.0, 1.0]), Propagate::ALL).unwrap();
//! op.accumulate(&grads);
//! ```

pub mod approx;
pub mod backend;
pub mod backprop;
pub mod error;
pub mod filler;
pub mod gradcheck;
pub mod merge;
pub mod ops;
pub mod tensors;

pub use error::{MergeError, Result};
pub use filler::Filler;
pub use merge::{MergeConfig, MergeForward, MergeGrads, MergeLayer, MergeOperator, Propagate};
pub use tensors::{Ten64, Tensor, WithGrad};
