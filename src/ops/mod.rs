//! # Kernel Layer
//!
//! Element kernels for the merge operator and the layer that picks between
//! them.
//!
//! ## Submodules
//!
//! - [`cpu`] — sequential and `rayon` kernels for the forward and backward passes
//! - [`dispatch`] — chooses a kernel from the global [`Backend`](crate::backend::Backend)
//!
//! ## Notes
//!
//! - Kernels work on flat slices; shape validation happens in [`crate::merge`]
//!   before any kernel is reached
//! - Per-element arithmetic is identical across kernels, so forward outputs and
//!   input gradients are bit-identical regardless of backend

pub mod cpu;
pub mod dispatch;
