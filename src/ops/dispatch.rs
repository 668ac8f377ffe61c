//! Kernel dispatch layer.
//!
//! Selects the sequential or `rayon` kernel for each pass based on the global
//! [`Backend`] and on the size of the input. Small tensors always run
//! sequentially; fanning a few hundred elements out over the pool costs more
//! than it saves.

use log::trace;

use super::cpu::{self, KernelGrads, MergeCell};
use crate::backend::{Backend, get_backend};

/// Element count below which the parallel kernels are never used.
pub const PARALLEL_THRESHOLD: usize = 4096;

fn use_parallel(len: usize) -> bool {
    get_backend() == Backend::Parallel && len >= PARALLEL_THRESHOLD
}

/// Dispatches the forward kernel. Returns `(y, cells)`.
pub fn merge_forward(x1: &[f64], x2: &[f64], theta: f64) -> (Vec<f64>, Vec<MergeCell>) {
    if use_parallel(x1.len()) {
        trace!("merge forward: {} elements on rayon pool", x1.len());
        cpu::par_merge_forward(x1, x2, theta)
    } else {
        trace!("merge forward: {} elements sequential", x1.len());
        cpu::merge_forward(x1, x2, theta)
    }
}

/// Dispatches the backward kernel.
pub fn merge_backward(
    cells: &[MergeCell],
    grad_out: &[f64],
    want_x1: bool,
    want_x2: bool,
) -> KernelGrads {
    if use_parallel(cells.len()) {
        trace!("merge backward: {} elements on rayon pool", cells.len());
        cpu::par_merge_backward(cells, grad_out, want_x1, want_x2)
    } else {
        trace!("merge backward: {} elements sequential", cells.len());
        cpu::merge_backward(cells, grad_out, want_x1, want_x2)
    }
}
