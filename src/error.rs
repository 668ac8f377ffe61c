//! Error type shared by every fallible operation in the crate.
//!
//! All failures here are usage errors surfaced synchronously to the caller.
//! Nothing is retried and no partial output is ever produced: shape checks
//! run before any output buffer is allocated.

/// All errors that can occur while merging tensors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MergeError {
    /// Two tensors that must share a shape do not (x1 vs x2, or the upstream
    /// gradient vs the cached forward output).
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    /// Backward was requested before any forward pass populated the cache.
    #[error("backward called without a cached forward pass")]
    MissingForwardCache,

    /// A shape/data pair whose element count does not match.
    #[error("tensor shape {shape:?} requires {} elements, got {len}", .shape.iter().product::<usize>())]
    InvalidTensor { shape: Vec<usize>, len: usize },

    /// A parameter filler with unusable settings.
    #[error("invalid filler: {0}")]
    InvalidFiller(String),
}

impl MergeError {
    /// Builds a [`MergeError::ShapeMismatch`] from two shapes.
    pub fn shape_mismatch(expected: &[usize], got: &[usize]) -> Self {
        MergeError::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, MergeError>;
