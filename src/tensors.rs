//! Core tensor data structures.
//!
//! # Tensors
//!
//! The merge operator only needs a very small tensor surface: an N-dimensional
//! shape, flat row-major storage, and a way to pair a value with its gradient.
//!
//! It supports:
//! - Construction of N-dimensional tensors with shape and row-major data layout
//! - Checked construction from untrusted shape/data pairs
//! - `WithGrad` wrappers pairing a parameter or input with its gradient
//! - The `tensor!` macro for literal tensors
//!
//! ## Limitations
//! - Row-major only
//! - No broadcasting, slicing, or views
//!
//! ## Example
//!
//! ```rust
//! use parametric_merge::tensors::Tensor;
//! let t = Tensor::new(vec![2, 3], vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
//! assert_eq!(t.shape, vec![2, 3]);
//! ```

use briny::prelude::{TrustedData, Validate, ValidationError};

use crate::error::{MergeError, Result};

/// Represents an N-dimensional tensor with a shape and flat row-major data.
///
/// - `shape` defines the structure, e.g. `[2, 3]` for a 2×3 matrix.
/// - `data` holds the flattened content in row-major order.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor<T> {
    pub shape: Vec<usize>,
    pub data: Vec<T>,
}

/// The tensor type every kernel in this crate operates on.
pub type Ten64 = Tensor<f64>;

/// A shape/data pair that has not been checked yet.
struct UncheckedTensor<T> {
    shape: Vec<usize>,
    data: Vec<T>,
}

impl<T> Validate for UncheckedTensor<T> {
    fn validate(&self) -> core::result::Result<(), ValidationError> {
        if self.data.len() != self.shape.iter().product::<usize>() {
            return Err(ValidationError);
        }
        Ok(())
    }
}

impl<T> Tensor<T> {
    /// Creates a new tensor with the given shape and flat data.
    ///
    /// # Panics
    /// Panics if the number of elements in `data` does not match the shape product.
    /// Use [`Tensor::try_new`] for data that did not come from a literal.
    pub fn new(shape: impl Into<Vec<usize>>, data: Vec<T>) -> Self {
        let shape = shape.into();
        assert_eq!(
            shape.iter().product::<usize>(),
            data.len(),
            "shape {:?} is incompatible with {} data elements",
            shape,
            data.len()
        );
        Self { shape, data }
    }

    /// Creates a new tensor, rejecting a shape/data length mismatch.
    ///
    /// # Errors
    /// Returns [`MergeError::InvalidTensor`] when `data.len()` is not the
    /// product of `shape`.
    pub fn try_new(shape: impl Into<Vec<usize>>, data: Vec<T>) -> Result<Self> {
        let shape = shape.into();
        let len = data.len();
        let err_shape = shape.clone();
        let trusted = TrustedData::new(UncheckedTensor { shape, data })
            .map_err(|_| MergeError::InvalidTensor {
                shape: err_shape,
                len,
            })?;
        let UncheckedTensor { shape, data } = trusted.into_inner();
        Ok(Self { shape, data })
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Whether `other` has exactly the same shape.
    pub fn same_shape<U>(&self, other: &Tensor<U>) -> bool {
        self.shape == other.shape
    }

    /// Replaces this tensor's data with another tensor of the same shape.
    ///
    /// # Errors
    /// Returns [`MergeError::ShapeMismatch`] if shapes do not match; `self`
    /// is left untouched in that case.
    pub fn update(&mut self, mut other: Tensor<T>) -> Result<()> {
        if self.shape != other.shape {
            return Err(MergeError::shape_mismatch(&self.shape, &other.shape));
        }
        std::mem::swap(&mut self.data, &mut other.data);
        Ok(())
    }
}

impl<T: Clone> Tensor<T> {
    /// A tensor of the given shape with every element set to `value`.
    pub fn full(shape: impl Into<Vec<usize>>, value: T) -> Self {
        let shape = shape.into();
        let data = vec![value; shape.iter().product()];
        Self { shape, data }
    }
}

impl Ten64 {
    /// A zero-filled tensor of the given shape.
    pub fn zeros(shape: impl Into<Vec<usize>>) -> Self {
        Self::full(shape, 0.0)
    }
}

/// Values that have a natural zero gradient of the same structure.
pub trait ZeroGrad {
    fn zero_like(&self) -> Self;
}

impl ZeroGrad for f64 {
    fn zero_like(&self) -> Self {
        0.0
    }
}

impl ZeroGrad for Ten64 {
    fn zero_like(&self) -> Self {
        Tensor::zeros(self.shape.clone())
    }
}

/// A container for tracking gradients of values (used in autograd).
///
/// Typically used as `WithGrad<Ten64>` for inputs or `WithGrad<f64>` for
/// the shared scalar parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct WithGrad<T> {
    pub value: T,
    pub grad: T,
}

impl<T: ZeroGrad> WithGrad<T> {
    /// Wraps `value` with a zeroed gradient.
    pub fn new(value: T) -> Self {
        let grad = value.zero_like();
        Self { value, grad }
    }

    /// Resets the gradient to zero.
    pub fn zero_grad(&mut self) {
        self.grad = self.value.zero_like();
    }
}

/// Defines a tensor from nested literal arrays.
///
/// Supports arbitrary dimensionality as long as sublists are uniform in shape.
///
/// # Example
/// ```
/// use parametric_merge::tensor;
/// let t = tensor!([[1.0, -2.0], [3.0, 4.0]]);
/// assert_eq!(t.shape, vec![2, 2]);
/// assert_eq!(t.data[1], -2.0);
/// ```
#[macro_export]
macro_rules! tensor {
    ($lit:literal) => {
        $crate::tensors::Tensor::new(Vec::<usize>::new(), vec![$lit])
    };

    ([ $( [ $( $row:tt )* ] ),+ $(,)? ]) => {{
        let children = vec![ $( $crate::tensor!([ $( $row )* ]) ),+ ];
        let first_shape = &children[0].shape;
        assert!(children.iter().all(|c| c.shape == *first_shape),
            "ragged tensor literal (rows have mismatched shapes)");
        let mut shape = vec![children.len()];
        shape.extend_from_slice(first_shape);
        let mut data = Vec::with_capacity(children.len() * children[0].data.len());
        for c in children { data.extend(c.data); }
        $crate::tensors::Tensor::new(shape, data)
    }};

    ([ $( $x:expr ),+ $(,)? ]) => {{
        let data = vec![ $( $x ),+ ];
        $crate::tensors::Tensor::new(vec![data.len()], data)
    }};
}
