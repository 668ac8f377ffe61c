//! Execution strategy selection.
//!
//! The merge kernels are embarrassingly parallel across elements. This module
//! decides, process-wide, whether they fan out over the `rayon` thread pool or
//! run on the calling thread.
//!
//! # Supported Backends
//!
//! - `Parallel` — `rayon` data parallelism (default).
//! - `Sequential` — single-threaded loops; useful for bit-reproducible θ
//!   gradients, since the parallel reduction may sum in a different order.
//!
//! The backend is stored globally using an `AtomicU8`, so it can be switched at
//! runtime without threading a handle through every call.

use core::convert::TryFrom;
use core::sync::atomic::{AtomicU8, Ordering};

/// Enumeration of supported execution strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Backend {
    /// Kernels run over the `rayon` thread pool (default).
    #[default]
    Parallel = 0,
    /// Kernels run on the calling thread.
    Sequential,
}

impl TryFrom<u8> for Backend {
    type Error = ();

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Parallel),
            1 => Ok(Self::Sequential),
            _ => Err(()),
        }
    }
}

/// Internal global state for the active backend.
///
/// The backend is only expected to change rarely, never in the middle of a
/// forward/backward pair.
static GLOBAL_DEFAULT_BACKEND: AtomicU8 = AtomicU8::new(Backend::Parallel as u8);

/// Sets the active backend used by every subsequent kernel call.
///
/// # Example
///
/// ```
/// use parametric_merge::backend::{set_backend, Backend};
/// set_backend(Backend::Sequential);
/// # set_backend(Backend::Parallel);
/// ```
pub fn set_backend(b: Backend) {
    GLOBAL_DEFAULT_BACKEND.store(b as u8, Ordering::Release);
}

/// Returns the currently active backend.
///
/// If the stored value is invalid, defaults to [`Backend::Parallel`].
pub fn get_backend() -> Backend {
    Backend::try_from(GLOBAL_DEFAULT_BACKEND.load(Ordering::Acquire)).unwrap_or_default()
}
