//! Initialization policies for the shared scalar parameter θ.
//!
//! A host normally owns initialization, but the operator carries a small set of
//! fillers so it can stand on its own. The default is a constant `1.0`.

use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

use crate::error::{MergeError, Result};

/// How to produce an initial θ.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Filler {
    /// Always `value`.
    Constant { value: f64 },
    /// Uniform in `[min, max]`.
    Uniform { min: f64, max: f64 },
    /// Normal with the given mean and standard deviation.
    Gaussian { mean: f64, std: f64 },
}

impl Default for Filler {
    fn default() -> Self {
        Filler::Constant { value: 1.0 }
    }
}

impl Filler {
    /// Checks that the filler can actually produce a finite value.
    pub fn validate(&self) -> Result<()> {
        match *self {
            Filler::Constant { value } if !value.is_finite() => Err(MergeError::InvalidFiller(
                format!("constant value {value} is not finite"),
            )),
            Filler::Uniform { min, max } if !(min.is_finite() && max.is_finite()) => Err(
                MergeError::InvalidFiller(format!("uniform bounds [{min}, {max}] are not finite")),
            ),
            Filler::Uniform { min, max } if min > max => Err(MergeError::InvalidFiller(format!(
                "uniform min {min} exceeds max {max}"
            ))),
            Filler::Gaussian { mean, std } if !mean.is_finite() || !std.is_finite() || std < 0.0 => {
                Err(MergeError::InvalidFiller(format!(
                    "gaussian mean {mean} / std {std} must be finite with std >= 0"
                )))
            }
            _ => Ok(()),
        }
    }

    /// Draws one value.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<f64> {
        self.validate()?;
        let value = match *self {
            Filler::Constant { value } => value,
            Filler::Uniform { min, max } => Uniform::new_inclusive(min, max).sample(rng),
            Filler::Gaussian { mean, std } => Normal::new(mean, std)
                .map_err(|e| MergeError::InvalidFiller(e.to_string()))?
                .sample(rng),
        };
        Ok(value)
    }
}
