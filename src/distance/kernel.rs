//! Exponential similarity kernel

use crate::error::{LimeError, Result};
use ndarray::Array1;

/// Fail unless `kernel_width` is a positive width (`+inf` allowed)
pub fn validate_kernel_width(kernel_width: f64) -> Result<()> {
    if kernel_width.is_nan() || kernel_width <= 0.0 {
        return Err(LimeError::InvalidArgument(format!(
            "kernel_width must be > 0, got {}",
            kernel_width
        )));
    }
    Ok(())
}

/// Regression weight for one distance: `exp(-d² / w²)`
///
/// The result lies in (0, 1] and is 1 only at distance 0, or everywhere
/// for an infinite width. Tiny positive distances stay strictly below 1 and
/// very large distances are clamped to the smallest positive normal `f64`.
pub fn kernel(distance: f64, kernel_width: f64) -> Result<f64> {
    validate_kernel_width(kernel_width)?;
    if !distance.is_finite() || distance < 0.0 {
        return Err(LimeError::InvalidArgument(format!(
            "distance must be finite and >= 0, got {}",
            distance
        )));
    }
    Ok(weight_unchecked(distance, kernel_width))
}

/// Apply [`kernel`] to every distance
pub fn kernel_weights(distances: &Array1<f64>, kernel_width: f64) -> Result<Array1<f64>> {
    validate_kernel_width(kernel_width)?;
    if let Some(bad) = distances.iter().find(|d| !d.is_finite() || **d < 0.0) {
        return Err(LimeError::InvalidArgument(format!(
            "distances must be finite and >= 0, found {}",
            bad
        )));
    }
    Ok(distances.mapv(|d| weight_unchecked(d, kernel_width)))
}

/// Largest `f64` below 1
const BELOW_ONE: f64 = 1.0 - f64::EPSILON / 2.0;

fn weight_unchecked(distance: f64, kernel_width: f64) -> f64 {
    if distance == 0.0 || kernel_width == f64::INFINITY {
        return 1.0;
    }
    let ratio = distance / kernel_width;
    (-(ratio * ratio)).exp().clamp(f64::MIN_POSITIVE, BELOW_ONE)
}
