//! Distances to the reference sample and their regression weights
//!
//! The metric is a pluggable strategy. Presence-bit metrics treat every
//! segment alike, which misbehaves when segment sizes differ by orders of
//! magnitude; [`DistanceMetric::SizeWeightedCosine`] weights each segment by
//! the share of the image it covers and is the recommended choice for
//! irregular segmentations. Callers can also compute distances on the
//! rendered images ([`image_distances`]) and pass them as
//! [`DistanceMetric::External`].

mod kernel;

pub use kernel::{kernel, kernel_weights, validate_kernel_width};

use crate::error::{LimeError, Result};
use crate::image::{Image, SegmentIndex, SegmentationMethod};
use crate::sampling::Samples;
use ndarray::{Array1, ArrayView1, Zip};
use serde::{Deserialize, Serialize};

/// Dissimilarity between a sample and the all-present reference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DistanceMetric {
    /// Fraction of absent segments
    Hamming,
    /// Euclidean distance on presence bits, `sqrt(#absent)`
    Euclidean,
    /// Cosine distance on presence bits, `1 - sqrt(#present / N)`
    Cosine,
    /// Cosine distance with segments weighted by pixel fraction,
    /// `1 - sqrt(present pixel fraction)`
    SizeWeightedCosine,
    /// Caller-supplied distances, one per sample
    External(Vec<f64>),
}

impl Default for DistanceMetric {
    fn default() -> Self {
        DistanceMetric::Cosine
    }
}

impl DistanceMetric {
    /// Metric suited to the segments `method` produces
    pub fn recommended_for(method: SegmentationMethod) -> Self {
        if method.produces_irregular_segments() {
            DistanceMetric::SizeWeightedCosine
        } else {
            DistanceMetric::Cosine
        }
    }

    /// Whether the metric needs per-segment pixel counts
    pub fn requires_segment_sizes(&self) -> bool {
        matches!(self, DistanceMetric::SizeWeightedCosine)
    }

    /// Checks that do not depend on the samples
    pub fn validate(&self) -> Result<()> {
        if let DistanceMetric::External(distances) = self {
            if distances.is_empty() {
                return Err(LimeError::InvalidArgument(
                    "external distances must not be empty".to_string(),
                ));
            }
            if let Some(bad) = distances.iter().find(|d| !d.is_finite() || **d < 0.0) {
                return Err(LimeError::InvalidArgument(format!(
                    "external distances must be finite and >= 0, found {}",
                    bad
                )));
            }
        }
        Ok(())
    }
}

/// Distance of every sample row to the all-present reference
///
/// `segments` is required by [`DistanceMetric::SizeWeightedCosine`]; without
/// it the call fails rather than falling back to an unweighted metric.
pub fn compute_distances(
    samples: &Samples,
    metric: &DistanceMetric,
    segments: Option<&SegmentIndex>,
) -> Result<Array1<f64>> {
    let (num_samples, num_segments) = samples.dim();
    if num_samples == 0 || num_segments == 0 {
        return Err(LimeError::InvalidArgument(format!(
            "samples must be non-empty, got {}x{}",
            num_samples, num_segments
        )));
    }
    metric.validate()?;

    let distances = match metric {
        DistanceMetric::Hamming => per_row(samples, |row| {
            absent_count(row) as f64 / num_segments as f64
        }),
        DistanceMetric::Euclidean => per_row(samples, |row| (absent_count(row) as f64).sqrt()),
        DistanceMetric::Cosine => per_row(samples, |row| {
            let present = num_segments - absent_count(row);
            cosine_from_fraction(present as f64 / num_segments as f64)
        }),
        DistanceMetric::SizeWeightedCosine => {
            let segments = segments.ok_or_else(|| {
                LimeError::InvalidArgument(
                    "size-weighted distance requires segment size metadata".to_string(),
                )
            })?;
            if segments.num_segments() != num_segments {
                return Err(LimeError::ShapeError {
                    expected: format!("{} segments", num_segments),
                    actual: format!("segment index with {} segments", segments.num_segments()),
                });
            }
            per_row(samples, |row| cosine_from_fraction(segments.covered_fraction(row)))
        }
        DistanceMetric::External(distances) => {
            if distances.len() != num_samples {
                return Err(LimeError::ShapeError {
                    expected: format!("{} external distances", num_samples),
                    actual: format!("{}", distances.len()),
                });
            }
            Array1::from_vec(distances.clone())
        }
    };

    Ok(distances)
}

fn per_row<F>(samples: &Samples, f: F) -> Array1<f64>
where
    F: Fn(ArrayView1<'_, bool>) -> f64,
{
    samples.rows().into_iter().map(f).collect()
}

fn absent_count(row: ArrayView1<'_, bool>) -> usize {
    row.iter().filter(|&&present| !present).count()
}

/// `1 - cos` where `cos = sqrt(fraction)`; exactly 0 when nothing is absent
fn cosine_from_fraction(fraction: f64) -> f64 {
    if fraction >= 1.0 {
        0.0
    } else {
        1.0 - fraction.max(0.0).sqrt()
    }
}

/// Norm used to compare a perturbed image with the original
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageNorm {
    /// Mean absolute channel difference
    L1,
    /// Root mean squared channel difference
    L2,
    /// Largest absolute channel difference
    Max,
}

/// Pixel-level distance of each perturbed image to the original, scaled to [0, 1]
pub fn image_distances(original: &Image, perturbed: &[Image], norm: ImageNorm) -> Result<Array1<f64>> {
    let reference = original.pixels();
    let count = reference.len() as f64;

    perturbed
        .iter()
        .enumerate()
        .map(|(i, image)| {
            if image.pixels().dim() != reference.dim() {
                return Err(LimeError::ShapeError {
                    expected: format!("{:?}", reference.dim()),
                    actual: format!("image {} of {:?}", i, image.pixels().dim()),
                });
            }
            let mut acc = 0.0f64;
            Zip::from(reference).and(image.pixels()).for_each(|&a, &b| {
                let diff = (f64::from(a) - f64::from(b)).abs() / 255.0;
                match norm {
                    ImageNorm::L1 => acc += diff,
                    ImageNorm::L2 => acc += diff * diff,
                    ImageNorm::Max => acc = acc.max(diff),
                }
            });
            Ok(match norm {
                ImageNorm::L1 => acc / count,
                ImageNorm::L2 => (acc / count).sqrt(),
                ImageNorm::Max => acc,
            })
        })
        .collect()
}
