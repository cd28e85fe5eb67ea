//! Interface to external segmentation algorithms
//!
//! Segmentation itself is not implemented here. Callers inject any
//! implementation of [`Segmenter`] (or a closure) and the explainer
//! treats the returned map as opaque input.

use super::{Image, SegmentationMap};
use crate::error::{LimeError, Result};
use serde::{Deserialize, Serialize};

/// Segmentation algorithm family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SegmentationMethod {
    /// Graph-based segmentation; segment sizes vary a lot
    Felzenszwalb,
    /// Mode-seeking (mean-shift like) segmentation
    Quickshift,
    /// k-means in color + position space; roughly grid-like segments
    Slic,
    /// Gradient-based watershed segmentation
    Watershed,
}

impl SegmentationMethod {
    /// Whether the method tends to produce segments of very different size
    ///
    /// Explanations over such segmentations should use
    /// [`DistanceMetric::SizeWeightedCosine`](crate::distance::DistanceMetric::SizeWeightedCosine).
    pub fn produces_irregular_segments(&self) -> bool {
        matches!(self, SegmentationMethod::Felzenszwalb | SegmentationMethod::Quickshift)
    }
}

/// Method plus its method-specific numeric options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentationParams {
    pub method: SegmentationMethod,
    /// Observation scale (felzenszwalb)
    pub scale: Option<f64>,
    /// Pre-smoothing gaussian width
    pub sigma: Option<f64>,
    /// Minimum region size in pixels
    pub min_size: Option<usize>,
    /// Neighborhood scale (quickshift)
    pub kernel_size: Option<f64>,
    /// Cut-off distance for data points (quickshift)
    pub max_dist: Option<f64>,
    /// Color vs. position balance (quickshift)
    pub ratio: Option<f64>,
    /// Target segment count (slic, watershed)
    pub n_segments: Option<usize>,
    /// Regularity of segment shapes (slic, watershed)
    pub compactness: Option<f64>,
}

impl SegmentationParams {
    fn empty(method: SegmentationMethod) -> Self {
        Self {
            method,
            scale: None,
            sigma: None,
            min_size: None,
            kernel_size: None,
            max_dist: None,
            ratio: None,
            n_segments: None,
            compactness: None,
        }
    }

    pub fn felzenszwalb(scale: f64, sigma: f64, min_size: usize) -> Self {
        Self {
            scale: Some(scale),
            sigma: Some(sigma),
            min_size: Some(min_size),
            ..Self::empty(SegmentationMethod::Felzenszwalb)
        }
    }

    pub fn quickshift(kernel_size: f64, max_dist: f64, ratio: f64) -> Self {
        Self {
            kernel_size: Some(kernel_size),
            max_dist: Some(max_dist),
            ratio: Some(ratio),
            ..Self::empty(SegmentationMethod::Quickshift)
        }
    }

    pub fn slic(n_segments: usize, compactness: f64) -> Self {
        Self {
            n_segments: Some(n_segments),
            compactness: Some(compactness),
            ..Self::empty(SegmentationMethod::Slic)
        }
    }

    pub fn watershed(n_segments: usize, compactness: f64) -> Self {
        Self {
            n_segments: Some(n_segments),
            compactness: Some(compactness),
            ..Self::empty(SegmentationMethod::Watershed)
        }
    }

    /// Check that the options the method relies on are present and in range
    pub fn validate(&self) -> Result<()> {
        let positive = |name: &str, value: Option<f64>| -> Result<()> {
            match value {
                Some(v) if v.is_finite() && v > 0.0 => Ok(()),
                Some(v) => Err(LimeError::invalid_parameter(name, v, "must be finite and > 0")),
                None => Err(LimeError::invalid_parameter(
                    name,
                    "None",
                    format!("required for {:?}", self.method),
                )),
            }
        };

        match self.method {
            SegmentationMethod::Felzenszwalb => {
                positive("scale", self.scale)?;
                if let Some(sigma) = self.sigma {
                    if !(sigma >= 0.0) {
                        return Err(LimeError::invalid_parameter("sigma", sigma, "must be >= 0"));
                    }
                }
            }
            SegmentationMethod::Quickshift => {
                positive("kernel_size", self.kernel_size)?;
                positive("max_dist", self.max_dist)?;
                if let Some(ratio) = self.ratio {
                    if !(0.0..=1.0).contains(&ratio) {
                        return Err(LimeError::invalid_parameter("ratio", ratio, "must be in [0, 1]"));
                    }
                }
            }
            SegmentationMethod::Slic | SegmentationMethod::Watershed => {
                match self.n_segments {
                    Some(n) if n >= 1 => {}
                    other => {
                        return Err(LimeError::invalid_parameter(
                            "n_segments",
                            format!("{:?}", other),
                            "must be >= 1",
                        ))
                    }
                }
                if let Some(c) = self.compactness {
                    if !(c >= 0.0) {
                        return Err(LimeError::invalid_parameter("compactness", c, "must be >= 0"));
                    }
                }
            }
        }
        Ok(())
    }
}

/// External segmentation capability
pub trait Segmenter: Send + Sync {
    /// Segment `image` into superpixels
    fn segment(&self, image: &Image, params: &SegmentationParams) -> Result<SegmentationMap>;
}

impl<F> Segmenter for F
where
    F: Fn(&Image, &SegmentationParams) -> Result<SegmentationMap> + Send + Sync,
{
    fn segment(&self, image: &Image, params: &SegmentationParams) -> Result<SegmentationMap> {
        self(image, params)
    }
}
