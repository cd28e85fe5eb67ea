//! Image and segmentation containers
//!
//! Provides the two inputs every explanation request starts from:
//! - [`Image`]: an H×W×{3,4} array of 8-bit channel values
//! - [`SegmentationMap`]: an H×W array of contiguous segment labels
//!
//! Plus the per-segment pixel index shared by perturbation, distances and
//! coverage selection, and the interface for external segmenters.

mod segmenter;
mod segments;

pub use segmenter::{SegmentationMethod, SegmentationParams, Segmenter};
pub use segments::SegmentIndex;

use crate::error::{LimeError, Result};
use ndarray::{s, Array2, Array3, ArrayView1};
use serde::{Deserialize, Serialize};

/// 8-bit RGB or RGBA image, immutable once constructed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Array3<u8>", into = "Array3<u8>")]
pub struct Image {
    pixels: Array3<u8>,
}

impl Image {
    /// Create an image from an (height, width, channels) array
    pub fn new(pixels: Array3<u8>) -> Result<Self> {
        let (height, width, channels) = pixels.dim();
        if height == 0 || width == 0 {
            return Err(LimeError::InvalidArgument(format!(
                "image must not be empty, got {}x{}",
                height, width
            )));
        }
        if channels != 3 && channels != 4 {
            return Err(LimeError::ShapeError {
                expected: "3 or 4 channels".to_string(),
                actual: format!("{} channels", channels),
            });
        }
        Ok(Self { pixels })
    }

    /// Create an image from row-major interleaved channel data
    pub fn from_raw(height: usize, width: usize, channels: usize, data: Vec<u8>) -> Result<Self> {
        let pixels = Array3::from_shape_vec((height, width, channels), data)?;
        Self::new(pixels)
    }

    /// Create an image where every pixel has the same value
    pub fn filled(height: usize, width: usize, value: &[u8]) -> Result<Self> {
        let channels = value.len();
        let pixels = Array3::from_shape_fn((height, width, channels), |(_, _, c)| value[c]);
        Self::new(pixels)
    }

    /// Wrap an array produced by rendering from an existing, validated image
    pub(crate) fn from_rendered(pixels: Array3<u8>) -> Self {
        debug_assert!(matches!(pixels.dim().2, 3 | 4));
        Self { pixels }
    }

    pub fn height(&self) -> usize {
        self.pixels.dim().0
    }

    pub fn width(&self) -> usize {
        self.pixels.dim().1
    }

    pub fn channels(&self) -> usize {
        self.pixels.dim().2
    }

    /// (height, width)
    pub fn shape(&self) -> (usize, usize) {
        (self.height(), self.width())
    }

    /// Total number of pixels
    pub fn num_pixels(&self) -> usize {
        self.height() * self.width()
    }

    /// Underlying pixel array
    pub fn pixels(&self) -> &Array3<u8> {
        &self.pixels
    }

    /// Channel values of a single pixel
    pub fn pixel(&self, row: usize, col: usize) -> ArrayView1<'_, u8> {
        self.pixels.slice(s![row, col, ..])
    }

    /// Consume the image and return the pixel array
    pub fn into_inner(self) -> Array3<u8> {
        self.pixels
    }
}

impl TryFrom<Array3<u8>> for Image {
    type Error = LimeError;

    fn try_from(pixels: Array3<u8>) -> Result<Self> {
        Self::new(pixels)
    }
}

impl From<Image> for Array3<u8> {
    fn from(image: Image) -> Self {
        image.pixels
    }
}

#[cfg(feature = "image-io")]
impl TryFrom<&::image::RgbImage> for Image {
    type Error = LimeError;

    fn try_from(img: &::image::RgbImage) -> Result<Self> {
        let (width, height) = img.dimensions();
        Self::from_raw(height as usize, width as usize, 3, img.as_raw().clone())
    }
}

#[cfg(feature = "image-io")]
impl TryFrom<&::image::RgbaImage> for Image {
    type Error = LimeError;

    fn try_from(img: &::image::RgbaImage) -> Result<Self> {
        let (width, height) = img.dimensions();
        Self::from_raw(height as usize, width as usize, 4, img.as_raw().clone())
    }
}

/// H×W segment labels in `[0, N)` with every label present
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Array2<u32>", into = "Array2<u32>")]
pub struct SegmentationMap {
    labels: Array2<u32>,
    num_segments: usize,
}

impl SegmentationMap {
    /// Create a segmentation map, validating contiguous labeling
    pub fn new(labels: Array2<u32>) -> Result<Self> {
        let (height, width) = labels.dim();
        if height == 0 || width == 0 {
            return Err(LimeError::InvalidArgument(format!(
                "segmentation map must not be empty, got {}x{}",
                height, width
            )));
        }

        let max_label = labels.iter().copied().max().unwrap_or(0) as usize;
        // a map of h*w pixels holds at most h*w contiguous labels
        if max_label >= height * width {
            return Err(LimeError::InvalidArgument(format!(
                "segment labels must be contiguous, max label {} exceeds {} pixels",
                max_label,
                height * width
            )));
        }
        let mut seen = vec![false; max_label + 1];
        for &label in labels.iter() {
            seen[label as usize] = true;
        }
        if let Some(missing) = seen.iter().position(|&s| !s) {
            return Err(LimeError::InvalidArgument(format!(
                "segment labels must be contiguous in [0, {}), label {} is missing",
                max_label + 1,
                missing
            )));
        }

        Ok(Self {
            labels,
            num_segments: max_label + 1,
        })
    }

    /// Create a segmentation map from row-major labels
    pub fn from_labels(height: usize, width: usize, labels: Vec<u32>) -> Result<Self> {
        let labels = Array2::from_shape_vec((height, width), labels)?;
        Self::new(labels)
    }

    /// Number of segments N
    pub fn num_segments(&self) -> usize {
        self.num_segments
    }

    pub fn labels(&self) -> &Array2<u32> {
        &self.labels
    }

    /// (height, width)
    pub fn shape(&self) -> (usize, usize) {
        self.labels.dim()
    }

    pub fn label(&self, row: usize, col: usize) -> u32 {
        self.labels[[row, col]]
    }

    /// Fail unless the map covers the image pixel-for-pixel
    pub fn check_matches(&self, image: &Image) -> Result<()> {
        if self.shape() != image.shape() {
            return Err(LimeError::ShapeError {
                expected: format!("segmentation map of {:?}", image.shape()),
                actual: format!("{:?}", self.shape()),
            });
        }
        Ok(())
    }

    /// Boolean mask of the pixels belonging to any of `segments`
    pub fn mask_for(&self, segments: &[usize]) -> Array2<bool> {
        let mut wanted = vec![false; self.num_segments];
        for &s in segments {
            if s < self.num_segments {
                wanted[s] = true;
            }
        }
        self.labels.mapv(|label| wanted[label as usize])
    }
}

impl TryFrom<Array2<u32>> for SegmentationMap {
    type Error = LimeError;

    fn try_from(labels: Array2<u32>) -> Result<Self> {
        Self::new(labels)
    }
}

impl From<SegmentationMap> for Array2<u32> {
    fn from(map: SegmentationMap) -> Self {
        map.labels
    }
}
