//! Per-segment pixel index

use super::SegmentationMap;
use ndarray::ArrayView1;

/// Pixel membership of every segment, computed once per segmentation map
///
/// Pixels are stored as flat row-major offsets (`row * width + col`).
#[derive(Debug, Clone)]
pub struct SegmentIndex {
    pixels: Vec<Vec<usize>>,
    total_pixels: usize,
}

impl SegmentIndex {
    /// Build the index for a segmentation map
    pub fn new(map: &SegmentationMap) -> Self {
        let mut pixels = vec![Vec::new(); map.num_segments()];
        for (offset, &label) in map.labels().iter().enumerate() {
            pixels[label as usize].push(offset);
        }
        let (height, width) = map.shape();

        Self {
            pixels,
            total_pixels: height * width,
        }
    }

    pub fn num_segments(&self) -> usize {
        self.pixels.len()
    }

    pub fn total_pixels(&self) -> usize {
        self.total_pixels
    }

    /// Flat pixel offsets belonging to `segment`
    pub fn pixels(&self, segment: usize) -> &[usize] {
        &self.pixels[segment]
    }

    /// Pixel count of every segment
    pub fn sizes(&self) -> Vec<usize> {
        self.pixels.iter().map(Vec::len).collect()
    }

    /// Fraction of the image covered by each segment (sums to 1)
    pub fn fractions(&self) -> Vec<f64> {
        let total = self.total_pixels as f64;
        self.pixels.iter().map(|p| p.len() as f64 / total).collect()
    }

    /// Fraction of the image covered by the segments present in `sample`
    pub fn covered_fraction(&self, sample: ArrayView1<'_, bool>) -> f64 {
        let covered: usize = sample
            .iter()
            .zip(&self.pixels)
            .filter(|&(&present, _)| present)
            .map(|(_, p)| p.len())
            .sum();
        covered as f64 / self.total_pixels as f64
    }
}
