//! Fill strategies for absent segments

use crate::error::{LimeError, Result};
use crate::image::{Image, SegmentIndex};
use ndarray::{Array2, Array3, Axis};
use serde::{Deserialize, Serialize};

/// How the pixels of an absent segment are replaced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BackgroundPolicy {
    /// Fixed RGBA color; alpha is only written to 4-channel images
    Solid([u8; 4]),
    /// Mean color of the segment in the original image
    MeanColor,
    /// Box-blurred version of the original image
    Blur { radius: usize },
    /// Caller-supplied replacement image of identical shape
    Fudged(Image),
}

impl Default for BackgroundPolicy {
    fn default() -> Self {
        BackgroundPolicy::Solid([0, 0, 0, 255])
    }
}

impl BackgroundPolicy {
    /// Check the policy against the image it will be applied to
    pub fn validate_for(&self, image: &Image) -> Result<()> {
        match self {
            BackgroundPolicy::Blur { radius } if *radius == 0 => Err(
                LimeError::invalid_parameter("blur radius", radius, "must be >= 1"),
            ),
            BackgroundPolicy::Fudged(fudged) if fudged.pixels().dim() != image.pixels().dim() => {
                Err(LimeError::ShapeError {
                    expected: format!("fudged image of {:?}", image.pixels().dim()),
                    actual: format!("{:?}", fudged.pixels().dim()),
                })
            }
            _ => Ok(()),
        }
    }

    /// Render the full replacement image used for every absent pixel
    pub(crate) fn render_fill(&self, image: &Image, segments: &SegmentIndex) -> Result<Array3<u8>> {
        self.validate_for(image)?;
        let fill = match self {
            BackgroundPolicy::Solid(rgba) => {
                let (h, w) = image.shape();
                Array3::from_shape_fn((h, w, image.channels()), |(_, _, c)| rgba[c])
            }
            BackgroundPolicy::MeanColor => mean_color_fill(image, segments),
            BackgroundPolicy::Blur { radius } => box_blur(image, *radius),
            BackgroundPolicy::Fudged(fudged) => fudged.pixels().clone(),
        };
        Ok(fill)
    }
}

fn mean_color_fill(image: &Image, segments: &SegmentIndex) -> Array3<u8> {
    let (_, width) = image.shape();
    let channels = image.channels();
    let pixels = image.pixels();
    let mut fill = Array3::zeros(pixels.raw_dim());

    for segment in 0..segments.num_segments() {
        let offsets = segments.pixels(segment);
        let mut sums = vec![0u64; channels];
        for &offset in offsets {
            let (row, col) = (offset / width, offset % width);
            for (c, sum) in sums.iter_mut().enumerate() {
                *sum += u64::from(pixels[[row, col, c]]);
            }
        }
        let count = offsets.len().max(1) as f64;
        let mean: Vec<u8> = sums
            .iter()
            .map(|&s| (s as f64 / count).round() as u8)
            .collect();
        for &offset in offsets {
            let (row, col) = (offset / width, offset % width);
            for (c, &value) in mean.iter().enumerate() {
                fill[[row, col, c]] = value;
            }
        }
    }

    fill
}

/// Separable box blur with windows clipped at the image border
fn box_blur(image: &Image, radius: usize) -> Array3<u8> {
    let pixels = image.pixels();
    let mut out = Array3::zeros(pixels.raw_dim());

    for (c, channel) in pixels.axis_iter(Axis(2)).enumerate() {
        let source = channel.mapv(f64::from);
        let horizontal = blur_axis(&source, radius, Axis(1));
        let blurred = blur_axis(&horizontal, radius, Axis(0));
        out.index_axis_mut(Axis(2), c)
            .assign(&blurred.mapv(|v| v.round().clamp(0.0, 255.0) as u8));
    }

    out
}

fn blur_axis(source: &Array2<f64>, radius: usize, axis: Axis) -> Array2<f64> {
    let mut out = Array2::zeros(source.raw_dim());
    for (lane_in, mut lane_out) in source.lanes(axis).into_iter().zip(out.lanes_mut(axis)) {
        let n = lane_in.len();
        // prefix sums give O(1) window means
        let mut prefix = vec![0.0; n + 1];
        for (i, &v) in lane_in.iter().enumerate() {
            prefix[i + 1] = prefix[i] + v;
        }
        for i in 0..n {
            let lo = i.saturating_sub(radius);
            let hi = i.saturating_add(radius).saturating_add(1).min(n);
            lane_out[i] = (prefix[hi] - prefix[lo]) / (hi - lo) as f64;
        }
    }
    out
}
