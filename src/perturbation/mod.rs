//! Perturbation engine
//!
//! Renders presence vectors into perturbed images. Segment membership and
//! the background fill are resolved once per (image, segmentation map)
//! pair; rendering a batch is then a parallel copy per sample row.

mod background;

pub use background::BackgroundPolicy;

use crate::error::{LimeError, Result};
use crate::image::{Image, SegmentIndex, SegmentationMap};
use crate::sampling::Samples;
use ndarray::{Array3, ArrayView1};
use rayon::prelude::*;

/// Renders perturbed copies of one image
#[derive(Debug)]
pub struct PerturbationEngine<'a> {
    image: &'a Image,
    segments: SegmentIndex,
    fill: Array3<u8>,
}

impl<'a> PerturbationEngine<'a> {
    /// Precompute segment membership and the fill image
    pub fn new(
        segmentation: &SegmentationMap,
        image: &'a Image,
        background: &BackgroundPolicy,
    ) -> Result<Self> {
        segmentation.check_matches(image)?;
        let segments = SegmentIndex::new(segmentation);
        let fill = background.render_fill(image, &segments)?;

        Ok(Self {
            image,
            segments,
            fill,
        })
    }

    pub fn num_segments(&self) -> usize {
        self.segments.num_segments()
    }

    pub fn image(&self) -> &'a Image {
        self.image
    }

    /// Per-segment pixel index built for this segmentation
    pub fn segment_index(&self) -> &SegmentIndex {
        &self.segments
    }

    /// Render a single presence vector
    pub fn apply(&self, sample: ArrayView1<'_, bool>) -> Result<Image> {
        self.check_sample_len(sample.len())?;
        Ok(self.render(sample))
    }

    /// Render every row of `samples`, in parallel across rows
    pub fn apply_batch(&self, samples: &Samples) -> Result<Vec<Image>> {
        self.check_sample_len(samples.ncols())?;
        let rows: Vec<ArrayView1<'_, bool>> = samples.rows().into_iter().collect();
        Ok(rows.into_par_iter().map(|row| self.render(row)).collect())
    }

    fn check_sample_len(&self, len: usize) -> Result<()> {
        if len != self.num_segments() {
            return Err(LimeError::ShapeError {
                expected: format!("sample of length {}", self.num_segments()),
                actual: format!("length {}", len),
            });
        }
        Ok(())
    }

    fn render(&self, sample: ArrayView1<'_, bool>) -> Image {
        let width = self.image.width();
        let channels = self.image.channels();
        let mut pixels = self.image.pixels().clone();

        for (segment, _) in sample.iter().enumerate().filter(|&(_, &present)| !present) {
            for &offset in self.segments.pixels(segment) {
                let (row, col) = (offset / width, offset % width);
                for c in 0..channels {
                    pixels[[row, col, c]] = self.fill[[row, col, c]];
                }
            }
        }

        Image::from_rendered(pixels)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::generate_samples;
    use ndarray::{array, s};

    fn quadrants() -> (Image, SegmentationMap) {
        let image = Image::from_raw(
            2,
            2,
            3,
            vec![10, 10, 10, 20, 20, 20, 30, 30, 30, 40, 40, 40],
        )
        .unwrap();
        let map = SegmentationMap::new(array![[0, 1], [2, 3]]).unwrap();
        (image, map)
    }

    #[test]
    fn test_reference_sample_reproduces_image() {
        let (image, map) = quadrants();
        let engine = PerturbationEngine::new(&map, &image, &BackgroundPolicy::default()).unwrap();
        let rendered = engine.apply(array![true, true, true, true].view()).unwrap();
        assert_eq!(rendered, image);
    }

    #[test]
    fn test_absent_segments_are_filled() {
        let (image, map) = quadrants();
        let engine =
            PerturbationEngine::new(&map, &image, &BackgroundPolicy::Solid([255, 0, 0, 255]))
                .unwrap();
        let rendered = engine.apply(array![true, false, true, false].view()).unwrap();

        assert_eq!(rendered.pixel(0, 0).to_vec(), vec![10, 10, 10]);
        assert_eq!(rendered.pixel(0, 1).to_vec(), vec![255, 0, 0]);
        assert_eq!(rendered.pixel(1, 1).to_vec(), vec![255, 0, 0]);
        // source untouched
        assert_eq!(image.pixel(0, 1).to_vec(), vec![20, 20, 20]);
    }

    #[test]
    fn test_fudged_background() {
        let (image, map) = quadrants();
        let fudged = Image::filled(2, 2, &[7, 8, 9]).unwrap();
        let engine =
            PerturbationEngine::new(&map, &image, &BackgroundPolicy::Fudged(fudged)).unwrap();
        let rendered = engine.apply(array![false, true, true, true].view()).unwrap();
        assert_eq!(rendered.pixels().slice(s![0, 0, ..]).to_vec(), vec![7, 8, 9]);
    }

    #[test]
    fn test_batch_matches_single() {
        let (image, map) = quadrants();
        let engine = PerturbationEngine::new(&map, &image, &BackgroundPolicy::MeanColor).unwrap();
        let samples = generate_samples(4, 16, 0.5, Some(5)).unwrap();

        let batch = engine.apply_batch(&samples).unwrap();
        assert_eq!(batch.len(), 16);
        for (i, rendered) in batch.iter().enumerate() {
            assert_eq!(rendered, &engine.apply(samples.row(i)).unwrap());
        }
    }

    #[test]
    fn test_sample_length_mismatch() {
        let (image, map) = quadrants();
        let engine = PerturbationEngine::new(&map, &image, &BackgroundPolicy::default()).unwrap();
        let err = engine.apply(array![true, false].view()).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_map_image_mismatch() {
        let (image, _) = quadrants();
        let map = SegmentationMap::new(array![[0, 1, 1]]).unwrap();
        assert!(PerturbationEngine::new(&map, &image, &BackgroundPolicy::default()).is_err());
    }
}
