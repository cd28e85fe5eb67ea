//! Predictor adapter
//!
//! Wraps the black-box classifier. The adapter only chunks its input to
//! bound memory and normalizes the output into one fixed-width score row
//! per image. Classifier failures abort the call and are never retried.

mod config;

pub use config::PredictorConfig;

use crate::error::{ClassifierError, LimeError, Result};
use crate::image::Image;
use ndarray::{Array1, Array2};
use tracing::debug;

/// External image classifier
///
/// Must return one row of class scores per input image, with the same
/// width and class order across calls.
pub trait Classifier: Send + Sync {
    fn predict(&self, images: &[Image]) -> std::result::Result<Array2<f64>, ClassifierError>;
}

impl<F> Classifier for F
where
    F: Fn(&[Image]) -> std::result::Result<Array2<f64>, ClassifierError> + Send + Sync,
{
    fn predict(&self, images: &[Image]) -> std::result::Result<Array2<f64>, ClassifierError> {
        self(images)
    }
}

/// Batches images through a [`Classifier`]
pub struct PredictorAdapter<C: Classifier> {
    classifier: C,
    config: PredictorConfig,
}

impl<C: Classifier> std::fmt::Debug for PredictorAdapter<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PredictorAdapter")
            .field("config", &self.config)
            .finish()
    }
}

impl<C: Classifier> PredictorAdapter<C> {
    /// Create an adapter; fails on an invalid configuration
    pub fn new(classifier: C, config: PredictorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { classifier, config })
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    /// Score every image, returning an (images × classes) matrix
    pub fn predict_batch(&self, images: &[Image]) -> Result<Array2<f64>> {
        let first = images.first().ok_or_else(|| {
            LimeError::InvalidArgument("predict_batch needs at least one image".to_string())
        })?;
        let batch_size = self.config.effective_batch_size(first.pixels().len());

        let mut scores: Vec<f64> = Vec::new();
        let mut width: Option<usize> = None;

        for (chunk_idx, chunk) in images.chunks(batch_size).enumerate() {
            debug!(chunk = chunk_idx, size = chunk.len(), "querying classifier");

            let output = self.classifier.predict(chunk).map_err(|e| LimeError::PredictorError {
                message: format!(
                    "classifier failed on chunk {} ({} images)",
                    chunk_idx,
                    chunk.len()
                ),
                source: Some(e),
            })?;

            if output.nrows() != chunk.len() {
                return Err(LimeError::predictor(format!(
                    "classifier returned {} rows for {} images",
                    output.nrows(),
                    chunk.len()
                )));
            }

            let expected = *width.get_or_insert(output.ncols());
            if expected == 0 {
                return Err(LimeError::predictor("classifier returned zero classes"));
            }
            if output.ncols() != expected {
                return Err(LimeError::predictor(format!(
                    "classifier output width changed from {} to {} on chunk {}",
                    expected,
                    output.ncols(),
                    chunk_idx
                )));
            }
            if output.iter().any(|v| !v.is_finite()) {
                return Err(LimeError::predictor(format!(
                    "classifier returned non-finite scores on chunk {}",
                    chunk_idx
                )));
            }

            scores.extend(output.iter().copied());
        }

        let width = width.unwrap_or(0);
        Ok(Array2::from_shape_vec((images.len(), width), scores)?)
    }

    /// Score a single image
    pub fn predict_one(&self, image: &Image) -> Result<Array1<f64>> {
        let scores = self.predict_batch(std::slice::from_ref(image))?;
        Ok(scores.row(0).to_owned())
    }
}
