//! End-to-end explanation pipeline
//!
//! One request runs: sample generation → perturbation → prediction →
//! distances → kernel weights → one surrogate per class → assembly.
//! All request state lives on the stack of [`LimeImageExplainer::explain`],
//! so a single explainer can serve concurrent requests.

mod config;

pub use config::ExplainerConfig;

use crate::distance::{compute_distances, kernel_weights};
use crate::error::{LimeError, Result};
use crate::explanation::Explanation;
use crate::image::{Image, SegmentationMap};
use crate::perturbation::PerturbationEngine;
use crate::predict::{Classifier, PredictorAdapter};
use crate::sampling::{generate_samples, Samples};
use ndarray::{concatenate, Array2, Axis};
use rayon::ThreadPool;
use std::cmp::Ordering;
use tracing::{debug, info_span};

/// LIME explainer for image classifiers over superpixel segmentations
pub struct LimeImageExplainer<C: Classifier> {
    predictor: PredictorAdapter<C>,
    config: ExplainerConfig,
    pool: Option<ThreadPool>,
}

impl<C: Classifier> std::fmt::Debug for LimeImageExplainer<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LimeImageExplainer")
            .field("config", &self.config)
            .field("dedicated_pool", &self.pool.is_some())
            .finish()
    }
}

impl<C: Classifier> LimeImageExplainer<C> {
    /// Create an explainer; the whole configuration is validated here
    pub fn new(classifier: C, config: ExplainerConfig) -> Result<Self> {
        config.validate()?;
        let predictor = PredictorAdapter::new(classifier, config.predictor_config())?;

        let pool = match config.n_workers {
            Some(n_workers) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(n_workers)
                    .build()
                    .map_err(|e| LimeError::ThreadPoolError(e.to_string()))?,
            ),
            None => None,
        };

        Ok(Self {
            predictor,
            config,
            pool,
        })
    }

    pub fn config(&self) -> &ExplainerConfig {
        &self.config
    }

    pub fn predictor(&self) -> &PredictorAdapter<C> {
        &self.predictor
    }

    /// Explain each class in `class_indices` for `image`
    ///
    /// Results come back in the order of `class_indices`. A classifier
    /// failure aborts the whole request.
    pub fn explain<'a>(
        &self,
        image: &'a Image,
        segmentation: &'a SegmentationMap,
        class_indices: &[usize],
    ) -> Result<Vec<Explanation<'a>>> {
        let span = info_span!(
            "explain",
            segments = segmentation.num_segments(),
            samples = self.config.num_samples,
            classes = class_indices.len()
        );
        let _enter = span.enter();

        match &self.pool {
            Some(pool) => pool.install(|| self.run(image, segmentation, class_indices)),
            None => self.run(image, segmentation, class_indices),
        }
    }

    /// Explain the `k` classes the classifier scores highest on the unperturbed image
    pub fn explain_top_classes<'a>(
        &self,
        image: &'a Image,
        segmentation: &'a SegmentationMap,
        k: usize,
    ) -> Result<Vec<Explanation<'a>>> {
        if k == 0 {
            return Err(LimeError::invalid_parameter("k", k, "must be >= 1"));
        }
        self.check_request(image, segmentation)?;

        let scores = self.predictor.predict_one(image)?;
        let mut classes: Vec<usize> = (0..scores.len()).collect();
        classes.sort_by(|&a, &b| {
            scores[b]
                .partial_cmp(&scores[a])
                .unwrap_or(Ordering::Equal)
                .then(a.cmp(&b))
        });
        classes.truncate(k);
        debug!(?classes, "selected top classes");

        self.explain(image, segmentation, &classes)
    }

    fn check_request(&self, image: &Image, segmentation: &SegmentationMap) -> Result<()> {
        segmentation.check_matches(image)?;
        self.config.validate_for_segments(segmentation.num_segments())?;
        self.config.background.validate_for(image)
    }

    fn run<'a>(
        &self,
        image: &'a Image,
        segmentation: &'a SegmentationMap,
        class_indices: &[usize],
    ) -> Result<Vec<Explanation<'a>>> {
        if class_indices.is_empty() {
            return Err(LimeError::InvalidArgument(
                "at least one class index is required".to_string(),
            ));
        }
        self.check_request(image, segmentation)?;

        let engine = PerturbationEngine::new(segmentation, image, &self.config.background)?;
        let samples = generate_samples(
            engine.num_segments(),
            self.config.num_samples,
            self.config.probability,
            self.config.seed,
        )?;
        debug!(rows = samples.nrows(), cols = samples.ncols(), "samples generated");

        let predictions = self.score_samples(&engine, &samples)?;
        if let Some(&bad) = class_indices.iter().find(|&&c| c >= predictions.ncols()) {
            return Err(LimeError::InvalidArgument(format!(
                "class index {} out of range for {} classes",
                bad,
                predictions.ncols()
            )));
        }

        let distances = compute_distances(
            &samples,
            &self.config.distance,
            Some(engine.segment_index()),
        )?;
        let weights = kernel_weights(&distances, self.config.kernel_width)?;
        debug!(total_weight = weights.sum(), "kernel weights computed");

        let models = self
            .config
            .fitter()
            .fit_classes(&samples, &predictions, &weights, class_indices)?;
        debug!(models = models.len(), "surrogates fitted");

        let assembler = self.config.assembler();
        models
            .into_iter()
            .map(|model| assembler.assemble_indexed(model, segmentation, image, engine.segment_index()))
            .collect()
    }

    /// Render and score samples one predictor chunk at a time, so only a
    /// chunk of perturbed images is alive at once
    fn score_samples(&self, engine: &PerturbationEngine<'_>, samples: &Samples) -> Result<Array2<f64>> {
        let chunk_rows = self
            .predictor
            .config()
            .effective_batch_size(engine.image().pixels().len());

        let mut parts: Vec<Array2<f64>> = Vec::new();
        for (chunk, rows) in samples.axis_chunks_iter(Axis(0), chunk_rows).enumerate() {
            let images = engine.apply_batch(&rows.to_owned())?;
            let scores = self.predictor.predict_batch(&images)?;
            if let Some(first) = parts.first() {
                if first.ncols() != scores.ncols() {
                    return Err(LimeError::predictor(format!(
                        "classifier returned {} classes for chunk {} but {} before",
                        scores.ncols(),
                        chunk,
                        first.ncols()
                    )));
                }
            }
            parts.push(scores);
        }

        let views: Vec<_> = parts.iter().map(|p| p.view()).collect();
        let predictions = concatenate(Axis(0), &views)?;
        debug!(
            rows = predictions.nrows(),
            classes = predictions.ncols(),
            "predictions collected"
        );
        Ok(predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClassifierError;
    use crate::explanation::SignFilter;
    use crate::surrogate::SurrogateKind;
    use ndarray::array;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};

    /// Scores class 0 by the brightness of the left half, class 1 by the right half
    fn halves_classifier(images: &[Image]) -> std::result::Result<Array2<f64>, ClassifierError> {
        let mut out = Array2::zeros((images.len(), 2));
        for (i, image) in images.iter().enumerate() {
            out[[i, 0]] = f64::from(image.pixel(0, 0)[0]) / 255.0;
            out[[i, 1]] = f64::from(image.pixel(0, 1)[0]) / 255.0;
        }
        Ok(out)
    }

    fn fixture() -> (Image, SegmentationMap) {
        let image = Image::filled(1, 2, &[255, 255, 255]).unwrap();
        let map = SegmentationMap::new(array![[0, 1]]).unwrap();
        (image, map)
    }

    fn config() -> ExplainerConfig {
        ExplainerConfig::new()
            .with_seed(9)
            .with_num_samples(40)
            .with_batch_size(7)
            .with_surrogate(SurrogateKind::LinearRegression)
            .with_sign_filter(SignFilter::Both)
    }

    #[test]
    fn test_each_class_picks_its_segment() {
        let (image, map) = fixture();
        let explainer = LimeImageExplainer::new(halves_classifier, config()).unwrap();
        let explanations = explainer.explain(&image, &map, &[0, 1]).unwrap();

        assert_eq!(explanations.len(), 2);
        assert_eq!(explanations[0].class_index(), Some(0));
        assert_eq!(explanations[0].segment_ids()[0], 0);
        assert_eq!(explanations[1].segment_ids()[0], 1);
        assert!((explanations[0].model().coefficient(0) - 1.0).abs() < 1e-8);
    }

    #[test]
    fn test_chunked_scoring_calls_classifier_per_batch() {
        let (image, map) = fixture();
        let calls = AtomicUsize::new(0);
        let counting = |images: &[Image]| {
            calls.fetch_add(1, AtomicOrdering::SeqCst);
            halves_classifier(images)
        };
        let explainer = LimeImageExplainer::new(counting, config()).unwrap();
        explainer.explain(&image, &map, &[0]).unwrap();
        // 40 samples in chunks of 7
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 6);
    }

    #[test]
    fn test_top_classes() {
        let image = Image::from_raw(1, 2, 3, vec![10, 10, 10, 200, 200, 200]).unwrap();
        let map = SegmentationMap::new(array![[0, 1]]).unwrap();
        let explainer = LimeImageExplainer::new(halves_classifier, config()).unwrap();
        let explanations = explainer.explain_top_classes(&image, &map, 1).unwrap();
        assert_eq!(explanations.len(), 1);
        assert_eq!(explanations[0].class_index(), Some(1));
    }

    #[test]
    fn test_validation_before_prediction() {
        let (image, _) = fixture();
        let calls = AtomicUsize::new(0);
        let counting = |images: &[Image]| {
            calls.fetch_add(1, AtomicOrdering::SeqCst);
            halves_classifier(images)
        };
        let explainer = LimeImageExplainer::new(counting, config()).unwrap();

        let wrong_shape = SegmentationMap::new(array![[0], [1]]).unwrap();
        assert!(explainer.explain(&image, &wrong_shape, &[0]).is_err());
        assert!(explainer.explain_top_classes(&image, &wrong_shape, 1).is_err());
        assert!(explainer
            .explain(&image, &SegmentationMap::new(array![[0, 1]]).unwrap(), &[])
            .is_err());
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 0);
    }

    #[test]
    fn test_class_index_out_of_range() {
        let (image, map) = fixture();
        let explainer = LimeImageExplainer::new(halves_classifier, config()).unwrap();
        let err = explainer.explain(&image, &map, &[2]).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_dedicated_pool() {
        let (image, map) = fixture();
        let explainer = LimeImageExplainer::new(halves_classifier, config().with_n_workers(2)).unwrap();
        assert!(explainer.explain(&image, &map, &[0]).is_ok());
    }

    #[test]
    fn test_explainer_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<LimeImageExplainer<fn(&[Image]) -> std::result::Result<Array2<f64>, ClassifierError>>>();
    }
}
