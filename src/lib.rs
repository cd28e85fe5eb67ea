//! superpixel-lime - Local surrogate explanations for image classifiers
//!
//! Explains a black-box image classifier by switching superpixel segments
//! on and off, scoring the perturbed images, and fitting a distance-weighted
//! linear model whose coefficients rank the segments by importance.
//!
//! # Modules
//!
//! ## Inputs
//! - [`image`] - Images, segmentation maps, and the segmenter interface
//! - [`sampling`] - Random segment-presence samples
//!
//! ## Pipeline stages
//! - [`perturbation`] - Rendering samples into perturbed images
//! - [`predict`] - Batched calls into the external classifier
//! - [`distance`] - Sample distances and kernel weights
//! - [`surrogate`] - Weighted linear surrogate fitting and segment selection
//! - [`explanation`] - Ranked contributions and segment masks
//!
//! ## Composition
//! - [`pipeline`] - [`LimeImageExplainer`](pipeline::LimeImageExplainer) and its configuration
//!
//! # Example
//!
//! ```no_run
//! use ndarray::Array2;
//! use superpixel_lime::prelude::*;
//!
//! let image = Image::filled(2, 2, &[200, 200, 200])?;
//! let segments = SegmentationMap::from_labels(2, 2, vec![0, 1, 2, 3])?;
//!
//! let classifier = |images: &[Image]| -> std::result::Result<Array2<f64>, ClassifierError> {
//!     Ok(Array2::from_shape_fn((images.len(), 1), |(i, _)| {
//!         f64::from(images[i].pixel(0, 0)[0]) / 255.0
//!     }))
//! };
//!
//! let explainer = LimeImageExplainer::new(classifier, ExplainerConfig::new().with_seed(42))?;
//! for explanation in explainer.explain(&image, &segments, &[0])? {
//!     println!("{:?}", explanation.segment_ids());
//! }
//! # Ok::<(), superpixel_lime::LimeError>(())
//! ```

// Core error handling
pub mod error;

// Inputs
pub mod image;
pub mod sampling;

// Pipeline stages
pub mod perturbation;
pub mod predict;
pub mod distance;
pub mod surrogate;
pub mod explanation;

// Composition
pub mod pipeline;

pub use error::{LimeError, Result};

/// Re-export commonly used types
pub mod prelude {
    // Error handling
    pub use crate::error::{ClassifierError, LimeError, Result};

    // Inputs
    pub use crate::image::{Image, SegmentIndex, SegmentationMap, SegmentationMethod, SegmentationParams, Segmenter};
    pub use crate::sampling::{generate_samples, SampleGenerator, Samples};

    // Stages
    pub use crate::perturbation::{BackgroundPolicy, PerturbationEngine};
    pub use crate::predict::{Classifier, PredictorAdapter, PredictorConfig};
    pub use crate::distance::{compute_distances, image_distances, kernel, kernel_weights, DistanceMetric, ImageNorm};
    pub use crate::surrogate::{SegmentSelection, SurrogateFitter, SurrogateKind, SurrogateModel};
    pub use crate::explanation::{assemble, Assembler, ContributionSign, Explanation, ExplanationSummary, SegmentContribution, SignFilter};

    // Pipeline
    pub use crate::pipeline::{ExplainerConfig, LimeImageExplainer};
}
