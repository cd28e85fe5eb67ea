//! Explainer configuration

use crate::distance::DistanceMetric;
use crate::error::{LimeError, Result};
use crate::explanation::{Assembler, SignFilter};
use crate::perturbation::BackgroundPolicy;
use crate::predict::PredictorConfig;
use crate::sampling::validate_sampling;
use crate::surrogate::{SegmentSelection, SurrogateFitter, SurrogateKind};
use serde::{Deserialize, Serialize};

/// Configuration for one explanation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainerConfig {
    /// Number of perturbed samples, including the unperturbed reference
    pub num_samples: usize,

    /// Probability that a segment is kept in a sample
    pub probability: f64,

    /// Seed for sample generation; `None` draws from OS entropy
    pub seed: Option<u64>,

    /// Images per classifier call
    pub batch_size: usize,

    /// Memory budget for one classifier call
    pub max_memory_bytes: Option<usize>,

    /// Number of rayon workers; `None` uses the global pool
    pub n_workers: Option<usize>,

    /// Width of the exponential kernel
    pub kernel_width: f64,

    pub distance: DistanceMetric,

    pub surrogate: SurrogateKind,

    pub selection: SegmentSelection,

    /// Maximum number of segments in each explanation; `None` keeps all
    pub top_k: Option<usize>,

    pub sign_filter: SignFilter,

    /// Keep segments until they cover this fraction of the image
    pub coverage: Option<f64>,

    pub background: BackgroundPolicy,
}

impl Default for ExplainerConfig {
    fn default() -> Self {
        Self {
            num_samples: 1000,
            probability: 0.5,
            seed: None,
            batch_size: 32,
            max_memory_bytes: None,
            n_workers: None,
            kernel_width: 0.25,
            distance: DistanceMetric::Cosine,
            surrogate: SurrogateKind::Ridge { alpha: 1.0 },
            selection: SegmentSelection::All,
            top_k: Some(5),
            sign_filter: SignFilter::Positive,
            coverage: None,
            background: BackgroundPolicy::default(),
        }
    }
}

impl ExplainerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_num_samples(mut self, n: usize) -> Self {
        self.num_samples = n;
        self
    }

    pub fn with_probability(mut self, p: f64) -> Self {
        self.probability = p;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn with_max_memory(mut self, bytes: usize) -> Self {
        self.max_memory_bytes = Some(bytes);
        self
    }

    pub fn with_n_workers(mut self, n: usize) -> Self {
        self.n_workers = Some(n);
        self
    }

    pub fn with_kernel_width(mut self, width: f64) -> Self {
        self.kernel_width = width;
        self
    }

    pub fn with_distance(mut self, distance: DistanceMetric) -> Self {
        self.distance = distance;
        self
    }

    pub fn with_surrogate(mut self, surrogate: SurrogateKind) -> Self {
        self.surrogate = surrogate;
        self
    }

    pub fn with_selection(mut self, selection: SegmentSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_top_k(mut self, top_k: Option<usize>) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn with_sign_filter(mut self, filter: SignFilter) -> Self {
        self.sign_filter = filter;
        self
    }

    pub fn with_coverage(mut self, coverage: f64) -> Self {
        self.coverage = Some(coverage);
        self
    }

    pub fn with_background(mut self, background: BackgroundPolicy) -> Self {
        self.background = background;
        self
    }

    /// Check every field that does not depend on the image
    pub fn validate(&self) -> Result<()> {
        if self.num_samples == 0 {
            return Err(LimeError::invalid_parameter(
                "num_samples",
                self.num_samples,
                "must be >= 1",
            ));
        }
        if !(self.probability > 0.0 && self.probability < 1.0) {
            return Err(LimeError::invalid_parameter(
                "probability",
                self.probability,
                "must be in (0, 1)",
            ));
        }
        if self.n_workers == Some(0) {
            return Err(LimeError::invalid_parameter("n_workers", 0, "must be >= 1"));
        }
        if self.kernel_width.is_nan() || self.kernel_width <= 0.0 {
            return Err(LimeError::invalid_parameter(
                "kernel_width",
                self.kernel_width,
                "must be > 0",
            ));
        }
        if let DistanceMetric::External(distances) = &self.distance {
            // external distances only line up with rows of a seeded sample
            if self.seed.is_none() {
                return Err(LimeError::invalid_parameter(
                    "seed",
                    "None",
                    "external distances require a fixed seed",
                ));
            }
            if distances.len() != self.num_samples {
                return Err(LimeError::invalid_parameter(
                    "distance",
                    format!("{} external distances", distances.len()),
                    format!("must match num_samples = {}", self.num_samples),
                ));
            }
        }
        self.distance.validate()?;
        self.predictor_config().validate()?;
        self.fitter().validate()?;
        self.assembler().validate()
    }

    /// Validation that also needs the number of segments
    pub(crate) fn validate_for_segments(&self, num_segments: usize) -> Result<()> {
        validate_sampling(num_segments, self.num_samples, self.probability)
    }

    pub fn predictor_config(&self) -> PredictorConfig {
        let config = PredictorConfig::new().with_batch_size(self.batch_size);
        match self.max_memory_bytes {
            Some(bytes) => config.with_max_memory(bytes),
            None => config,
        }
    }

    pub fn fitter(&self) -> SurrogateFitter {
        SurrogateFitter::new(self.surrogate).with_selection(self.selection)
    }

    pub fn assembler(&self) -> Assembler {
        let assembler = Assembler::new(self.top_k, self.sign_filter);
        match self.coverage {
            Some(coverage) => assembler.with_coverage(coverage),
            None => assembler,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
