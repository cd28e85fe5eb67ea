//! Segment-presence sampling
//!
//! Draws the binary presence vectors that drive perturbation. Row 0 is
//! always the all-present reference sample, which anchors the surrogate
//! regression at distance zero.

use crate::error::{LimeError, Result};
use ndarray::Array2;
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};

/// M×N presence matrix; entry (i, j) is true when segment j is kept in sample i
pub type Samples = Array2<bool>;

/// Bernoulli sampler for segment-presence vectors
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleGenerator {
    /// Probability that a segment is kept
    probability: f64,
    /// Random seed; `None` draws from OS entropy and is not reproducible
    seed: Option<u64>,
}

impl SampleGenerator {
    /// Create a sampler keeping each segment with probability 0.5
    pub fn new() -> Self {
        Self {
            probability: 0.5,
            seed: None,
        }
    }

    /// Set the probability that a segment is kept
    pub fn with_probability(mut self, p: f64) -> Self {
        self.probability = p;
        self
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Draw `num_samples` presence vectors over `num_segments` segments
    pub fn generate(&self, num_segments: usize, num_samples: usize) -> Result<Samples> {
        generate_samples(num_segments, num_samples, self.probability, self.seed)
    }
}

impl Default for SampleGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Check sampling arguments without drawing anything
pub fn validate_sampling(num_segments: usize, num_samples: usize, p: f64) -> Result<()> {
    if num_segments < 1 {
        return Err(LimeError::InvalidArgument(
            "num_segments must be >= 1".to_string(),
        ));
    }
    if num_samples < 1 {
        return Err(LimeError::InvalidArgument(
            "num_samples must be >= 1".to_string(),
        ));
    }
    if !(0.0..=1.0).contains(&p) {
        return Err(LimeError::InvalidArgument(format!(
            "probability must be in [0, 1], got {}",
            p
        )));
    }
    Ok(())
}

/// Draw an M×N matrix of Bernoulli(p) presence bits with row 0 forced to all true
///
/// With `seed = Some(_)` the output is bit-reproducible. With `None` the
/// generator is seeded from OS entropy and repeated calls differ.
pub fn generate_samples(
    num_segments: usize,
    num_samples: usize,
    p: f64,
    seed: Option<u64>,
) -> Result<Samples> {
    validate_sampling(num_segments, num_samples, p)?;

    let mut rng = match seed {
        Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
        None => Xoshiro256PlusPlus::from_entropy(),
    };

    let mut samples = Array2::from_elem((num_samples, num_segments), true);
    for mut row in samples.rows_mut().into_iter().skip(1) {
        for bit in row.iter_mut() {
            *bit = rng.gen_bool(p);
        }
    }

    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_and_reference_row() {
        for n in 1..6 {
            let samples = generate_samples(n, 20, 0.5, Some(7)).unwrap();
            assert_eq!(samples.dim(), (20, n));
            assert!(samples.row(0).iter().all(|&b| b));
        }
    }

    #[test]
    fn test_seed_reproducible() {
        let a = generate_samples(8, 100, 0.5, Some(42)).unwrap();
        let b = generate_samples(8, 100, 0.5, Some(42)).unwrap();
        let c = generate_samples(8, 100, 0.5, Some(43)).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_extreme_probabilities() {
        let all = generate_samples(5, 10, 1.0, Some(1)).unwrap();
        assert!(all.iter().all(|&b| b));

        let none = generate_samples(5, 10, 0.0, Some(1)).unwrap();
        assert!(none.row(0).iter().all(|&b| b));
        assert!(none.rows().into_iter().skip(1).all(|r| r.iter().all(|&b| !b)));
    }

    #[test]
    fn test_probability_is_respected() {
        let samples = generate_samples(10, 2001, 0.3, Some(3)).unwrap();
        let kept = samples.rows().into_iter().skip(1).flatten().filter(|&&b| b).count();
        let rate = kept as f64 / 20_000.0;
        assert!((rate - 0.3).abs() < 0.02, "keep rate {}", rate);
    }

    #[test]
    fn test_invalid_arguments() {
        assert!(generate_samples(0, 10, 0.5, None).unwrap_err().is_invalid_argument());
        assert!(generate_samples(3, 0, 0.5, None).is_err());
        assert!(generate_samples(3, 10, 1.5, None).is_err());
        assert!(generate_samples(3, 10, f64::NAN, None).is_err());
    }

    #[test]
    fn test_generator_builder() {
        let generator = SampleGenerator::new().with_probability(0.25).with_seed(9);
        let a = generator.generate(4, 30).unwrap();
        let b = generate_samples(4, 30, 0.25, Some(9)).unwrap();
        assert_eq!(a, b);
    }
}
