//! Weighted linear surrogate models
//!
//! Fits `y ≈ intercept + Σ_j c_j · s_j` over segment-presence samples,
//! weighting each sample by its kernel similarity to the unperturbed
//! image. Coefficients are the per-segment importances. Every target
//! class is fitted independently.

mod selection;
mod solver;

pub use selection::{rank_by_magnitude, SegmentSelection};

use crate::error::{LimeError, Result};
use crate::sampling::Samples;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use solver::{coordinate_descent_lasso, solve_normal_equations, WeightedDesign};

/// Regression used for the surrogate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SurrogateKind {
    /// Plain weighted least squares; fails on rank-deficient designs
    LinearRegression,
    /// L2-penalized weighted least squares
    Ridge { alpha: f64 },
    /// L1-penalized weighted least squares (coordinate descent)
    Lasso { alpha: f64 },
}

impl Default for SurrogateKind {
    fn default() -> Self {
        SurrogateKind::Ridge { alpha: 1.0 }
    }
}

impl SurrogateKind {
    pub fn validate(&self) -> Result<()> {
        match *self {
            SurrogateKind::LinearRegression => Ok(()),
            SurrogateKind::Ridge { alpha } | SurrogateKind::Lasso { alpha } => {
                if alpha.is_finite() && alpha > 0.0 {
                    Ok(())
                } else {
                    Err(LimeError::invalid_parameter(
                        "alpha",
                        alpha,
                        "must be finite and > 0",
                    ))
                }
            }
        }
    }
}

/// Fitted surrogate for one target class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurrogateModel {
    /// Target class, when fitted from a prediction matrix
    pub class_index: Option<usize>,
    /// One coefficient per segment; exactly 0 for segments not selected
    pub coefficients: Array1<f64>,
    pub intercept: f64,
    /// Segments used by the final fit, ascending
    pub selected: Vec<usize>,
    /// Weighted R² on the training samples
    pub score: f64,
    /// Surrogate output for the unperturbed image
    pub local_prediction: f64,
}

impl SurrogateModel {
    pub fn num_segments(&self) -> usize {
        self.coefficients.len()
    }

    pub fn coefficient(&self, segment: usize) -> f64 {
        self.coefficients[segment]
    }

    /// Surrogate output for every sample row
    pub fn predict(&self, samples: &Samples) -> Result<Array1<f64>> {
        if samples.ncols() != self.num_segments() {
            return Err(LimeError::ShapeError {
                expected: format!("{} segments", self.num_segments()),
                actual: format!("{} segments", samples.ncols()),
            });
        }
        Ok(presence_matrix(samples).dot(&self.coefficients) + self.intercept)
    }
}

/// Fits weighted surrogates
#[derive(Debug, Clone)]
pub struct SurrogateFitter {
    kind: SurrogateKind,
    selection: SegmentSelection,
    /// Coordinate-descent iteration cap (lasso only)
    max_iter: usize,
    /// Coordinate-descent tolerance (lasso only)
    tol: f64,
}

impl Default for SurrogateFitter {
    fn default() -> Self {
        Self::new(SurrogateKind::default())
    }
}

impl SurrogateFitter {
    pub fn new(kind: SurrogateKind) -> Self {
        Self {
            kind,
            selection: SegmentSelection::All,
            max_iter: 1000,
            tol: 1e-8,
        }
    }

    pub fn with_selection(mut self, selection: SegmentSelection) -> Self {
        self.selection = selection;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter.max(1);
        self
    }

    pub fn kind(&self) -> SurrogateKind {
        self.kind
    }

    pub fn selection(&self) -> SegmentSelection {
        self.selection
    }

    pub fn validate(&self) -> Result<()> {
        self.kind.validate()?;
        self.selection.validate()
    }

    /// Fit one surrogate to `targets` (one score per sample)
    pub fn fit(
        &self,
        samples: &Samples,
        targets: ArrayView1<'_, f64>,
        weights: &Array1<f64>,
    ) -> Result<SurrogateModel> {
        self.validate()?;
        check_inputs(samples, targets, weights)?;

        let x = presence_matrix(samples);
        let n_features = x.ncols();
        let target = self.selection.target_size(n_features);

        let selected: Vec<usize> = match self.selection {
            _ if target == n_features => (0..n_features).collect(),
            SegmentSelection::ByWeight { .. } => {
                let all: Vec<usize> = (0..n_features).collect();
                let (full, _) = self.solve_subset(&x, targets, weights, &all)?;
                let mut keep: Vec<usize> = rank_by_magnitude(&full.to_vec())
                    .into_iter()
                    .take(target)
                    .collect();
                keep.sort_unstable();
                keep
            }
            SegmentSelection::ForwardSelection { .. } => {
                selection::forward_select(n_features, target, |subset| {
                    match self.solve_subset(&x, targets, weights, subset) {
                        Ok((coef, intercept)) => Ok(Some(weighted_rss(
                            &x.select(Axis(1), subset),
                            &coef,
                            intercept,
                            targets,
                            weights,
                        ))),
                        Err(LimeError::SingularFit(_)) => Ok(None),
                        Err(e) => Err(e),
                    }
                })?
            }
            SegmentSelection::All => (0..n_features).collect(),
        };

        let (subset_coef, intercept) = self.solve_subset(&x, targets, weights, &selected)?;
        let mut coefficients = Array1::zeros(n_features);
        for (&segment, &c) in selected.iter().zip(subset_coef.iter()) {
            coefficients[segment] = c;
        }

        let score = weighted_r2(&x.dot(&coefficients), intercept, targets, weights);
        let local_prediction = intercept + coefficients.sum();

        Ok(SurrogateModel {
            class_index: None,
            coefficients,
            intercept,
            selected,
            score,
            local_prediction,
        })
    }

    /// Fit the surrogate for column `class_index` of `predictions`
    pub fn fit_class(
        &self,
        samples: &Samples,
        predictions: &Array2<f64>,
        weights: &Array1<f64>,
        class_index: usize,
    ) -> Result<SurrogateModel> {
        if class_index >= predictions.ncols() {
            return Err(LimeError::InvalidArgument(format!(
                "class index {} out of range for {} classes",
                class_index,
                predictions.ncols()
            )));
        }
        let mut model = self.fit(samples, predictions.column(class_index), weights)?;
        model.class_index = Some(class_index);
        Ok(model)
    }

    /// Fit one independent surrogate per class, in parallel across classes
    pub fn fit_classes(
        &self,
        samples: &Samples,
        predictions: &Array2<f64>,
        weights: &Array1<f64>,
        class_indices: &[usize],
    ) -> Result<Vec<SurrogateModel>> {
        class_indices
            .par_iter()
            .map(|&class_index| self.fit_class(samples, predictions, weights, class_index))
            .collect()
    }

    /// Coefficients (in `subset` order) and intercept of a fit restricted to `subset`
    fn solve_subset(
        &self,
        x: &Array2<f64>,
        targets: ArrayView1<'_, f64>,
        weights: &Array1<f64>,
        subset: &[usize],
    ) -> Result<(Array1<f64>, f64)> {
        let design = WeightedDesign::new(&x.select(Axis(1), subset), targets, weights);
        let coefficients = match self.kind {
            SurrogateKind::LinearRegression => solve_normal_equations(&design, 0.0)?,
            SurrogateKind::Ridge { alpha } => solve_normal_equations(&design, alpha)?,
            SurrogateKind::Lasso { alpha } => {
                coordinate_descent_lasso(&design, alpha, weights.sum(), self.max_iter, self.tol)
            }
        };
        let intercept = design.intercept(&coefficients);
        Ok((coefficients, intercept))
    }
}

/// Samples as a 0/1 design matrix
fn presence_matrix(samples: &Samples) -> Array2<f64> {
    samples.mapv(|present| if present { 1.0 } else { 0.0 })
}

fn check_inputs(samples: &Samples, targets: ArrayView1<'_, f64>, weights: &Array1<f64>) -> Result<()> {
    let (num_samples, num_segments) = samples.dim();
    if num_samples == 0 || num_segments == 0 {
        return Err(LimeError::InvalidArgument(format!(
            "samples must be non-empty, got {}x{}",
            num_samples, num_segments
        )));
    }
    if targets.len() != num_samples {
        return Err(LimeError::ShapeError {
            expected: format!("{} targets", num_samples),
            actual: format!("{}", targets.len()),
        });
    }
    if weights.len() != num_samples {
        return Err(LimeError::ShapeError {
            expected: format!("{} weights", num_samples),
            actual: format!("{}", weights.len()),
        });
    }
    if targets.iter().any(|t| !t.is_finite()) {
        return Err(LimeError::InvalidArgument(
            "targets must be finite".to_string(),
        ));
    }
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err(LimeError::InvalidArgument(
            "weights must be finite and >= 0".to_string(),
        ));
    }
    if weights.sum() <= 0.0 {
        return Err(LimeError::InvalidArgument(
            "at least one weight must be positive".to_string(),
        ));
    }
    Ok(())
}

fn weighted_rss(
    x: &Array2<f64>,
    coefficients: &Array1<f64>,
    intercept: f64,
    targets: ArrayView1<'_, f64>,
    weights: &Array1<f64>,
) -> f64 {
    let fitted = x.dot(coefficients) + intercept;
    let residuals = &targets - &fitted;
    (&residuals * &residuals * weights).sum()
}

fn weighted_r2(
    fitted_without_intercept: &Array1<f64>,
    intercept: f64,
    targets: ArrayView1<'_, f64>,
    weights: &Array1<f64>,
) -> f64 {
    let total = weights.sum();
    let y_mean = targets.dot(weights) / total;
    let residuals = &targets - &(fitted_without_intercept + intercept);
    let ss_res = (&residuals * &residuals * weights).sum();
    let ss_tot = (targets.mapv(|y| (y - y_mean).powi(2)) * weights).sum();

    if ss_tot == 0.0 {
        return 1.0;
    }
    1.0 - ss_res / ss_tot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::generate_samples;
    use ndarray::array;

    fn linear_targets(samples: &Samples, coefs: &[f64], intercept: f64) -> Array1<f64> {
        presence_matrix(samples).dot(&Array1::from_vec(coefs.to_vec())) + intercept
    }

    #[test]
    fn test_recovers_exact_linear_function() {
        let samples = generate_samples(6, 200, 0.5, Some(42)).unwrap();
        let truth = [1.5, -2.0, 0.0, 0.25, 3.0, -0.75];
        let y = linear_targets(&samples, &truth, 0.4);
        let weights = generate_samples(1, 200, 0.5, Some(7))
            .unwrap()
            .column(0)
            .mapv(|b| if b { 1.0 } else { 0.3 });

        let model = SurrogateFitter::new(SurrogateKind::LinearRegression)
            .fit(&samples, y.view(), &weights)
            .unwrap();

        for (j, &t) in truth.iter().enumerate() {
            assert!((model.coefficient(j) - t).abs() < 1e-8, "segment {}", j);
        }
        assert!((model.intercept - 0.4).abs() < 1e-8);
        assert!((model.score - 1.0).abs() < 1e-10);
        assert!((model.local_prediction - (0.4 + truth.iter().sum::<f64>())).abs() < 1e-8);
    }

    #[test]
    fn test_infinite_kernel_width_matches_unweighted_fit() {
        let samples = generate_samples(3, 40, 0.5, Some(3)).unwrap();
        // interaction term, so the linear fit is not exact
        let y: Array1<f64> = samples
            .rows()
            .into_iter()
            .map(|r| {
                let pair = if r[0] && r[1] { 3.0 } else { 0.5 };
                pair + if r[2] { 1.0 } else { 0.0 }
            })
            .collect();

        let distances = crate::distance::compute_distances(
            &samples,
            &crate::distance::DistanceMetric::Cosine,
            None,
        )
        .unwrap();
        let flat = crate::distance::kernel_weights(&distances, f64::INFINITY).unwrap();

        let fitter = SurrogateFitter::new(SurrogateKind::LinearRegression);
        let kernel_fit = fitter.fit(&samples, y.view(), &flat).unwrap();
        let ones = fitter.fit(&samples, y.view(), &Array1::ones(40)).unwrap();
        let scaled = fitter.fit(&samples, y.view(), &Array1::from_elem(40, 0.2)).unwrap();

        for j in 0..3 {
            assert!((kernel_fit.coefficient(j) - ones.coefficient(j)).abs() < 1e-10);
            assert!((scaled.coefficient(j) - ones.coefficient(j)).abs() < 1e-10);
        }
        assert!((scaled.intercept - ones.intercept).abs() < 1e-10);
        assert!(ones.score < 1.0);
    }

    #[test]
    fn test_single_segment() {
        let samples = generate_samples(1, 50, 0.5, Some(42)).unwrap();
        let y = linear_targets(&samples, &[2.0], 0.1);
        let model = SurrogateFitter::new(SurrogateKind::LinearRegression)
            .fit(&samples, y.view(), &Array1::ones(50))
            .unwrap();
        assert_eq!(model.num_segments(), 1);
        assert!((model.coefficient(0) - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_rank_deficient_without_ridge() {
        // segments 0 and 1 always appear together
        let samples = array![
            [true, true, true],
            [false, false, true],
            [true, true, false],
            [false, false, false],
            [true, true, true]
        ];
        let y = array![1.0, 0.0, 1.0, 0.0, 1.0];
        let w = Array1::ones(5);

        let err = SurrogateFitter::new(SurrogateKind::LinearRegression)
            .fit(&samples, y.view(), &w)
            .unwrap_err();
        assert!(matches!(err, LimeError::SingularFit(_)));

        let model = SurrogateFitter::new(SurrogateKind::Ridge { alpha: 0.01 })
            .fit(&samples, y.view(), &w)
            .unwrap();
        assert!(model.coefficients.iter().all(|c| c.is_finite()));
    }

    #[test]
    fn test_ridge_shrinks_coefficients() {
        let samples = generate_samples(4, 100, 0.5, Some(8)).unwrap();
        let y = linear_targets(&samples, &[1.0, 2.0, -1.0, 0.5], 0.0);
        let w = Array1::ones(100);
        let ols = SurrogateFitter::new(SurrogateKind::LinearRegression)
            .fit(&samples, y.view(), &w)
            .unwrap();
        let ridge = SurrogateFitter::new(SurrogateKind::Ridge { alpha: 10.0 })
            .fit(&samples, y.view(), &w)
            .unwrap();
        let norm = |m: &SurrogateModel| m.coefficients.mapv(|c| c * c).sum();
        assert!(norm(&ridge) < norm(&ols));
    }

    #[test]
    fn test_selection_by_weight_refits_subset() {
        let samples = generate_samples(5, 120, 0.5, Some(21)).unwrap();
        let y = linear_targets(&samples, &[0.1, 4.0, 0.0, -3.0, 0.2], 1.0);
        let model = SurrogateFitter::new(SurrogateKind::LinearRegression)
            .with_selection(SegmentSelection::ByWeight { num_segments: 2 })
            .fit(&samples, y.view(), &Array1::ones(120))
            .unwrap();

        assert_eq!(model.selected, vec![1, 3]);
        assert_eq!(model.coefficient(0), 0.0);
        assert_eq!(model.coefficient(4), 0.0);
        assert!((model.coefficient(1) - 4.0).abs() < 0.2);
        assert!((model.coefficient(3) + 3.0).abs() < 0.2);
    }

    #[test]
    fn test_forward_selection() {
        let samples = generate_samples(5, 120, 0.5, Some(22)).unwrap();
        let y = linear_targets(&samples, &[0.0, 0.0, 5.0, 0.0, -2.0], 0.0);
        let model = SurrogateFitter::new(SurrogateKind::Ridge { alpha: 0.001 })
            .with_selection(SegmentSelection::ForwardSelection { num_segments: 2 })
            .fit(&samples, y.view(), &Array1::ones(120))
            .unwrap();
        assert_eq!(model.selected, vec![2, 4]);
    }

    #[test]
    fn test_lasso_surrogate() {
        let samples = generate_samples(4, 150, 0.5, Some(4)).unwrap();
        let y = linear_targets(&samples, &[3.0, 0.0, 0.0, -2.0], 0.0);
        let model = SurrogateFitter::new(SurrogateKind::Lasso { alpha: 0.01 })
            .fit(&samples, y.view(), &Array1::ones(150))
            .unwrap();
        assert!(model.coefficient(0) > 2.5);
        assert!(model.coefficient(3) < -1.5);
        assert!(model.coefficient(1).abs() < 0.1);
    }

    #[test]
    fn test_classes_are_independent() {
        let samples = generate_samples(3, 60, 0.5, Some(5)).unwrap();
        let class0 = linear_targets(&samples, &[1.0, 0.0, 0.0], 0.0);
        let class1 = linear_targets(&samples, &[0.0, 0.0, -1.0], 0.0);
        let mut predictions = Array2::zeros((60, 2));
        predictions.column_mut(0).assign(&class0);
        predictions.column_mut(1).assign(&class1);
        let weights = Array1::ones(60);

        let fitter = SurrogateFitter::new(SurrogateKind::LinearRegression);
        let both = fitter.fit_classes(&samples, &predictions, &weights, &[0, 1]).unwrap();
        let alone = fitter.fit_class(&samples, &predictions, &weights, 1).unwrap();

        assert_eq!(both[0].class_index, Some(0));
        assert_eq!(both[1].coefficients, alone.coefficients);
        assert!((both[0].coefficient(0) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_input_validation() {
        let samples = generate_samples(2, 5, 0.5, Some(1)).unwrap();
        let fitter = SurrogateFitter::new(SurrogateKind::LinearRegression);
        let y = Array1::zeros(5);

        assert!(fitter.fit(&samples, y.view(), &Array1::ones(4)).is_err());
        assert!(fitter.fit(&samples, y.view(), &Array1::zeros(5)).is_err());
        assert!(fitter
            .fit(&samples, Array1::from_elem(5, f64::NAN).view(), &Array1::ones(5))
            .is_err());
        assert!(fitter
            .fit_class(&samples, &Array2::zeros((5, 2)), &Array1::ones(5), 2)
            .unwrap_err()
            .is_invalid_argument());
        assert!(SurrogateFitter::new(SurrogateKind::Ridge { alpha: 0.0 })
            .fit(&samples, y.view(), &Array1::ones(5))
            .is_err());
    }
}
