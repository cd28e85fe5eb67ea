//! Weighted least-squares solvers
//!
//! All solvers work on a weighted, centered design: rows are shifted by
//! the weighted means and scaled by `sqrt(w_i)`, so an ordinary normal
//! equation on the result solves the weighted problem and the intercept
//! is recovered from the means afterwards.

use crate::error::{LimeError, Result};
use ndarray::{Array1, Array2, ArrayView1, Axis};

/// Relative pivot size below which the normal matrix counts as singular
const PIVOT_TOLERANCE: f64 = 1e-10;

/// Weighted, centered and sqrt-weight-scaled regression problem
#[derive(Debug, Clone)]
pub(crate) struct WeightedDesign {
    pub x: Array2<f64>,
    pub y: Array1<f64>,
    pub x_mean: Array1<f64>,
    pub y_mean: f64,
}

impl WeightedDesign {
    pub fn new(x: &Array2<f64>, y: ArrayView1<'_, f64>, weights: &Array1<f64>) -> Self {
        let total: f64 = weights.sum();
        let x_mean = x.t().dot(weights) / total;
        let y_mean = y.dot(weights) / total;

        let sqrt_w = weights.mapv(f64::sqrt);
        let mut x_c = x - &x_mean.view().insert_axis(Axis(0));
        for (mut row, &s) in x_c.rows_mut().into_iter().zip(sqrt_w.iter()) {
            row *= s;
        }
        let y_c = (&y - y_mean) * &sqrt_w;

        Self {
            x: x_c,
            y: y_c,
            x_mean,
            y_mean,
        }
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    /// Intercept matching `coefficients` on the original, uncentered scale
    pub fn intercept(&self, coefficients: &Array1<f64>) -> f64 {
        self.y_mean - coefficients.dot(&self.x_mean)
    }
}

/// Solve `(XᵀX + αI) c = Xᵀy` on a weighted design
///
/// With `alpha == 0` a rank-deficient design fails with `SingularFit`.
pub(crate) fn solve_normal_equations(design: &WeightedDesign, alpha: f64) -> Result<Array1<f64>> {
    let n = design.n_features();
    if n == 0 {
        return Ok(Array1::zeros(0));
    }

    let mut xtx = design.x.t().dot(&design.x);
    for i in 0..n {
        xtx[[i, i]] += alpha;
    }
    let xty = design.x.t().dot(&design.y);

    if let Some(coefficients) = cholesky_solve(&xtx, &xty) {
        return Ok(coefficients);
    }
    if alpha > 0.0 {
        // regularized but numerically awkward, use pivoting elimination
        if let Some(coefficients) = gauss_jordan_solve(&xtx, &xty) {
            return Ok(coefficients);
        }
    }

    Err(LimeError::SingularFit(format!(
        "weighted design matrix with {} segment columns is rank-deficient; \
         increase the number of samples or enable ridge regularization",
        n
    )))
}

/// Weighted lasso by coordinate descent with soft thresholding
pub(crate) fn coordinate_descent_lasso(
    design: &WeightedDesign,
    alpha: f64,
    total_weight: f64,
    max_iter: usize,
    tol: f64,
) -> Array1<f64> {
    let x = &design.x;
    let n_features = x.ncols();
    let col_norms: Vec<f64> = (0..n_features)
        .map(|j| x.column(j).mapv(|v| v * v).sum())
        .collect();

    let lambda = alpha * total_weight;
    let mut w = Array1::zeros(n_features);
    let mut r = design.y.clone();

    for _iter in 0..max_iter {
        let mut max_change: f64 = 0.0;

        for j in 0..n_features {
            if col_norms[j] < 1e-15 {
                continue;
            }
            // rho = x_jᵀ r + ||x_j||² w_j
            let rho = x.column(j).dot(&r) + col_norms[j] * w[j];
            let old = w[j];
            w[j] = soft_threshold(rho, lambda) / col_norms[j];
            let delta = old - w[j];
            if delta != 0.0 {
                r.scaled_add(delta, &x.column(j));
                max_change = max_change.max(delta.abs());
            }
        }

        if max_change < tol {
            break;
        }
    }

    w
}

fn soft_threshold(value: f64, threshold: f64) -> f64 {
    if value > threshold {
        value - threshold
    } else if value < -threshold {
        value + threshold
    } else {
        0.0
    }
}

/// Cholesky solve of a symmetric positive-definite system
///
/// Returns `None` when a pivot is not clearly positive relative to the
/// largest diagonal entry.
fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if n != a.ncols() || n != b.len() {
        return None;
    }

    let scale = a.diag().iter().fold(0.0f64, |m, v| m.max(v.abs()));
    if scale <= 0.0 || !scale.is_finite() {
        return None;
    }
    let min_pivot = PIVOT_TOLERANCE * scale;

    // A = L * Lᵀ
    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let mut sum = 0.0;
            for k in 0..j {
                sum += l[[i, k]] * l[[j, k]];
            }
            if i == j {
                let diag = a[[i, i]] - sum;
                if diag <= min_pivot {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // L y = b
    let mut y = Array1::<f64>::zeros(n);
    for i in 0..n {
        let mut sum = 0.0;
        for j in 0..i {
            sum += l[[i, j]] * y[j];
        }
        y[i] = (b[i] - sum) / l[[i, i]];
    }

    // Lᵀ x = y
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let mut sum = 0.0;
        for j in (i + 1)..n {
            sum += l[[j, i]] * x[j];
        }
        x[i] = (y[i] - sum) / l[[i, i]];
    }

    Some(x)
}

/// Gauss-Jordan elimination with partial pivoting on `[A | b]`
fn gauss_jordan_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    let mut aug = Array2::<f64>::zeros((n, n + 1));
    aug.slice_mut(ndarray::s![.., ..n]).assign(a);
    aug.column_mut(n).assign(b);

    for col in 0..n {
        let pivot_row = (col..n)
            .max_by(|&r1, &r2| {
                aug[[r1, col]]
                    .abs()
                    .partial_cmp(&aug[[r2, col]].abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .unwrap_or(col);

        if pivot_row != col {
            for j in 0..=n {
                aug.swap([col, j], [pivot_row, j]);
            }
        }

        let pivot = aug[[col, col]];
        if pivot.abs() < 1e-12 {
            return None;
        }
        for j in 0..=n {
            aug[[col, j]] /= pivot;
        }

        for row in 0..n {
            if row != col {
                let factor = aug[[row, col]];
                if factor != 0.0 {
                    for j in 0..=n {
                        aug[[row, j]] -= factor * aug[[col, j]];
                    }
                }
            }
        }
    }

    Some(aug.column(n).to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_cholesky_matches_known_solution() {
        let a = array![[4.0, 2.0], [2.0, 3.0]];
        let b = array![2.0, 1.0];
        let x = cholesky_solve(&a, &b).unwrap();
        assert!((x[0] - 0.5).abs() < 1e-12);
        assert!(x[1].abs() < 1e-12);
    }

    #[test]
    fn test_cholesky_rejects_singular() {
        let a = array![[1.0, 1.0], [1.0, 1.0]];
        assert!(cholesky_solve(&a, &array![1.0, 1.0]).is_none());
    }

    #[test]
    fn test_gauss_jordan_needs_pivoting() {
        let a = array![[0.0, 1.0], [1.0, 0.0]];
        let x = gauss_jordan_solve(&a, &array![3.0, 4.0]).unwrap();
        assert_eq!(x.to_vec(), vec![4.0, 3.0]);
    }

    #[test]
    fn test_weighted_design_zero_weight_rows_ignored() {
        let x = array![[1.0], [0.0], [1.0]];
        let y = array![3.0, 1.0, 100.0];
        let w = array![1.0, 1.0, 0.0];
        let design = WeightedDesign::new(&x, y.view(), &w);
        let coef = solve_normal_equations(&design, 0.0).unwrap();
        assert!((coef[0] - 2.0).abs() < 1e-10);
        assert!((design.intercept(&coef) - 1.0).abs() < 1e-10);
    }

    #[test]
    fn test_duplicate_columns_are_singular_without_ridge() {
        let x = array![[1.0, 1.0], [0.0, 0.0], [1.0, 1.0], [0.0, 0.0]];
        let y = array![1.0, 0.0, 1.0, 0.0];
        let design = WeightedDesign::new(&x, y.view(), &Array1::ones(4));
        assert!(matches!(
            solve_normal_equations(&design, 0.0),
            Err(LimeError::SingularFit(_))
        ));
        let ridge = solve_normal_equations(&design, 0.1).unwrap();
        assert!((ridge[0] - ridge[1]).abs() < 1e-12);
    }

    #[test]
    fn test_lasso_shrinks_to_zero() {
        let x = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0], [0.0, 0.0]];
        let y = array![2.0, 0.01, 2.01, 0.0];
        let w = Array1::ones(4);
        let design = WeightedDesign::new(&x, y.view(), &w);
        let coef = coordinate_descent_lasso(&design, 0.05, 4.0, 1000, 1e-10);
        assert!(coef[0] > 1.0);
        assert_eq!(coef[1], 0.0);
    }
}
