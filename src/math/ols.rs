//! Weighted least squares solver.
//!
//! Every IRLS iteration solves a small weighted regression of the form:
//!
//! ```text
//! minimize Σ w_i (z_i - x_i^T β)^2
//! ```
//!
//! Implementation choices:
//! - We scale rows by `sqrt(w_i)` and solve an ordinary least squares problem.
//! - The solve uses SVD so a tall design (many more rows than columns) is
//!   handled directly. (Nalgebra's `QR::solve` is intended for square systems
//!   and will panic for non-square matrices.)
//! - The unscaled covariance `(X'WX)^-1` is assembled from the same SVD as
//!   `V Σ^-2 V^T`, after rejecting designs whose condition number says the
//!   predictor carries no information.

use nalgebra::{DMatrix, DVector, Dyn, SVD};

/// Smallest admissible ratio of smallest to largest singular value.
const RANK_TOL: f64 = 1e-10;

/// Solution of a weighted least squares problem.
#[derive(Debug, Clone)]
pub struct WlsSolution {
    pub beta: DVector<f64>,
    /// `(X'WX)^-1`.
    pub xtwx_inv: DMatrix<f64>,
}

/// Solve a least squares problem from a precomputed SVD (with `U` and `V^T`).
///
/// Returns `None` if the system is too ill-conditioned to solve robustly.
fn solve_svd(svd: &SVD<f64, Dyn, Dyn>, y: &DVector<f64>) -> Option<DVector<f64>> {
    // Try progressively looser tolerances if strict solve fails.
    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}

/// Solve `min Σ w_i (y_i - x_i^T β)^2` and return `β` with `(X'WX)^-1`.
///
/// Returns `None` when weights are invalid, the design is rank deficient, or
/// the solution is not finite.
pub fn weighted_least_squares(
    x: &DMatrix<f64>,
    y: &DVector<f64>,
    w: &DVector<f64>,
) -> Option<WlsSolution> {
    let n = x.nrows();
    if y.len() != n || w.len() != n {
        return None;
    }
    if w.iter().any(|v| !v.is_finite() || *v < 0.0) {
        return None;
    }

    let mut xw = x.clone();
    let mut yw = y.clone();
    for i in 0..n {
        let sw = w[i].sqrt();
        for j in 0..x.ncols() {
            xw[(i, j)] *= sw;
        }
        yw[i] *= sw;
    }

    let svd = xw.svd(true, true);
    let s_max = svd.singular_values.max();
    let s_min = svd.singular_values.min();
    if !(s_max.is_finite() && s_min > s_max * RANK_TOL) {
        return None;
    }

    let beta = solve_svd(&svd, &yw)?;
    let v_t = svd.v_t.as_ref()?;
    let inv_s2 = DMatrix::from_diagonal(&svd.singular_values.map(|s| 1.0 / (s * s)));
    let xtwx_inv = v_t.transpose() * inv_s2 * v_t;
    if xtwx_inv.iter().any(|v| !v.is_finite()) {
        return None;
    }

    Some(WlsSolution { beta, xtwx_inv })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_weights_solve_simple_system() {
        // Fit y = 2 + 3x on x = [0,1,2]
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[2.0, 5.0, 8.0]);
        let w = DVector::from_element(3, 1.0);

        let sol = weighted_least_squares(&x, &y, &w).unwrap();
        assert!((sol.beta[0] - 2.0).abs() < 1e-10);
        assert!((sol.beta[1] - 3.0).abs() < 1e-10);
    }

    #[test]
    fn one_decomposition_gives_solution_and_covariance() {
        // Non-uniform weights: beta must match the normal equations built from
        // the covariance of the same solve.
        let x = DMatrix::from_row_slice(4, 2, &[1.0, -1.0, 1.0, 0.0, 1.0, 0.5, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[0.3, 1.1, 1.4, 3.2]);
        let w = DVector::from_row_slice(&[2.0, 1.0, 0.5, 3.0]);

        let sol = weighted_least_squares(&x, &y, &w).unwrap();
        let xtw = x.transpose() * DMatrix::from_diagonal(&w);
        let expected = &sol.xtwx_inv * (&xtw * &y);
        assert!((sol.beta[0] - expected[0]).abs() < 1e-10);
        assert!((sol.beta[1] - expected[1]).abs() < 1e-10);
    }

    #[test]
    fn weighted_solution_ignores_zero_weight_rows() {
        // The last row is an outlier with zero weight.
        let x = DMatrix::from_row_slice(4, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0, 1.0, 3.0]);
        let y = DVector::from_row_slice(&[1.0, 2.0, 3.0, 100.0]);
        let w = DVector::from_row_slice(&[1.0, 1.0, 1.0, 0.0]);

        let sol = weighted_least_squares(&x, &y, &w).unwrap();
        assert!((sol.beta[0] - 1.0).abs() < 1e-10);
        assert!((sol.beta[1] - 1.0).abs() < 1e-10);
    }

    #[test]
    fn covariance_matches_closed_form() {
        // Unit weights: (X'X)^-1 for x = [0, 1, 2] is [[5/6, -1/2], [-1/2, 1/2]].
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 0.0, 1.0, 1.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[0.0, 1.0, 2.0]);
        let w = DVector::from_element(3, 1.0);

        let sol = weighted_least_squares(&x, &y, &w).unwrap();
        assert!((sol.xtwx_inv[(0, 0)] - 5.0 / 6.0).abs() < 1e-10);
        assert!((sol.xtwx_inv[(0, 1)] + 0.5).abs() < 1e-10);
        assert!((sol.xtwx_inv[(1, 1)] - 0.5).abs() < 1e-10);
    }

    #[test]
    fn constant_predictor_is_rejected() {
        let x = DMatrix::from_row_slice(3, 2, &[1.0, 2.0, 1.0, 2.0, 1.0, 2.0]);
        let y = DVector::from_row_slice(&[1.0, 2.0, 3.0]);
        let w = DVector::from_element(3, 1.0);
        assert!(weighted_least_squares(&x, &y, &w).is_none());
    }
}
