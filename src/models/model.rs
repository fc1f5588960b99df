//! Linear predictor evaluation for the single-predictor GLM.
//!
//! The fitter relies on two primitive operations:
//! - build a design row for a given predictor value (for weighted least squares)
//! - predict `mu(x)` given coefficients and a link (for deviance, curves, comparisons)

use crate::domain::LinkKind;
use crate::math::inverse_link;

/// Number of coefficients: intercept and slope.
pub const N_COEF: usize = 2;

/// Coefficient labels in design-column order.
pub const COEF_NAMES: [&str; N_COEF] = ["(Intercept)", "x"];

/// Fill a design row `[1, x]`.
///
/// # Panics
/// Panics if `out` has fewer than `N_COEF` elements.
pub fn fill_design_row(x: f64, out: &mut [f64]) {
    out[0] = 1.0;
    out[1] = x;
}

/// `eta = intercept + slope * x`.
pub fn linear_predictor(intercept: f64, slope: f64, x: f64) -> f64 {
    intercept + slope * x
}

/// Predict the mean `g⁻¹(intercept + slope * x)`.
pub fn predict(link: LinkKind, intercept: f64, slope: f64, x: f64) -> f64 {
    inverse_link(link, linear_predictor(intercept, slope, x))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predict_log_link() {
        let mu = predict(LinkKind::Log, 0.5, 1.3, 1.0);
        assert!((mu - 1.8_f64.exp()).abs() < 1e-12);
    }

    #[test]
    fn predict_logit_at_zero_eta_is_half() {
        let mu = predict(LinkKind::Logit, 1.0, -2.0, 0.5);
        assert!((mu - 0.5).abs() < 1e-15);
    }

    #[test]
    fn design_row_has_intercept_first() {
        let mut row = [0.0; N_COEF];
        fill_design_row(-0.25, &mut row);
        assert_eq!(row, [1.0, -0.25]);
    }
}
