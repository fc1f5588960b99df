//! Reporting utilities: prediction curves, truth comparison, and the
//! divide-by-4 reading of logistic slopes.

pub mod format;

use crate::domain::{Comparison, CurvePoint, FittedModel, LinkKind, PredictionCurve, TrueParams};
use crate::error::AppError;
use crate::fit::inference::z_critical;
use crate::math::inverse_link;
use crate::models::{linear_predictor, predict};

/// `n` evenly spaced points from `x_min` to `x_max` inclusive.
pub fn linspace(x_min: f64, x_max: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![x_min],
        _ => {
            let step = (x_max - x_min) / (n - 1) as f64;
            (0..n)
                .map(|i| if i == n - 1 { x_max } else { x_min + step * i as f64 })
                .collect()
        }
    }
}

/// Ground-truth mean curve `g⁻¹(intercept + slope * x)`.
pub fn true_curve(truth: &TrueParams, link: LinkKind, xs: &[f64]) -> Vec<f64> {
    xs.iter().map(|&x| inverse_link(link, truth.eta(x))).collect()
}

/// Model-implied mean at each `x`, with a pointwise Wald band.
///
/// The band is built on the link scale, `eta ± z * se(eta)`, and mapped
/// through the inverse link. The inverse links here are increasing, so the
/// bounds bracket the mean and stay inside the mean domain.
pub fn predict_curve(model: &FittedModel, xs: &[f64], level: f64) -> Result<PredictionCurve, AppError> {
    let z = z_critical(level)?;
    let (b0, b1) = (model.intercept(), model.slope());

    let mut points = Vec::with_capacity(xs.len());
    for &x in xs {
        if !x.is_finite() {
            return Err(AppError::invalid_parameter(format!("Prediction point {x} is not finite.")));
        }
        let eta = linear_predictor(b0, b1, x);
        let se = model.eta_variance(x).max(0.0).sqrt();
        let mean = predict(model.link, b0, b1, x);
        let lower = inverse_link(model.link, eta - z * se);
        let upper = inverse_link(model.link, eta + z * se);
        if !(mean.is_finite() && lower.is_finite() && upper.is_finite()) {
            return Err(AppError::invalid_parameter(format!(
                "Non-finite prediction at x={x} (eta={eta})."
            )));
        }
        points.push(CurvePoint { x, mean, lower, upper });
    }

    Ok(PredictionCurve { level, points })
}

/// Divide-by-4 rule: the logistic curve is steepest at `p = 1/2`, where
/// `dp/dx = slope / 4`. This bounds the change in probability per unit `x`.
pub fn approximate_probability_slope(logit_slope: f64) -> f64 {
    logit_slope / 4.0
}

/// Compare a fit with the parameters that generated its data, over `xs`.
pub fn compare_to_truth(model: &FittedModel, truth: &TrueParams, xs: &[f64]) -> Result<Comparison, AppError> {
    if xs.is_empty() {
        return Err(AppError::invalid_parameter("Comparison grid is empty."));
    }
    let curve = predict_curve(model, xs, model.level)?;
    let true_means = true_curve(truth, model.link, xs);

    let mut max_abs_mean_error = 0.0_f64;
    let mut inside = 0usize;
    for (p, &mu) in curve.points.iter().zip(true_means.iter()) {
        max_abs_mean_error = max_abs_mean_error.max((p.mean - mu).abs());
        if p.lower <= mu && mu <= p.upper {
            inside += 1;
        }
    }

    Ok(Comparison {
        truth: *truth,
        intercept_error: model.intercept() - truth.intercept,
        slope_error: model.slope() - truth.slope,
        intercept_covered: model.intercept_coef().covers(truth.intercept),
        slope_covered: model.slope_coef().covers(truth.slope),
        max_abs_mean_error,
        band_coverage: inside as f64 / xs.len() as f64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Coefficient, FamilyKind, FitDiagnostics};

    fn coef(name: &str, estimate: f64, se: f64) -> Coefficient {
        crate::fit::inference::coefficient(name, estimate, se, 0.95).unwrap()
    }

    fn model(link: LinkKind, b0: f64, b1: f64) -> FittedModel {
        FittedModel {
            family: if link == LinkKind::Log { FamilyKind::Poisson } else { FamilyKind::Bernoulli },
            link,
            coefficients: vec![coef("(Intercept)", b0, 0.1), coef("x", b1, 0.2)],
            covariance: [[0.01, -0.002], [-0.002, 0.04]],
            level: 0.95,
            dispersion: None,
            diagnostics: FitDiagnostics {
                n: 200,
                df_residual: 198,
                deviance: 0.0,
                null_deviance: 0.0,
                log_likelihood: 0.0,
                aic: 0.0,
                iterations: 4,
                theta_iterations: None,
                converged: true,
            },
        }
    }

    #[test]
    fn divide_by_four_is_exact() {
        for s in [0.0, 1.3, -2.7, 1e-9, 123.456] {
            assert_eq!(approximate_probability_slope(s), s / 4.0);
        }
    }

    #[test]
    fn linspace_hits_both_ends() {
        let xs = linspace(-1.0, 1.0, 5);
        assert_eq!(xs, vec![-1.0, -0.5, 0.0, 0.5, 1.0]);
        assert_eq!(linspace(0.0, 1.0, 1), vec![0.0]);
        assert!(linspace(0.0, 1.0, 0).is_empty());
        assert_eq!(*linspace(-1.0, 1.0, 50).last().unwrap(), 1.0);
    }

    #[test]
    fn bands_bracket_the_mean() {
        let xs = linspace(-3.0, 3.0, 41);
        for m in [model(LinkKind::Log, 0.5, 1.3), model(LinkKind::Logit, 0.5, 1.3)] {
            let curve = predict_curve(&m, &xs, 0.95).unwrap();
            assert_eq!(curve.points.len(), xs.len());
            for p in &curve.points {
                assert!(p.lower <= p.mean && p.mean <= p.upper, "{p:?}");
            }
            if m.link == LinkKind::Logit {
                assert!(curve.points.iter().all(|p| p.lower >= 0.0 && p.upper <= 1.0));
            }
        }
    }

    #[test]
    fn wider_level_gives_wider_band() {
        let m = model(LinkKind::Log, 0.5, 1.3);
        let narrow = predict_curve(&m, &[0.4], 0.80).unwrap().points[0];
        let wide = predict_curve(&m, &[0.4], 0.99).unwrap().points[0];
        assert!(wide.upper - wide.lower > narrow.upper - narrow.lower);
        assert_eq!(wide.mean, narrow.mean);
    }

    #[test]
    fn comparison_against_own_parameters_is_perfect() {
        let m = model(LinkKind::Log, 0.5, 1.3);
        let cmp = compare_to_truth(&m, &TrueParams::new(0.5, 1.3), &linspace(-1.0, 1.0, 11)).unwrap();
        assert_eq!(cmp.intercept_error, 0.0);
        assert_eq!(cmp.slope_error, 0.0);
        assert!(cmp.intercept_covered && cmp.slope_covered);
        assert!(cmp.max_abs_mean_error < 1e-12);
        assert_eq!(cmp.band_coverage, 1.0);
    }

    #[test]
    fn comparison_flags_a_far_truth() {
        let m = model(LinkKind::Logit, 0.5, 1.3);
        let cmp = compare_to_truth(&m, &TrueParams::new(-2.0, 5.0), &linspace(-1.0, 1.0, 11)).unwrap();
        assert!(!cmp.intercept_covered && !cmp.slope_covered);
        assert!(cmp.band_coverage < 1.0);
        assert!(compare_to_truth(&m, &TrueParams::new(0.0, 0.0), &[]).is_err());
    }
}
