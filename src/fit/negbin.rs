//! Negative-Binomial fitting with an estimated `theta`.
//!
//! The coefficients and `theta` are estimated by alternation:
//!
//! 1. fit a Poisson GLM to get starting means
//! 2. solve the profile score equation for `theta` at the current means
//!    (Newton–Raphson, digamma score, trigamma information)
//! 3. refit the GLM by IRLS at that `theta`, warm-started from the previous
//!    linear predictor
//! 4. repeat 2–3 until neither the log-likelihood nor `theta` moves
//!
//! The theta solve follows the likelihood towards the Poisson limit when the
//! data show little overdispersion: `theta` is capped at `THETA_MAX`, and a
//! solve that reaches the cap or its iteration bound returns its last iterate
//! with `converged = false` instead of failing. The same holds for the outer
//! alternation. Only a failing IRLS step is an error.

use log::{debug, warn};
use statrs::function::gamma::digamma;

use crate::domain::LinkKind;
use crate::error::AppError;
use crate::fit::fitter::{FitOptions, IrlsFit, irls};
use crate::math::trigamma;
use crate::models::Family;

/// Range the moment estimate of `theta` is clamped to before Newton starts.
const THETA_START_MIN: f64 = 1e-3;
/// Largest `theta` reported; beyond it the model is Poisson for all purposes.
pub const THETA_MAX: f64 = 1e6;

/// Fitted Negative-Binomial model.
#[derive(Debug, Clone)]
pub struct NegBinFit {
    pub irls: IrlsFit,
    pub theta: f64,
    /// `1 / sqrt(information)` at the estimate; NaN when the information is not positive.
    pub theta_se: f64,
    pub outer_iterations: usize,
    /// False when theta was capped or a bound was hit.
    pub converged: bool,
}

/// Maximum-likelihood `theta` at fixed means.
#[derive(Debug, Clone, Copy)]
pub struct ThetaEstimate {
    pub theta: f64,
    pub std_error: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// Fit coefficients and `theta` jointly by alternation.
pub fn fit_negbin(
    predictor: &[f64],
    response: &[f64],
    link_kind: LinkKind,
    opts: &FitOptions,
) -> Result<NegBinFit, AppError> {
    let outer_tol = opts.tolerance.sqrt();
    let theta_tol = opts.tolerance.powf(0.25);

    let mut fit = irls(predictor, response, Family::Poisson, link_kind, opts, None)?;
    let mut est = theta_ml(response, &fit.mu, opts.max_theta_iterations, theta_tol);
    let mut ll = Family::NegativeBinomial { theta: est.theta }.log_likelihood(response, &fit.mu);

    for outer in 1..=opts.max_theta_iterations {
        let family = Family::NegativeBinomial { theta: est.theta };
        fit = irls(predictor, response, family, link_kind, opts, Some(&fit.eta))?;

        let prev_theta = est.theta;
        let prev_ll = ll;
        est = theta_ml(response, &fit.mu, opts.max_theta_iterations, theta_tol);
        ll = Family::NegativeBinomial { theta: est.theta }.log_likelihood(response, &fit.mu);

        let delta = (prev_ll - ll).abs() / (ll.abs() + 0.1) + (prev_theta - est.theta).abs() / est.theta;
        debug!(
            "negbin outer={outer} theta={:.6} loglik={ll:.6} delta={delta:.3e}",
            est.theta
        );
        if delta < outer_tol {
            // Refit once more so the coefficients match the final theta exactly.
            let family = Family::NegativeBinomial { theta: est.theta };
            fit = irls(predictor, response, family, link_kind, opts, Some(&fit.eta))?;
            return Ok(NegBinFit {
                irls: fit,
                theta: est.theta,
                theta_se: est.std_error,
                outer_iterations: outer,
                converged: est.converged,
            });
        }
    }

    warn!(
        "Negative-Binomial alternation limit ({}) reached; keeping theta={:.4}",
        opts.max_theta_iterations, est.theta
    );
    let family = Family::NegativeBinomial { theta: est.theta };
    fit = irls(predictor, response, family, link_kind, opts, Some(&fit.eta))?;
    Ok(NegBinFit {
        irls: fit,
        theta: est.theta,
        theta_se: est.std_error,
        outer_iterations: opts.max_theta_iterations,
        converged: false,
    })
}

/// Newton–Raphson solve of the profile score for `theta` at fixed means.
///
/// A step that overshoots below zero is reflected. The iterate never exceeds
/// `THETA_MAX`; if the score still points upward there, the capped value is
/// returned unconverged.
pub fn theta_ml(y: &[f64], mu: &[f64], limit: usize, tol: f64) -> ThetaEstimate {
    let n = y.len() as f64;
    let moment: f64 = y
        .iter()
        .zip(mu.iter())
        .map(|(&yi, &mi)| (yi / mi - 1.0).powi(2))
        .sum();
    let mut theta = (n / moment).clamp(THETA_START_MIN, THETA_MAX);
    if !theta.is_finite() {
        theta = THETA_MAX;
    }

    for iter in 1..=limit {
        theta = theta.abs();
        let del = theta_score(y, mu, theta) / theta_information(y, mu, theta);
        if !del.is_finite() {
            warn!("theta solve hit a non-finite Newton step at theta={theta:.4}");
            return estimate(y, mu, theta.max(THETA_START_MIN), iter, false);
        }
        theta += del;
        if theta >= THETA_MAX {
            theta = THETA_MAX;
            if theta_score(y, mu, theta) > 0.0 {
                warn!("theta estimate capped at {THETA_MAX:e}; data look Poisson");
                return estimate(y, mu, theta, iter, false);
            }
        }
        if del.abs() <= tol {
            return estimate(y, mu, theta.abs(), iter, true);
        }
    }

    warn!("theta solve stopped after {limit} iterations (theta={theta:.4})");
    estimate(y, mu, theta.abs(), limit, false)
}

fn estimate(y: &[f64], mu: &[f64], theta: f64, iterations: usize, converged: bool) -> ThetaEstimate {
    let info = theta_information(y, mu, theta);
    let std_error = if info > 0.0 { 1.0 / info.sqrt() } else { f64::NAN };
    ThetaEstimate {
        theta,
        std_error,
        iterations,
        converged,
    }
}

/// `d loglik / d theta`.
fn theta_score(y: &[f64], mu: &[f64], theta: f64) -> f64 {
    y.iter()
        .zip(mu.iter())
        .map(|(&yi, &mi)| {
            digamma(theta + yi) - digamma(theta) + theta.ln() + 1.0
                - (theta + mi).ln()
                - (yi + theta) / (mi + theta)
        })
        .sum()
}

/// `-d² loglik / d theta²`.
fn theta_information(y: &[f64], mu: &[f64], theta: f64) -> f64 {
    y.iter()
        .zip(mu.iter())
        .map(|(&yi, &mi)| {
            -trigamma(theta + yi) + trigamma(theta) - 1.0 / theta + 2.0 / (mi + theta)
                - (yi + theta) / (mi + theta).powi(2)
        })
        .sum()
}
