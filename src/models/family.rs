//! Error families: variance functions, deviance, likelihood, support.
//!
//! `Family` is the working form of `FamilyKind` at fit time. The only family
//! with a parameter that enters IRLS is the Negative-Binomial (`theta` shapes
//! the variance function). The Gamma shape only enters the log-likelihood;
//! IRLS for Gamma is shape-free.

use statrs::function::gamma::ln_gamma;

use crate::domain::FamilyKind;
use crate::error::AppError;

/// Floor (and `1 - MU_EPS` ceiling for Bernoulli) applied to fitted means.
pub const MU_EPS: f64 = 1e-10;

/// Tolerance when checking that count responses are whole numbers.
const INTEGER_TOL: f64 = 1e-8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Family {
    Gamma { shape: f64 },
    Poisson,
    NegativeBinomial { theta: f64 },
    Bernoulli,
}

impl Family {
    pub fn kind(&self) -> FamilyKind {
        match self {
            Family::Gamma { .. } => FamilyKind::Gamma,
            Family::Poisson => FamilyKind::Poisson,
            Family::NegativeBinomial { .. } => FamilyKind::NegativeBinomial,
            Family::Bernoulli => FamilyKind::Bernoulli,
        }
    }

    /// Variance function `V(mu)` (variance up to the dispersion factor).
    pub fn variance(&self, mu: f64) -> f64 {
        match *self {
            Family::Gamma { .. } => mu * mu,
            Family::Poisson => mu,
            Family::NegativeBinomial { theta } => mu + mu * mu / theta,
            Family::Bernoulli => mu * (1.0 - mu),
        }
    }

    /// Keep a mean strictly inside the family's mean domain.
    pub fn clamp_mean(&self, mu: f64) -> f64 {
        match self {
            Family::Bernoulli => mu.clamp(MU_EPS, 1.0 - MU_EPS),
            _ => mu.max(MU_EPS),
        }
    }

    /// Starting mean for IRLS.
    pub fn initial_mean(&self, y: f64) -> f64 {
        match self {
            Family::Gamma { .. } => y,
            Family::Poisson | Family::NegativeBinomial { .. } => y + 0.1,
            Family::Bernoulli => (y + 0.5) / 2.0,
        }
    }

    /// Unit deviance `d(y, mu)`; the deviance is its sum.
    pub fn unit_deviance(&self, y: f64, mu: f64) -> f64 {
        match *self {
            Family::Gamma { .. } => 2.0 * (-(y / mu).ln() + (y - mu) / mu),
            Family::Poisson => 2.0 * (y_log_ratio(y, mu) - (y - mu)),
            Family::NegativeBinomial { theta } => {
                2.0 * (y_log_ratio(y, mu) - (y + theta) * ((y + theta) / (mu + theta)).ln())
            }
            Family::Bernoulli => {
                if y > 0.5 {
                    -2.0 * mu.ln()
                } else {
                    -2.0 * (1.0 - mu).ln()
                }
            }
        }
    }

    pub fn deviance(&self, y: &[f64], mu: &[f64]) -> f64 {
        y.iter()
            .zip(mu.iter())
            .map(|(&yi, &mi)| self.unit_deviance(yi, mi))
            .sum()
    }

    /// Log-density of one observation.
    pub fn log_density(&self, y: f64, mu: f64) -> f64 {
        match *self {
            Family::Gamma { shape } => {
                let a = shape;
                a * (a / mu).ln() + (a - 1.0) * y.ln() - a * y / mu - ln_gamma(a)
            }
            Family::Poisson => {
                let term = if y > 0.0 { y * mu.ln() } else { 0.0 };
                term - mu - ln_gamma(y + 1.0)
            }
            Family::NegativeBinomial { theta } => {
                let term = if y > 0.0 { y * (mu / (theta + mu)).ln() } else { 0.0 };
                ln_gamma(y + theta) - ln_gamma(theta) - ln_gamma(y + 1.0)
                    + theta * (theta / (theta + mu)).ln()
                    + term
            }
            Family::Bernoulli => {
                if y > 0.5 {
                    mu.ln()
                } else {
                    (1.0 - mu).ln()
                }
            }
        }
    }

    pub fn log_likelihood(&self, y: &[f64], mu: &[f64]) -> f64 {
        y.iter()
            .zip(mu.iter())
            .map(|(&yi, &mi)| self.log_density(yi, mi))
            .sum()
    }

    /// Parameters counted by AIC: two coefficients plus any dispersion.
    pub fn param_count(&self) -> usize {
        match self {
            Family::Gamma { .. } | Family::NegativeBinomial { .. } => 3,
            Family::Poisson | Family::Bernoulli => 2,
        }
    }
}

/// `y * ln(y / mu)` with the `0 * ln(0) = 0` convention.
fn y_log_ratio(y: f64, mu: f64) -> f64 {
    if y > 0.0 { y * (y / mu).ln() } else { 0.0 }
}

/// Check that every response lies in the support of `kind`.
pub fn validate_support(kind: FamilyKind, y: &[f64]) -> Result<(), AppError> {
    for (i, &v) in y.iter().enumerate() {
        if !v.is_finite() {
            return Err(AppError::degenerate_input(format!(
                "Response {i} is not finite ({v})."
            )));
        }
        let ok = match kind {
            FamilyKind::Gamma => v > 0.0,
            FamilyKind::Poisson | FamilyKind::NegativeBinomial => {
                v >= 0.0 && (v - v.round()).abs() <= INTEGER_TOL
            }
            FamilyKind::Bernoulli => v == 0.0 || v == 1.0,
        };
        if !ok {
            let support = match kind {
                FamilyKind::Gamma => "strictly positive values",
                FamilyKind::Poisson | FamilyKind::NegativeBinomial => "non-negative integers",
                FamilyKind::Bernoulli => "0 or 1",
            };
            return Err(AppError::degenerate_input(format!(
                "Response {i} = {v} is outside the {} support ({support}).",
                kind.display_name()
            )));
        }
    }
    Ok(())
}
