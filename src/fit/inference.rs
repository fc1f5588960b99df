//! Wald inference for fitted coefficients.
//!
//! All intervals and tests here use the standard normal reference
//! distribution, so they are large-sample (asymptotic) results.

use statrs::distribution::{ContinuousCDF, Normal};

use crate::domain::Coefficient;
use crate::error::AppError;

fn standard_normal() -> Result<Normal, AppError> {
    Normal::new(0.0, 1.0).map_err(|e| AppError::invalid_parameter(format!("Normal distribution error: {e}")))
}

/// Two-sided p-value `P(|Z| > |z|)`. Non-finite `z` gives NaN.
pub fn pvalue_z(z: f64) -> Result<f64, AppError> {
    if !z.is_finite() {
        return Ok(f64::NAN);
    }
    Ok(2.0 * standard_normal()?.sf(z.abs()))
}

/// Critical value `z_{1 - (1 - level)/2}`.
pub fn z_critical(level: f64) -> Result<f64, AppError> {
    if !(level > 0.0 && level < 1.0) {
        return Err(AppError::invalid_parameter(format!(
            "Confidence level must be in (0, 1), got {level}."
        )));
    }
    let alpha = 1.0 - level;
    Ok(standard_normal()?.inverse_cdf(1.0 - alpha / 2.0))
}

/// Wald interval `estimate ± z * std_error`.
pub fn confidence_interval_z(estimate: f64, std_error: f64, level: f64) -> Result<(f64, f64), AppError> {
    let z = z_critical(level)?;
    if !(estimate.is_finite() && std_error.is_finite() && std_error >= 0.0) {
        return Ok((f64::NAN, f64::NAN));
    }
    let margin = z * std_error;
    Ok((estimate - margin, estimate + margin))
}

/// Build one coefficient-table row.
pub fn coefficient(name: &str, estimate: f64, std_error: f64, level: f64) -> Result<Coefficient, AppError> {
    let z_value = if std_error > 0.0 { estimate / std_error } else { f64::NAN };
    let p_value = pvalue_z(z_value)?;
    let (lower, upper) = confidence_interval_z(estimate, std_error, level)?;
    Ok(Coefficient {
        name: name.to_string(),
        estimate,
        std_error,
        z_value,
        p_value,
        lower,
        upper,
    })
}
