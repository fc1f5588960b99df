//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during synthesis and fitting
//! - printed as JSON by the `glmsim` runner
//! - compared across repeated trials

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Noise distribution of the response given its mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FamilyKind {
    /// Mean-parameterized Gamma with a fixed shape.
    Gamma,
    Poisson,
    /// Negative-Binomial with `Var = mu + mu^2/theta`.
    #[serde(rename = "negbin")]
    #[value(name = "negbin")]
    NegativeBinomial,
    /// Single-trial Binomial.
    Bernoulli,
}

impl FamilyKind {
    /// Walkthrough order.
    pub const ALL: [FamilyKind; 4] = [
        FamilyKind::Gamma,
        FamilyKind::Poisson,
        FamilyKind::NegativeBinomial,
        FamilyKind::Bernoulli,
    ];

    /// Human-readable label for terminal output.
    pub fn display_name(self) -> &'static str {
        match self {
            FamilyKind::Gamma => "Gamma",
            FamilyKind::Poisson => "Poisson",
            FamilyKind::NegativeBinomial => "Negative-Binomial",
            FamilyKind::Bernoulli => "Bernoulli",
        }
    }

    /// Link used both to generate and to fit this family in the pipeline.
    pub fn default_link(self) -> LinkKind {
        match self {
            FamilyKind::Gamma | FamilyKind::Poisson | FamilyKind::NegativeBinomial => LinkKind::Log,
            FamilyKind::Bernoulli => LinkKind::Logit,
        }
    }

    /// Whether synthesis needs an auxiliary dispersion parameter.
    pub fn needs_dispersion(self) -> bool {
        matches!(self, FamilyKind::Gamma | FamilyKind::NegativeBinomial)
    }

    /// Whether `link` maps the real line into this family's mean domain.
    pub fn supports_link(self, link: LinkKind) -> bool {
        self.default_link() == link
    }
}

/// Link function `g` with `g(mu) = eta`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LinkKind {
    Log,
    Logit,
}

impl LinkKind {
    pub fn display_name(self) -> &'static str {
        match self {
            LinkKind::Log => "log",
            LinkKind::Logit => "logit",
        }
    }
}

/// Ground-truth linear predictor `eta = intercept + slope * x`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrueParams {
    pub intercept: f64,
    pub slope: f64,
}

impl TrueParams {
    pub fn new(intercept: f64, slope: f64) -> Self {
        Self { intercept, slope }
    }

    pub fn eta(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Estimated auxiliary parameter of a fitted family.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Dispersion {
    /// Gamma shape `a`, with `Var = mu^2 / a`.
    Gamma { shape: f64 },
    /// Negative-Binomial size `theta`.
    NegativeBinomial { theta: f64 },
}

impl Dispersion {
    /// The raw parameter value (shape or theta).
    pub fn value(&self) -> f64 {
        match *self {
            Dispersion::Gamma { shape } => shape,
            Dispersion::NegativeBinomial { theta } => theta,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Dispersion::Gamma { .. } => "shape",
            Dispersion::NegativeBinomial { .. } => "theta",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DispersionEstimate {
    pub dispersion: Dispersion,
    /// Standard error of the estimate, when the estimator provides one.
    pub std_error: Option<f64>,
}

/// One row of the coefficient table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coefficient {
    pub name: String,
    pub estimate: f64,
    pub std_error: f64,
    pub z_value: f64,
    pub p_value: f64,
    /// Wald interval at `FittedModel::level`.
    pub lower: f64,
    pub upper: f64,
}

impl Coefficient {
    pub fn covers(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }
}

/// Goodness-of-fit and iteration bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitDiagnostics {
    pub n: usize,
    pub df_residual: usize,
    pub deviance: f64,
    pub null_deviance: f64,
    pub log_likelihood: f64,
    pub aic: f64,
    /// IRLS iterations of the final (or only) inner fit.
    pub iterations: usize,
    /// Outer theta iterations (Negative-Binomial only).
    pub theta_iterations: Option<usize>,
    /// False when the Negative-Binomial theta was capped or stopped at a bound.
    pub converged: bool,
}

/// Result of maximum-likelihood fitting of `g(mu) = intercept + slope * x`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pub family: FamilyKind,
    pub link: LinkKind,
    /// `[intercept, slope]`.
    pub coefficients: Vec<Coefficient>,
    /// Covariance of `[intercept, slope]`, row-major.
    pub covariance: [[f64; 2]; 2],
    /// Confidence level used for coefficient intervals.
    pub level: f64,
    pub dispersion: Option<DispersionEstimate>,
    pub diagnostics: FitDiagnostics,
}

impl FittedModel {
    pub fn intercept(&self) -> f64 {
        self.coefficients[0].estimate
    }

    pub fn slope(&self) -> f64 {
        self.coefficients[1].estimate
    }

    pub fn intercept_coef(&self) -> &Coefficient {
        &self.coefficients[0]
    }

    pub fn slope_coef(&self) -> &Coefficient {
        &self.coefficients[1]
    }

    /// Variance of `intercept + slope * x`.
    pub fn eta_variance(&self, x: f64) -> f64 {
        let c = &self.covariance;
        c[0][0] + 2.0 * x * c[0][1] + x * x * c[1][1]
    }
}

/// A single point of a prediction curve.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub x: f64,
    pub mean: f64,
    pub lower: f64,
    pub upper: f64,
}

/// Model-implied mean curve with pointwise confidence bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionCurve {
    pub level: f64,
    pub points: Vec<CurvePoint>,
}

/// How a fit compares with the parameters that generated its data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub truth: TrueParams,
    pub intercept_error: f64,
    pub slope_error: f64,
    pub intercept_covered: bool,
    pub slope_covered: bool,
    /// Largest `|fitted mean - true mean|` over the comparison grid.
    pub max_abs_mean_error: f64,
    /// Fraction of grid points whose true mean lies inside the prediction band.
    pub band_coverage: f64,
}

/// Sample mean and standard deviation of one estimate across trials.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimateSummary {
    pub truth: f64,
    pub mean: f64,
    pub std_dev: f64,
    pub bias: f64,
    /// Fraction of trials whose interval covered the truth.
    pub coverage: f64,
}

/// Aggregate of repeated seeded simulate→fit trials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencySummary {
    pub family: FamilyKind,
    pub link: LinkKind,
    pub n: usize,
    pub trials: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub intercept: EstimateSummary,
    pub slope: EstimateSummary,
    /// Mean of the estimated dispersion parameter (Gamma / Negative-Binomial).
    pub mean_dispersion: Option<f64>,
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus defaults).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    pub n: usize,
    pub seed: u64,
    pub x_min: f64,
    pub x_max: f64,
    pub truth: TrueParams,
    /// Gamma shape used for synthesis.
    pub gamma_shape: f64,
    /// Negative-Binomial theta used for synthesis.
    pub theta: f64,
    /// Confidence level for coefficient and curve intervals.
    pub level: f64,
    /// Number of points on the comparison grid.
    pub grid_points: usize,
    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            n: 200,
            seed: 42,
            x_min: -1.0,
            x_max: 1.0,
            truth: TrueParams::new(0.5, 1.3),
            gamma_shape: 8.0,
            theta: 2.0,
            level: 0.95,
            grid_points: 50,
            max_iterations: 25,
            tolerance: 1e-8,
        }
    }
}

impl SimConfig {
    /// Reject settings that no stage of the pipeline could use.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.n == 0 {
            return Err(AppError::invalid_parameter("Sample size must be > 0."));
        }
        if !(self.x_min.is_finite() && self.x_max.is_finite() && self.x_max > self.x_min) {
            return Err(AppError::invalid_parameter(format!(
                "Invalid predictor range [{}, {}] (must be finite with max > min).",
                self.x_min, self.x_max
            )));
        }
        if !(self.truth.intercept.is_finite() && self.truth.slope.is_finite()) {
            return Err(AppError::invalid_parameter("True intercept and slope must be finite."));
        }
        if !(self.gamma_shape.is_finite() && self.gamma_shape > 0.0) {
            return Err(AppError::invalid_parameter("Gamma shape must be finite and > 0."));
        }
        if !(self.theta.is_finite() && self.theta > 0.0) {
            return Err(AppError::invalid_parameter("Negative-Binomial theta must be finite and > 0."));
        }
        if !(self.level > 0.0 && self.level < 1.0) {
            return Err(AppError::invalid_parameter("Confidence level must be in (0, 1)."));
        }
        if self.grid_points < 2 {
            return Err(AppError::invalid_parameter("Grid must have at least 2 points."));
        }
        if self.max_iterations == 0 {
            return Err(AppError::invalid_parameter("Iteration limit must be > 0."));
        }
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(AppError::invalid_parameter("Tolerance must be finite and > 0."));
        }
        Ok(())
    }

    /// Dispersion handed to the synthesizer for `family`.
    pub fn dispersion_for(&self, family: FamilyKind) -> Option<f64> {
        match family {
            FamilyKind::Gamma => Some(self.gamma_shape),
            FamilyKind::NegativeBinomial => Some(self.theta),
            FamilyKind::Poisson | FamilyKind::Bernoulli => None,
        }
    }
}
