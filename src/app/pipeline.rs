//! Shared "simulate → fit → compare" logic used by every subcommand.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! predictor draw -> response synthesis -> fit -> prediction curve -> comparison
//!
//! The CLI can then focus on presentation (text vs JSON).

use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::data::Simulator;
use crate::domain::{
    Comparison, ConsistencySummary, EstimateSummary, FamilyKind, FittedModel, LinkKind, PredictionCurve,
    SimConfig, TrueParams,
};
use crate::error::AppError;
use crate::fit::{FitOptions, fit_glm};
use crate::report::{approximate_probability_slope, compare_to_truth, linspace, predict_curve, true_curve};

/// All computed outputs of one family's scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioOutput {
    pub family: FamilyKind,
    pub link: LinkKind,
    pub truth: TrueParams,
    pub predictor: Vec<f64>,
    pub response: Vec<f64>,
    pub model: FittedModel,
    /// Fitted mean and band on the comparison grid.
    pub curve: PredictionCurve,
    /// True mean on the same grid.
    pub true_curve: Vec<f64>,
    pub comparison: Comparison,
    /// Divide-by-4 reading of the fitted slope (Bernoulli only).
    pub probability_slope: Option<f64>,
}

/// Run one scenario on an existing stream and predictor.
///
/// The response draw consumes `sim`, so the order of calls on one simulator
/// fixes the data each scenario sees.
pub fn run_scenario_with(
    sim: &mut Simulator,
    predictor: &[f64],
    config: &SimConfig,
    family: FamilyKind,
) -> Result<ScenarioOutput, AppError> {
    let link = family.default_link();
    let response = sim.synthesize(predictor, &config.truth, family, config.dispersion_for(family))?;

    let model = fit_glm(predictor, &response, family, link, &FitOptions::from_config(config))?;

    let grid = linspace(config.x_min, config.x_max, config.grid_points);
    let curve = predict_curve(&model, &grid, config.level)?;
    let truth_curve = true_curve(&config.truth, link, &grid);
    let comparison = compare_to_truth(&model, &config.truth, &grid)?;
    let probability_slope = match family {
        FamilyKind::Bernoulli => Some(approximate_probability_slope(model.slope())),
        _ => None,
    };

    info!(
        "{} scenario: intercept error {:+.4}, slope error {:+.4}",
        family.display_name(),
        comparison.intercept_error,
        comparison.slope_error
    );

    Ok(ScenarioOutput {
        family,
        link,
        truth: config.truth,
        predictor: predictor.to_vec(),
        response,
        model,
        curve,
        true_curve: truth_curve,
        comparison,
        probability_slope,
    })
}

/// Run one family from a fresh stream seeded with `config.seed`.
pub fn run_scenario(config: &SimConfig, family: FamilyKind) -> Result<ScenarioOutput, AppError> {
    config.validate()?;
    let mut sim = Simulator::new(config.seed);
    let predictor = sim.uniform_predictor(config.n, config.x_min, config.x_max)?;
    run_scenario_with(&mut sim, &predictor, config, family)
}

/// Run every family in walkthrough order.
///
/// The predictor is drawn once and shared; each family's responses come from
/// the same stream in turn, so one seed reproduces the whole walkthrough.
pub fn run_walkthrough(config: &SimConfig) -> Result<Vec<ScenarioOutput>, AppError> {
    config.validate()?;
    let mut sim = Simulator::new(config.seed);
    let predictor = sim.uniform_predictor(config.n, config.x_min, config.x_max)?;

    FamilyKind::ALL
        .iter()
        .map(|&family| run_scenario_with(&mut sim, &predictor, config, family))
        .collect()
}

/// Repeat simulate→fit `trials` times and summarize the estimates.
///
/// Trial `k` uses seed `config.seed + k`. Trials run in parallel; results are
/// collected in trial order, so the summary does not depend on scheduling.
pub fn run_consistency(config: &SimConfig, family: FamilyKind, trials: usize) -> Result<ConsistencySummary, AppError> {
    config.validate()?;
    if trials == 0 {
        return Err(AppError::invalid_parameter("Number of trials must be > 0."));
    }
    let link = family.default_link();
    let opts = FitOptions::from_config(config);

    let results: Vec<Result<FittedModel, AppError>> = (0..trials)
        .into_par_iter()
        .map(|k| {
            let mut sim = Simulator::new(config.seed.wrapping_add(k as u64));
            let x = sim.uniform_predictor(config.n, config.x_min, config.x_max)?;
            let y = sim.synthesize(&x, &config.truth, family, config.dispersion_for(family))?;
            fit_glm(&x, &y, family, link, &opts)
        })
        .collect();

    let mut fits = Vec::with_capacity(trials);
    let mut first_error = None;
    for (k, result) in results.into_iter().enumerate() {
        match result {
            Ok(model) => fits.push(model),
            Err(err) => {
                warn!("consistency trial {k} (seed {}) failed: {err}", config.seed.wrapping_add(k as u64));
                first_error.get_or_insert(err);
            }
        }
    }

    if fits.is_empty() {
        let err = first_error.unwrap_or_else(|| AppError::non_convergence("No trial produced a fit."));
        return Err(AppError::new(
            err.kind(),
            format!("All {trials} consistency trials failed; first error: {}", err.message()),
        ));
    }

    let intercept = summarize(
        config.truth.intercept,
        fits.iter().map(|m| (m.intercept(), m.intercept_coef().covers(config.truth.intercept))),
    );
    let slope = summarize(
        config.truth.slope,
        fits.iter().map(|m| (m.slope(), m.slope_coef().covers(config.truth.slope))),
    );
    let dispersions: Vec<f64> = fits
        .iter()
        .filter_map(|m| m.dispersion.map(|d| d.dispersion.value()))
        .collect();
    let mean_dispersion = if dispersions.is_empty() {
        None
    } else {
        Some(dispersions.iter().sum::<f64>() / dispersions.len() as f64)
    };

    Ok(ConsistencySummary {
        family,
        link,
        n: config.n,
        trials,
        succeeded: fits.len(),
        failed: trials - fits.len(),
        intercept,
        slope,
        mean_dispersion,
    })
}

fn summarize(truth: f64, draws: impl Iterator<Item = (f64, bool)>) -> EstimateSummary {
    let (values, covered): (Vec<f64>, Vec<bool>) = draws.unzip();
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let std_dev = if values.len() > 1 {
        (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)).sqrt()
    } else {
        0.0
    };
    EstimateSummary {
        truth,
        mean,
        std_dev,
        bias: mean - truth,
        coverage: covered.iter().filter(|&&c| c).count() as f64 / n,
    }
}
