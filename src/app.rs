//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - sets up logging
//! - runs the requested simulate → fit → compare workflow
//! - prints text reports or JSON

use clap::Parser;
use log::debug;
use serde::Serialize;

use crate::cli::{Cli, Command, CommonArgs, ConsistencyArgs, OutputFormat, ScenarioArgs};
use crate::domain::{FamilyKind, SimConfig, TrueParams};
use crate::error::AppError;
use crate::report::format;

pub mod pipeline;

use pipeline::ScenarioOutput;

/// Rows of the fitted-vs-true curve shown per scenario in text mode.
const CURVE_ROWS: usize = 11;

/// Entry point for the `glmsim` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Walkthrough(args) => handle_walkthrough(&args),
        Command::Scenario(args) => handle_scenario(&args),
        Command::Consistency(args) => handle_consistency(&args),
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    // A logger may already be installed when `run` is driven from tests.
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default)).try_init();
}

fn handle_walkthrough(args: &CommonArgs) -> Result<(), AppError> {
    let config = sim_config_from_args(args)?;
    let outputs = pipeline::run_walkthrough(&config)?;
    match args.format {
        OutputFormat::Json => print_json(&outputs),
        OutputFormat::Text => {
            for out in &outputs {
                println!("{}", format_scenario(out, &config));
            }
            Ok(())
        }
    }
}

fn handle_scenario(args: &ScenarioArgs) -> Result<(), AppError> {
    check_dispersion_flags(&args.common, args.family)?;
    let config = sim_config_from_args(&args.common)?;
    let out = pipeline::run_scenario(&config, args.family)?;
    match args.common.format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Text => {
            println!("{}", format_scenario(&out, &config));
            Ok(())
        }
    }
}

fn handle_consistency(args: &ConsistencyArgs) -> Result<(), AppError> {
    check_dispersion_flags(&args.common, args.family)?;
    let config = sim_config_from_args(&args.common)?;
    let summary = pipeline::run_consistency(&config, args.family, args.trials)?;
    match args.common.format {
        OutputFormat::Json => print_json(&summary),
        OutputFormat::Text => {
            println!("{}", format::format_consistency(&summary));
            Ok(())
        }
    }
}

/// Build and validate the run configuration from CLI flags.
pub fn sim_config_from_args(args: &CommonArgs) -> Result<SimConfig, AppError> {
    let defaults = SimConfig::default();
    let config = SimConfig {
        n: args.n,
        seed: args.seed,
        x_min: args.x_min,
        x_max: args.x_max,
        truth: TrueParams::new(args.intercept, args.slope),
        gamma_shape: args.gamma_shape.unwrap_or(defaults.gamma_shape),
        theta: args.theta.unwrap_or(defaults.theta),
        level: args.level,
        grid_points: args.grid_points,
        max_iterations: args.max_iterations,
        tolerance: args.tolerance,
    };
    config.validate()?;
    debug!("run config: {config:?}");
    Ok(config)
}

/// A dispersion flag for a family that has no such parameter is a usage error.
fn check_dispersion_flags(args: &CommonArgs, family: FamilyKind) -> Result<(), AppError> {
    if args.gamma_shape.is_some() && family != FamilyKind::Gamma {
        return Err(AppError::usage(format!(
            "--gamma-shape only applies to the Gamma family, not {}.",
            family.display_name()
        )));
    }
    if args.theta.is_some() && family != FamilyKind::NegativeBinomial {
        return Err(AppError::usage(format!(
            "--theta only applies to the Negative-Binomial family, not {}.",
            family.display_name()
        )));
    }
    Ok(())
}

fn format_scenario(out: &ScenarioOutput, config: &SimConfig) -> String {
    let mut s = format::format_scenario_header(out.family, config);
    s.push('\n');
    s.push_str(&format::format_model_summary(&out.model));
    s.push('\n');
    s.push_str(&format::format_curve_table(&out.curve, &out.true_curve, CURVE_ROWS));
    s.push('\n');
    s.push_str(&format::format_comparison(&out.comparison));
    if let Some(p) = out.probability_slope {
        s.push_str(&format::format_probability_slope(out.model.slope(), p));
    }
    s
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| AppError::invalid_parameter(format!("Could not serialize report to JSON: {e}")))?;
    println!("{text}");
    Ok(())
}
