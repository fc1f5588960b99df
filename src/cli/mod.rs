//! Command-line parsing for the GLM simulate/fit/compare runner.
//!
//! The goal of this module is to keep **argument parsing** and **command dispatch**
//! separate from the modeling/math code.

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::domain::FamilyKind;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "glmsim",
    version,
    about = "Simulate data from known GLMs, fit them back, and compare with the truth"
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug). `RUST_LOG` takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run Gamma, Poisson, Negative-Binomial and Bernoulli in order on one shared predictor.
    Walkthrough(CommonArgs),
    /// Run a single family.
    Scenario(ScenarioArgs),
    /// Repeat simulate→fit with seeds `seed, seed+1, ...` and summarize the estimates.
    Consistency(ConsistencyArgs),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Options shared by every subcommand.
#[derive(Debug, Args, Clone)]
pub struct CommonArgs {
    /// Sample size.
    #[arg(short = 'n', long = "sample-size", default_value_t = 200)]
    pub n: usize,

    /// Seed for the sampling stream.
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Lower end of the uniform predictor range.
    #[arg(long, default_value_t = -1.0, allow_hyphen_values = true)]
    pub x_min: f64,

    /// Upper end of the uniform predictor range.
    #[arg(long, default_value_t = 1.0, allow_hyphen_values = true)]
    pub x_max: f64,

    /// True intercept on the link scale.
    #[arg(long, default_value_t = 0.5, allow_hyphen_values = true)]
    pub intercept: f64,

    /// True slope on the link scale.
    #[arg(long, default_value_t = 1.3, allow_hyphen_values = true)]
    pub slope: f64,

    /// Gamma shape used for synthesis (default 8).
    #[arg(long)]
    pub gamma_shape: Option<f64>,

    /// Negative-Binomial theta used for synthesis (default 2).
    #[arg(long)]
    pub theta: Option<f64>,

    /// Confidence level for intervals and bands.
    #[arg(long, default_value_t = 0.95)]
    pub level: f64,

    /// Points on the comparison grid.
    #[arg(long = "grid", default_value_t = 50)]
    pub grid_points: usize,

    /// IRLS iteration bound.
    #[arg(long, default_value_t = 25)]
    pub max_iterations: usize,

    /// Relative deviance change that counts as converged.
    #[arg(long, default_value_t = 1e-8)]
    pub tolerance: f64,

    /// Output format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
}

#[derive(Debug, Args, Clone)]
pub struct ScenarioArgs {
    /// Family to simulate and fit.
    #[arg(long, value_enum)]
    pub family: FamilyKind,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Args, Clone)]
pub struct ConsistencyArgs {
    /// Family to simulate and fit.
    #[arg(long, value_enum)]
    pub family: FamilyKind,

    /// Number of independent trials.
    #[arg(long, default_value_t = 100)]
    pub trials: usize,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_scenario_flags() {
        let cli = Cli::try_parse_from([
            "glmsim", "scenario", "--family", "negbin", "-n", "500", "--slope", "-0.7", "--theta", "3",
        ])
        .unwrap();
        let Command::Scenario(args) = cli.command else {
            panic!("expected scenario");
        };
        assert_eq!(args.family, FamilyKind::NegativeBinomial);
        assert_eq!(args.common.n, 500);
        assert_eq!(args.common.slope, -0.7);
        assert_eq!(args.common.theta, Some(3.0));
        assert_eq!(args.common.format, OutputFormat::Text);
    }

    #[test]
    fn verbosity_counts() {
        let cli = Cli::try_parse_from(["glmsim", "-vv", "walkthrough", "--format", "json"]).unwrap();
        assert_eq!(cli.verbose, 2);
        let Command::Walkthrough(args) = cli.command else {
            panic!("expected walkthrough");
        };
        assert_eq!(args.format, OutputFormat::Json);
    }

    #[test]
    fn unknown_family_is_rejected() {
        assert!(Cli::try_parse_from(["glmsim", "scenario", "--family", "tweedie"]).is_err());
    }
}
