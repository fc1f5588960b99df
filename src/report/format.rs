//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the math/fitting code stays clean and testable
//! - output changes are localized

use crate::domain::{
    Comparison, ConsistencySummary, EstimateSummary, FamilyKind, FittedModel, PredictionCurve, SimConfig,
};

/// Banner for one family's scenario.
pub fn format_scenario_header(family: FamilyKind, config: &SimConfig) -> String {
    let mut out = String::new();
    let link = family.default_link();
    out.push_str(&format!(
        "=== {} (link: {}) ===\n",
        family.display_name(),
        link.display_name()
    ));
    out.push_str(&format!(
        "Truth: {}(mu) = {} + {} * x\n",
        link.display_name(),
        config.truth.intercept,
        config.truth.slope
    ));
    out.push_str(&format!(
        "Sample: n={} | x ~ U[{}, {}] | seed={}",
        config.n, config.x_min, config.x_max, config.seed
    ));
    match family {
        FamilyKind::Gamma => out.push_str(&format!(" | shape={}", config.gamma_shape)),
        FamilyKind::NegativeBinomial => out.push_str(&format!(" | theta={}", config.theta)),
        FamilyKind::Poisson | FamilyKind::Bernoulli => {}
    }
    out.push('\n');
    out
}

/// Coefficient table plus fit diagnostics, laid out like a GLM summary.
pub fn format_model_summary(model: &FittedModel) -> String {
    let mut out = String::new();
    let level_pct = model.level * 100.0;

    out.push_str("Coefficients:\n");
    out.push_str(
        format!(
            "{:<12} {:>10} {:>10} {:>8} {:>10} {:>22}\n",
            "",
            "Estimate",
            "Std.Error",
            "z",
            "Pr(>|z|)",
            format!("{level_pct:.0}% CI")
        )
        .trim_end(),
    );
    out.push('\n');
    for c in &model.coefficients {
        out.push_str(
            format!(
                "{:<12} {:>10.4} {:>10.4} {:>8.2} {:>10} {:>22}\n",
                truncate(&c.name, 12),
                c.estimate,
                c.std_error,
                c.z_value,
                fmt_p(c.p_value),
                format!("[{:.4}, {:.4}]", c.lower, c.upper)
            )
            .trim_end(),
        );
        out.push('\n');
    }

    if let Some(d) = &model.dispersion {
        let se = d
            .std_error
            .map(|se| format!(" (SE {se:.4})"))
            .unwrap_or_default();
        out.push_str(&format!("Estimated {}: {:.4}{se}\n", d.dispersion.label(), d.dispersion.value()));
    }

    let diag = &model.diagnostics;
    out.push_str(&format!(
        "Deviance: {:.3} on {} df | null deviance: {:.3}\n",
        diag.deviance, diag.df_residual, diag.null_deviance
    ));
    out.push_str(&format!(
        "Log-likelihood: {:.3} | AIC: {:.3} | IRLS iterations: {}",
        diag.log_likelihood, diag.aic, diag.iterations
    ));
    if let Some(outer) = diag.theta_iterations {
        out.push_str(&format!(" | theta iterations: {outer}"));
    }
    out.push('\n');
    if !diag.converged {
        out.push_str("Note: theta did not converge (capped near the Poisson limit or stopped at a bound)\n");
    }
    out
}

/// A few rows of the fitted vs true mean curve.
pub fn format_curve_table(curve: &PredictionCurve, true_means: &[f64], max_rows: usize) -> String {
    let mut out = String::new();
    if curve.points.is_empty() || max_rows == 0 {
        return out;
    }

    out.push_str(
        format!(
            "{:>8} {:>12} {:>12} {:>12} {:>12}\n",
            "x", "true mean", "fitted", "lower", "upper"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(format!("{:-<8} {:-<12} {:-<12} {:-<12} {:-<12}\n", "", "", "", "", "").trim_end());
    out.push('\n');

    let n = curve.points.len();
    let stride = n.div_ceil(max_rows).max(1);
    let mut rows: Vec<usize> = (0..n).step_by(stride).collect();
    if rows.last() != Some(&(n - 1)) {
        rows.push(n - 1);
    }
    for i in rows {
        let p = &curve.points[i];
        let truth = true_means.get(i).copied().unwrap_or(f64::NAN);
        out.push_str(&format!(
            "{:>8.3} {:>12.4} {:>12.4} {:>12.4} {:>12.4}\n",
            p.x, truth, p.mean, p.lower, p.upper
        ));
    }
    out
}

pub fn format_comparison(cmp: &Comparison) -> String {
    let mut out = String::new();
    out.push_str("Against truth:\n");
    out.push_str(&format!(
        "- intercept error: {:+.4} (CI covers truth: {})\n",
        cmp.intercept_error,
        yes_no(cmp.intercept_covered)
    ));
    out.push_str(&format!(
        "- slope error    : {:+.4} (CI covers truth: {})\n",
        cmp.slope_error,
        yes_no(cmp.slope_covered)
    ));
    out.push_str(&format!("- max |mean error| on grid: {:.4}\n", cmp.max_abs_mean_error));
    out.push_str(&format!(
        "- grid points with truth inside band: {:.1}%\n",
        cmp.band_coverage * 100.0
    ));
    out
}

/// Divide-by-4 reading of a logistic slope.
pub fn format_probability_slope(logit_slope: f64, probability_slope: f64) -> String {
    format!(
        "Divide-by-4: slope {logit_slope:.4} on the logit scale is at most {probability_slope:.4} \
         change in probability per unit x (near p = 0.5)\n"
    )
}

pub fn format_consistency(summary: &ConsistencySummary) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "=== Consistency: {} (link: {}) ===\n",
        summary.family.display_name(),
        summary.link.display_name()
    ));
    out.push_str(&format!(
        "Trials: {} (succeeded={}, failed={}) | n={}\n",
        summary.trials, summary.succeeded, summary.failed, summary.n
    ));
    out.push_str(
        format!(
            "{:<12} {:>10} {:>10} {:>10} {:>10} {:>10}\n",
            "", "truth", "mean", "sd", "bias", "coverage"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(&fmt_estimate_row("(Intercept)", &summary.intercept));
    out.push_str(&fmt_estimate_row("x", &summary.slope));
    if let Some(d) = summary.mean_dispersion {
        let label = match summary.family {
            FamilyKind::Gamma => "shape",
            _ => "theta",
        };
        out.push_str(&format!("Mean estimated {label}: {d:.4}\n"));
    }
    out
}

fn fmt_estimate_row(name: &str, e: &EstimateSummary) -> String {
    format!(
        "{:<12} {:>10.4} {:>10.4} {:>10.4} {:>+10.4} {:>9.1}%\n",
        name,
        e.truth,
        e.mean,
        e.std_dev,
        e.bias,
        e.coverage * 100.0
    )
}

fn fmt_p(p: f64) -> String {
    if p.is_nan() {
        "NA".to_string()
    } else if p < 1e-4 {
        "<1e-4".to_string()
    } else {
        format!("{p:.4}")
    }
}

fn yes_no(b: bool) -> &'static str {
    if b { "yes" } else { "no" }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{CurvePoint, Dispersion, DispersionEstimate, FitDiagnostics, LinkKind, TrueParams};

    #[test]
    fn truncate_marks_cut_names() {
        assert_eq!(truncate("x", 12), "x");
        assert_eq!(truncate("(Intercept)", 6), "(Inte.");
    }

    #[test]
    fn p_value_formatting() {
        assert_eq!(fmt_p(f64::NAN), "NA");
        assert_eq!(fmt_p(1e-9), "<1e-4");
        assert_eq!(fmt_p(0.04321), "0.0432");
    }

    #[test]
    fn curve_table_keeps_first_and_last_rows() {
        let points: Vec<CurvePoint> = (0..10)
            .map(|i| {
                let x = i as f64;
                CurvePoint { x, mean: x, lower: x - 1.0, upper: x + 1.0 }
            })
            .collect();
        let curve = PredictionCurve { level: 0.95, points };
        let truth: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let table = format_curve_table(&curve, &truth, 4);
        let body: Vec<&str> = table.lines().skip(2).collect();
        assert!(body.first().unwrap().trim_start().starts_with("0.000"));
        assert!(body.last().unwrap().trim_start().starts_with("9.000"));
        assert!(body.len() <= 5);
    }

    #[test]
    fn consistency_report_mentions_failures() {
        let est = EstimateSummary { truth: 1.3, mean: 1.29, std_dev: 0.1, bias: -0.01, coverage: 0.95 };
        let summary = ConsistencySummary {
            family: FamilyKind::Poisson,
            link: LinkKind::Log,
            n: 200,
            trials: 20,
            succeeded: 19,
            failed: 1,
            intercept: EstimateSummary { truth: 0.5, ..est },
            slope: est,
            mean_dispersion: None,
        };
        let text = format_consistency(&summary);
        assert!(text.contains("failed=1"));
        assert!(text.contains("Poisson"));
        assert!(!text.contains("Mean estimated"));
    }

    #[test]
    fn header_shows_the_dispersion_used() {
        let config = SimConfig { truth: TrueParams::new(0.5, 1.3), ..SimConfig::default() };
        assert!(format_scenario_header(FamilyKind::Gamma, &config).contains("shape=8"));
        assert!(format_scenario_header(FamilyKind::NegativeBinomial, &config).contains("theta=2"));
        assert!(format_scenario_header(FamilyKind::Bernoulli, &config).contains("logit(mu)"));
    }

    fn negbin_model(converged: bool) -> FittedModel {
        let coef = |name: &str, est: f64| crate::fit::inference::coefficient(name, est, 0.1, 0.95).unwrap();
        FittedModel {
            family: FamilyKind::NegativeBinomial,
            link: LinkKind::Log,
            coefficients: vec![coef("(Intercept)", 0.5), coef("x", 1.3)],
            covariance: [[0.01, 0.0], [0.0, 0.01]],
            level: 0.95,
            dispersion: Some(DispersionEstimate { dispersion: Dispersion::NegativeBinomial { theta: 1e6 }, std_error: None }),
            diagnostics: FitDiagnostics {
                n: 200,
                df_residual: 198,
                deviance: 210.0,
                null_deviance: 400.0,
                log_likelihood: -350.0,
                aic: 706.0,
                iterations: 4,
                theta_iterations: Some(3),
                converged,
            },
        }
    }

    #[test]
    fn summary_notes_an_unconverged_theta() {
        let text = format_model_summary(&negbin_model(false));
        assert!(text.contains("theta iterations: 3"));
        assert!(text.contains("theta did not converge"));
        assert!(!format_model_summary(&negbin_model(true)).contains("did not converge"));
    }
}
