//! Link functions for the log and logit GLMs.
//!
//! For a link `g` we need three primitives:
//!
//! - `g(mu)`: mean scale → linear predictor scale
//! - `g⁻¹(eta)`: linear predictor → mean
//! - `dmu/deta`: derivative of the inverse link (IRLS weights, delta method)
//!
//! Numerical notes:
//! - The logistic sigmoid is evaluated in two branches so `exp` never overflows.
//! - `dmu/deta` is floored at `f64::EPSILON` so IRLS weights stay positive
//!   when `eta` is far in the tails.

use crate::domain::LinkKind;

/// Apply the link: `eta = g(mu)`.
pub fn link(kind: LinkKind, mu: f64) -> f64 {
    match kind {
        LinkKind::Log => mu.ln(),
        LinkKind::Logit => logit(mu),
    }
}

/// Apply the inverse link: `mu = g⁻¹(eta)`.
pub fn inverse_link(kind: LinkKind, eta: f64) -> f64 {
    match kind {
        LinkKind::Log => eta.exp(),
        LinkKind::Logit => inverse_logit(eta),
    }
}

/// Derivative of the inverse link, `dmu/deta`, evaluated at `eta`.
pub fn mu_eta(kind: LinkKind, eta: f64) -> f64 {
    let d = match kind {
        LinkKind::Log => eta.exp(),
        LinkKind::Logit => {
            let p = inverse_logit(eta);
            p * (1.0 - p)
        }
    };
    d.max(f64::EPSILON)
}

/// `ln(p / (1 - p))`.
pub fn logit(p: f64) -> f64 {
    (p / (1.0 - p)).ln()
}

/// Logistic sigmoid `1 / (1 + exp(-eta))`.
pub fn inverse_logit(eta: f64) -> f64 {
    if eta >= 0.0 {
        1.0 / (1.0 + (-eta).exp())
    } else {
        let e = eta.exp();
        e / (1.0 + e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn logit_round_trip() {
        for &p in &[1e-9, 0.01, 0.2, 0.5, 0.77, 0.999] {
            let back = inverse_logit(logit(p));
            assert!((back - p).abs() < 1e-12 * p.max(1.0), "p={p}, back={back}");
        }
    }

    #[test]
    fn log_round_trip() {
        for &v in &[-20.0, -1.3, 0.0, 0.5, 7.25, 40.0] {
            let back = link(LinkKind::Log, inverse_link(LinkKind::Log, v));
            assert!((back - v).abs() < 1e-12, "v={v}, back={back}");
        }
    }

    #[test]
    fn inverse_logit_is_finite_in_the_tails() {
        assert_eq!(inverse_logit(-1000.0), 0.0);
        assert_eq!(inverse_logit(1000.0), 1.0);
        assert!((inverse_logit(0.0) - 0.5).abs() < 1e-15);
    }

    #[test]
    fn mu_eta_matches_finite_difference() {
        let h = 1e-6;
        for kind in [LinkKind::Log, LinkKind::Logit] {
            for &eta in &[-2.0, -0.3, 0.0, 0.8, 2.5] {
                let fd = (inverse_link(kind, eta + h) - inverse_link(kind, eta - h)) / (2.0 * h);
                let d = mu_eta(kind, eta);
                assert!((d - fd).abs() < 1e-6, "{kind:?} eta={eta}: {d} vs {fd}");
            }
        }
    }

    #[test]
    fn logit_derivative_peaks_at_a_quarter() {
        assert!((mu_eta(LinkKind::Logit, 0.0) - 0.25).abs() < 1e-15);
        assert!(mu_eta(LinkKind::Logit, 1.0) < 0.25);
    }
}
