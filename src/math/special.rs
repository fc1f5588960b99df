//! Special functions not covered by `statrs`.

/// Below this argument we shift upward with the recurrence before using the
/// asymptotic series.
const ASYMPTOTIC_MIN: f64 = 10.0;

/// Trigamma `ψ'(x)` for `x > 0`.
///
/// Uses `ψ'(x) = ψ'(x + 1) + 1/x²` to move `x` past `ASYMPTOTIC_MIN`, then the
/// asymptotic expansion
///
/// ```text
/// ψ'(x) ≈ 1/x + 1/(2x²) + 1/(6x³) - 1/(30x⁵) + 1/(42x⁷) - 1/(30x⁹)
/// ```
///
/// Returns `NaN` for non-positive or non-finite input.
pub fn trigamma(x: f64) -> f64 {
    if !(x.is_finite() && x > 0.0) {
        return f64::NAN;
    }

    let mut x = x;
    let mut acc = 0.0;
    while x < ASYMPTOTIC_MIN {
        acc += 1.0 / (x * x);
        x += 1.0;
    }

    let inv = 1.0 / x;
    let inv2 = inv * inv;
    let series = inv
        + 0.5 * inv2
        + inv * inv2 * (1.0 / 6.0 - inv2 * (1.0 / 30.0 - inv2 * (1.0 / 42.0 - inv2 / 30.0)));
    acc + series
}
