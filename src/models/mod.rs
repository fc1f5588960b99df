//! GLM model pieces.
//!
//! - `model`: design rows and mean prediction for `g(mu) = intercept + slope * x`
//! - `family`: variance functions, deviance, likelihood and support checks
//!
//! Both are small, pure functions so that fitting and reporting code can stay
//! generic over the family.

pub mod family;
pub mod model;

pub use family::*;
pub use model::*;
