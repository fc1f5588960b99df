//! Model fitting.
//!
//! Responsibilities:
//!
//! - IRLS for a fixed family and link
//! - Negative-Binomial theta estimation by alternation
//! - Wald standard errors, intervals and p-values

pub mod fitter;
pub mod inference;
pub mod negbin;

pub use fitter::*;
pub use inference::*;
pub use negbin::*;
