//! Mathematical utilities: link functions, weighted least squares, special functions.

pub mod link;
pub mod ols;
pub mod special;

pub use link::*;
pub use ols::*;
pub use special::*;
