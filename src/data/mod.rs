//! Synthetic data: seeded predictor draws and family-specific response synthesis.

pub mod sample;

pub use sample::*;
