//! `glm-sim` library crate.
//!
//! The binary (`glmsim`) is a thin wrapper around this library so that:
//!
//! - core logic is testable without spawning processes
//! - synthesis, fitting and comparison are usable on their own
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod math;
pub mod models;
pub mod report;
