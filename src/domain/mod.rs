//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - family / link enums (`FamilyKind`, `LinkKind`) and true parameters (`TrueParams`)
//! - fit outputs (`FittedModel`, `Coefficient`, `FitDiagnostics`, ...)
//! - comparison outputs (`PredictionCurve`, `Comparison`, `ConsistencySummary`)
//! - the run configuration (`SimConfig`)

pub mod types;

pub use types::*;
