//! Core data structures shared across the observer, extractor and harness.
//!
//! These strongly-typed models provide a shared vocabulary for raw CDP
//! accessibility payloads, the pruned snapshot rendered for the model, and the
//! per-call extraction payloads.

pub mod a11y;
pub mod extract;

pub use a11y::{AccessibilityNode, AxNode, AxProperty, AxValue};
pub use extract::{ExtractionCall, Observation};
