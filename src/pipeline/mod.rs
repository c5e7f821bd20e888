//! Transformation Pipeline
//!
//! The orchestration layer: an explicit, observable state machine per unit
//! of work, a deterministic fallback pipeline for masked client failures,
//! and the orchestrator wiring the store and the three clients together.

pub mod mock;
mod orchestrator;
mod state;

pub use orchestrator::{Orchestrator, PhotoFlow, TransformHandle};
pub use state::{PipelineEvent, PipelinePhase, PipelineSnapshot, PipelineState};
