//! Generative Media Transformation
//!
//! Executes one transformation job against the generative-media API:
//! image reference preparation, submit, cancellable polling, and download,
//! with a monotone progress feed for UI consumption.

mod client;
mod progress;

pub use client::{HttpTransformClient, TransformOutput, TransformProvider, TransformRequest};
pub use progress::ProgressReporter;
