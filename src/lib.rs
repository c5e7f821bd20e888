//! Photomorph Core Engine
//!
//! Transformation orchestration core for an AI photo app: analyze a photo
//! with a vision-language model, generate a bounded batch of transformation
//! suggestions, execute one as an asynchronous generative-media job, and
//! persist the derived artifacts with correct lifecycle and relationships.

pub mod ai;
pub mod config;
pub mod imaging;
pub mod logging;
pub mod pipeline;
pub mod store;
pub mod transform;

// Re-export common types
mod types;
pub use types::*;

mod error;
pub use error::*;
