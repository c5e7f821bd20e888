//! Vision-Language AI Module
//!
//! Clients for the two text-generation calls in the pipeline: structured
//! scene analysis of a photo and transformation suggestion generation.

pub mod analysis;
pub mod gemini;
pub mod suggestion;

pub use analysis::{AnalysisClient, AnalysisProvider, AnalysisResult};
pub use gemini::{GeminiClient, GenerationOptions};
pub use suggestion::{SuggestionClient, SuggestionProvider, SuggestionResult};
