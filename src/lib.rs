pub mod cache;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod gemini;
pub mod image_prep;
pub mod inspection;
pub mod models;
pub mod web;

pub use config::Config;
pub use dispatcher::{AnalysisOutcome, FallbackDispatcher};
pub use error::{ErrorClass, GenerationError, ImageError, InitError, InspectionError};
pub use gemini::{GeminiClient, GeminiConfig, GenerationBackend};
pub use inspection::{InspectionReport, InspectionService};
pub use models::ModelCandidates;
