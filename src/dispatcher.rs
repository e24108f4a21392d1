//! Fallback chain over the candidate models.
//!
//! Each candidate is tried once, in order. Quota exhaustion and missing
//! models move on to the next candidate; anything else ends the chain.

use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{ErrorClass, GenerationError};
use crate::gemini::GenerationBackend;
use crate::models::{AnalysisRequest, ModelCandidates};

pub const EXHAUSTED_MESSAGE: &str = "🛑 ALL MODELS EXHAUSTED: You've reached the daily limit. \
Please wait until midnight or switch to a paid plan.";

pub const UNAVAILABLE_MESSAGE: &str = "🛑 NO MODEL AVAILABLE: None of the configured models \
could be found. They may have been renamed or retired.";

pub const ERROR_LABEL: &str = "An error occurred: ";

/// Terminal state of one pass through the fallback chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnalysisOutcome {
    Report { model: String, text: String },
    QuotaExhausted,
    ModelsUnavailable,
    Failed { error: String },
}

impl AnalysisOutcome {
    /// The string shown to the user.
    pub fn message(&self) -> String {
        match self {
            AnalysisOutcome::Report { text, .. } => text.clone(),
            AnalysisOutcome::QuotaExhausted => EXHAUSTED_MESSAGE.to_string(),
            AnalysisOutcome::ModelsUnavailable => UNAVAILABLE_MESSAGE.to_string(),
            AnalysisOutcome::Failed { error } => format!("{}{}", ERROR_LABEL, error),
        }
    }

    pub fn model(&self) -> Option<&str> {
        match self {
            AnalysisOutcome::Report { model, .. } => Some(model),
            _ => None,
        }
    }
}

pub struct FallbackDispatcher {
    backend: Arc<dyn GenerationBackend>,
    candidates: ModelCandidates,
}

impl FallbackDispatcher {
    pub fn new(backend: Arc<dyn GenerationBackend>, candidates: ModelCandidates) -> Self {
        Self {
            backend,
            candidates,
        }
    }

    pub fn candidates(&self) -> &ModelCandidates {
        &self.candidates
    }

    pub async fn dispatch(&self, request: &AnalysisRequest) -> AnalysisOutcome {
        for (index, model) in self.candidates.iter().enumerate() {
            info!("Trying model {} ({}/{})", model, index + 1, self.candidates.len());

            let error = match self.backend.generate(model, request).await {
                Ok(text) => {
                    info!("Model {} produced a report", model);
                    return AnalysisOutcome::Report {
                        model: model.to_string(),
                        text,
                    };
                }
                Err(error) => error,
            };

            let last = self.candidates.is_last(index);
            match error.classify() {
                ErrorClass::QuotaExhausted if last => {
                    warn!("Quota exhausted on {}, no candidates left", model);
                    return AnalysisOutcome::QuotaExhausted;
                }
                ErrorClass::QuotaExhausted => {
                    warn!("Quota exhausted on {}, falling back", model);
                }
                ErrorClass::ModelUnavailable if last => {
                    warn!("Model {} unavailable, no candidates left", model);
                    return AnalysisOutcome::ModelsUnavailable;
                }
                ErrorClass::ModelUnavailable => {
                    warn!("Model {} unavailable, falling back", model);
                }
                ErrorClass::Other => return abort(model, error),
            }
        }

        // ModelCandidates is never empty, so the last iteration always returns.
        AnalysisOutcome::ModelsUnavailable
    }
}

fn abort(model: &str, error: GenerationError) -> AnalysisOutcome {
    warn!("Model {} failed: {}", model, error);
    AnalysisOutcome::Failed {
        error: error.to_string(),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Backend that replays canned results and records which models it saw.
    #[derive(Default)]
    pub struct ScriptedBackend {
        script: Mutex<VecDeque<Result<String, GenerationError>>>,
        calls: Mutex<Vec<String>>,
    }

    impl ScriptedBackend {
        pub fn new(script: Vec<Result<String, GenerationError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl GenerationBackend for ScriptedBackend {
        async fn generate(
            &self,
            model: &str,
            _request: &AnalysisRequest,
        ) -> Result<String, GenerationError> {
            self.calls.lock().unwrap().push(model.to_string());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(GenerationError::EmptyResponse))
        }
    }

    pub fn api_error(code: u16, status: Option<&str>) -> GenerationError {
        GenerationError::Api {
            code,
            message: format!("status {}", code),
            status: status.map(String::from),
        }
    }

    pub fn quota() -> GenerationError {
        api_error(429, Some("RESOURCE_EXHAUSTED"))
    }

    pub fn not_found() -> GenerationError {
        api_error(404, Some("NOT_FOUND"))
    }
}
