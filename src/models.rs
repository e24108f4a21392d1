use crate::error::InitError;
use crate::image_prep::PreparedImage;

/// Trial order of remote models, most preferred first.
pub const DEFAULT_MODELS: &[&str] = &[
    "gemini-3-flash-preview",
    "gemini-2.5-flash",
    "gemini-2.0-flash",
];

/// Ordered, non-empty list of candidate model identifiers.
///
/// There is no API to reorder or mutate the list once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelCandidates {
    models: Vec<String>,
}

impl ModelCandidates {
    pub fn new<I, S>(models: I) -> Result<Self, InitError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let models: Vec<String> = models.into_iter().map(Into::into).collect();
        if models.is_empty() {
            return Err(InitError::NoCandidates);
        }
        Ok(Self { models })
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.models.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    // Never true, the constructor rejects empty lists.
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn is_last(&self, index: usize) -> bool {
        index + 1 == self.models.len()
    }
}

impl Default for ModelCandidates {
    fn default() -> Self {
        Self {
            models: DEFAULT_MODELS.iter().map(|m| m.to_string()).collect(),
        }
    }
}

/// Everything sent to a candidate model for one analysis.
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub preamble: String,
    pub image: PreparedImage,
    pub focus: String,
}
