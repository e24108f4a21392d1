//! Error types for the inspection service.
//!
//! Startup failures are [`InitError`], upload problems are [`ImageError`] and
//! remote call failures are [`GenerationError`]. The fallback chain only needs
//! to know which [`ErrorClass`] a generation failure belongs to.

use thiserror::Error;

/// Failure to construct the remote client or its configuration.
#[derive(Error, Debug)]
pub enum InitError {
    #[error("missing API credential: {0} is not set")]
    MissingCredential(&'static str),

    #[error("invalid API base URL {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("model candidate list is empty")]
    NoCandidates,

    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("invalid image: {0}")]
    InvalidImage(#[source] image::ImageError),

    #[error("unsupported image format: {0} (expected JPEG or PNG)")]
    UnsupportedFormat(String),

    #[error("failed to encode image: {0}")]
    Encode(#[source] image::ImageError),
}

/// Failure of a single generation call against one candidate model.
#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("API error {code}: {message}")]
    Api {
        code: u16,
        message: String,
        status: Option<String>,
    },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("prompt blocked by the model: {0}")]
    Blocked(String),

    #[error("model returned no text")]
    EmptyResponse,
}

/// How the fallback chain treats a generation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    QuotaExhausted,
    ModelUnavailable,
    Other,
}

const QUOTA_MARKER: &str = "RESOURCE_EXHAUSTED";

impl GenerationError {
    pub fn classify(&self) -> ErrorClass {
        match self {
            GenerationError::Api {
                code,
                message,
                status,
            } => {
                if *code == 429
                    || status.as_deref() == Some(QUOTA_MARKER)
                    || message.contains(QUOTA_MARKER)
                {
                    ErrorClass::QuotaExhausted
                } else if *code == 404 {
                    ErrorClass::ModelUnavailable
                } else {
                    ErrorClass::Other
                }
            }
            _ => ErrorClass::Other,
        }
    }
}

#[derive(Error, Debug)]
pub enum InspectionError {
    #[error(transparent)]
    Image(#[from] ImageError),

    #[error("image preparation task failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(code: u16, message: &str, status: Option<&str>) -> GenerationError {
        GenerationError::Api {
            code,
            message: message.to_string(),
            status: status.map(String::from),
        }
    }

    #[test]
    fn test_too_many_requests_is_quota() {
        assert_eq!(api(429, "slow down", None).classify(), ErrorClass::QuotaExhausted);
    }

    #[test]
    fn test_resource_exhausted_status_is_quota() {
        let err = api(400, "quota", Some("RESOURCE_EXHAUSTED"));
        assert_eq!(err.classify(), ErrorClass::QuotaExhausted);
    }

    #[test]
    fn test_resource_exhausted_in_message_is_quota() {
        let err = api(503, "RESOURCE_EXHAUSTED: daily limit", None);
        assert_eq!(err.classify(), ErrorClass::QuotaExhausted);
    }

    #[test]
    fn test_not_found_is_model_unavailable() {
        let err = api(404, "models/gemini-1.0 is not found", Some("NOT_FOUND"));
        assert_eq!(err.classify(), ErrorClass::ModelUnavailable);
    }

    #[test]
    fn test_other_statuses_are_other() {
        assert_eq!(api(400, "bad request", Some("INVALID_ARGUMENT")).classify(), ErrorClass::Other);
        assert_eq!(api(500, "internal", None).classify(), ErrorClass::Other);
        assert_eq!(GenerationError::EmptyResponse.classify(), ErrorClass::Other);
        assert_eq!(GenerationError::Blocked("SAFETY".into()).classify(), ErrorClass::Other);
    }

    #[test]
    fn test_api_error_display() {
        let err = api(403, "API key not valid", Some("PERMISSION_DENIED"));
        assert_eq!(err.to_string(), "API error 403: API key not valid");
    }

    #[test]
    fn test_init_error_display() {
        let err = InitError::MissingCredential("GEMINI_API_KEY");
        assert_eq!(err.to_string(), "missing API credential: GEMINI_API_KEY is not set");
    }
}
