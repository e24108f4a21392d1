//! The request component: memoization, image preparation and the fallback
//! chain behind one call.

use tracing::{debug, info};

use crate::cache::{ReportCache, RequestKey};
use crate::dispatcher::{AnalysisOutcome, FallbackDispatcher};
use crate::error::InspectionError;
use crate::image_prep::prepare_image;
use crate::models::{AnalysisRequest, ModelCandidates};

pub const INSPECTION_PREAMBLE: &str = "
You are a senior Civil Engineer. Analyze the provided image with high precision:
1. **Structural Classification**: Identify the specific category of structure.
2. **Material Health**: List materials and note any visible signs of wear, stress, or corrosion.
3. **Engineering Logic**: Describe the load-bearing mechanism visible.
4. **Safety Observations**: Highlight any immediate engineering concerns or defects.
Provide this as a professional site inspection report.
";

pub const REPORT_FILE_NAME: &str = "site_inspection.txt";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectionReport {
    /// Report text, or the user-facing status message when no model answered.
    pub text: String,
    pub model: Option<String>,
    pub cached: bool,
}

impl InspectionReport {
    fn from_outcome(outcome: &AnalysisOutcome, cached: bool) -> Self {
        Self {
            text: outcome.message(),
            model: outcome.model().map(String::from),
            cached,
        }
    }
}

pub struct InspectionService {
    dispatcher: FallbackDispatcher,
    cache: ReportCache,
    preamble: String,
}

impl InspectionService {
    pub fn new(dispatcher: FallbackDispatcher, cache: ReportCache) -> Self {
        Self {
            dispatcher,
            cache,
            preamble: INSPECTION_PREAMBLE.to_string(),
        }
    }

    pub fn candidates(&self) -> &ModelCandidates {
        self.dispatcher.candidates()
    }

    pub fn cache(&self) -> &ReportCache {
        &self.cache
    }

    pub async fn analyze(
        &self,
        focus: &str,
        image: &[u8],
    ) -> Result<InspectionReport, InspectionError> {
        let key = RequestKey::new(focus, image, &self.preamble);
        if let Some(outcome) = self.cache.get(&key) {
            info!("Serving cached report {}", key.as_str());
            return Ok(InspectionReport::from_outcome(&outcome, true));
        }
        debug!("No cached report for {}", key.as_str());

        // Decode and resample off the async workers.
        let upload = image.to_vec();
        let prepared = tokio::task::spawn_blocking(move || prepare_image(&upload)).await??;
        let request = AnalysisRequest {
            preamble: self.preamble.clone(),
            image: prepared,
            focus: focus.to_string(),
        };

        let outcome = self.dispatcher.dispatch(&request).await;
        let report = InspectionReport::from_outcome(&outcome, false);
        self.cache.insert(key, outcome);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatcher::testing::{quota, ScriptedBackend};
    use crate::dispatcher::{EXHAUSTED_MESSAGE, ERROR_LABEL};
    use crate::error::{GenerationError, ImageError};
    use crate::image_prep::sample_png;
    use std::num::NonZeroUsize;
    use std::sync::Arc;

    fn service(backend: Arc<ScriptedBackend>) -> InspectionService {
        let candidates = ModelCandidates::new(["m1", "m2"]).unwrap();
        InspectionService::new(
            FallbackDispatcher::new(backend, candidates),
            ReportCache::new(NonZeroUsize::new(8).unwrap()),
        )
    }

    #[tokio::test]
    async fn test_report_returned() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok("No visible cracks detected.".into())]));
        let report = service(backend.clone())
            .analyze("Check for cracks", &sample_png(1024, 1024))
            .await
            .unwrap();

        assert_eq!(report.text, "No visible cracks detected.");
        assert_eq!(report.model.as_deref(), Some("m1"));
        assert!(!report.cached);
    }

    #[tokio::test]
    async fn test_identical_request_is_memoized() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok("first".into()), Ok("second".into())]));
        let service = service(backend.clone());
        let image = sample_png(64, 64);

        let first = service.analyze("Check for cracks", &image).await.unwrap();
        let second = service.analyze("Check for cracks", &image).await.unwrap();

        assert_eq!(first.text, second.text);
        assert!(second.cached);
        assert_eq!(backend.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_different_focus_is_not_memoized() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok("first".into()), Ok("second".into())]));
        let service = service(backend.clone());
        let image = sample_png(64, 64);

        service.analyze("Check for cracks", &image).await.unwrap();
        let other = service.analyze("Check for corrosion", &image).await.unwrap();

        assert_eq!(other.text, "second");
        assert_eq!(backend.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_exhaustion_is_memoized() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Err(quota()),
            Err(quota()),
            Ok("never requested".into()),
        ]));
        let service = service(backend.clone());
        let image = sample_png(32, 32);

        let first = service.analyze("Check for cracks", &image).await.unwrap();
        assert_eq!(first.text, EXHAUSTED_MESSAGE);
        assert!(first.model.is_none());

        let second = service.analyze("Check for cracks", &image).await.unwrap();
        assert_eq!(second.text, EXHAUSTED_MESSAGE);
        assert!(second.cached);
        assert_eq!(backend.calls(), vec!["m1", "m2"]);
    }

    #[tokio::test]
    async fn test_other_error_is_memoized() {
        let backend = Arc::new(ScriptedBackend::new(vec![
            Err(GenerationError::Blocked("SAFETY".into())),
            Ok("never requested".into()),
        ]));
        let service = service(backend.clone());
        let image = sample_png(32, 32);

        let first = service.analyze("", &image).await.unwrap();
        let second = service.analyze("", &image).await.unwrap();

        assert!(first.text.starts_with(ERROR_LABEL));
        assert_eq!(first.text, second.text);
        assert!(second.cached);
        assert_eq!(backend.calls(), vec!["m1"]);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_large_upload_prepared_on_current_thread_runtime() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok("report".into())]));
        let report = service(backend.clone())
            .analyze("Analyze joint stability", &sample_png(2048, 1536))
            .await
            .unwrap();

        assert_eq!(report.text, "report");
        assert_eq!(backend.calls(), vec!["m1"]);
    }

    #[tokio::test]
    async fn test_other_error_surfaces_text() {
        let backend = Arc::new(ScriptedBackend::new(vec![Err(GenerationError::Blocked(
            "SAFETY".into(),
        ))]));
        let report = service(backend.clone())
            .analyze("", &sample_png(32, 32))
            .await
            .unwrap();

        assert!(report.text.starts_with(ERROR_LABEL));
        assert!(report.text.contains("SAFETY"));
        assert_eq!(backend.calls(), vec!["m1"]);
    }

    #[tokio::test]
    async fn test_invalid_image_makes_no_call() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok("unused".into())]));
        let result = service(backend.clone()).analyze("focus", b"not an image").await;

        assert!(matches!(
            result,
            Err(InspectionError::Image(ImageError::InvalidImage(_)))
        ));
        assert!(backend.calls().is_empty());
    }
}
