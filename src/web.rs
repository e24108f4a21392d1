//! The presentation shell: a single page plus the JSON endpoints it calls.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Json, Response},
    routing::{get, post},
    Form, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::error::{ImageError, InspectionError};
use crate::inspection::{InspectionService, REPORT_FILE_NAME};

pub const MISSING_IMAGE_WARNING: &str = "Please upload a site image to begin.";

const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

#[derive(Clone)]
struct AppState {
    service: Arc<InspectionService>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeResponse {
    pub report: String,
    pub model: Option<String>,
    pub cached: bool,
    pub file_name: String,
    pub processing_time_ms: u128,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub models: Vec<String>,
    pub cache_entries: usize,
    pub cache_capacity: usize,
}

#[derive(Debug, Deserialize)]
struct DownloadForm {
    report: String,
}

#[derive(Debug)]
enum ApiError {
    MissingImage,
    Multipart(String),
    Inspection(InspectionError),
}

impl From<InspectionError> for ApiError {
    fn from(err: InspectionError) -> Self {
        ApiError::Inspection(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::MissingImage => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "warning": MISSING_IMAGE_WARNING }),
            ),
            ApiError::Multipart(message) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": message }),
            ),
            ApiError::Inspection(InspectionError::Image(err)) => {
                let status = match err {
                    ImageError::UnsupportedFormat(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                    ImageError::InvalidImage(_) => StatusCode::UNPROCESSABLE_ENTITY,
                    ImageError::Encode(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, serde_json::json!({ "error": err.to_string() }))
            }
            ApiError::Inspection(err @ InspectionError::Worker(_)) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": err.to_string() }),
            ),
        };
        (status, Json(body)).into_response()
    }
}

pub fn router(service: Arc<InspectionService>) -> Router {
    let state = AppState { service };

    Router::new()
        .route("/", get(index))
        .route("/api/status", get(status))
        .route("/api/analyze", post(analyze))
        .route("/api/report/download", post(download))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn index() -> Html<&'static str> {
    Html(include_str!("../assets/index.html"))
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let service = &state.service;
    Json(StatusResponse {
        models: service.candidates().iter().map(String::from).collect(),
        cache_entries: service.cache().len(),
        cache_capacity: service.cache().capacity(),
    })
}

async fn analyze(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let start = Instant::now();

    let mut focus = String::new();
    let mut image = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::Multipart(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "focus" => {
                focus = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Multipart(e.to_string()))?;
            }
            "image" => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Multipart(e.to_string()))?;
                if !data.is_empty() {
                    image = Some(data);
                }
            }
            other => warn!("Ignoring unexpected form field {:?}", other),
        }
    }

    let Some(image) = image else {
        info!("Analysis requested without an image");
        return Err(ApiError::MissingImage);
    };

    let report = state.service.analyze(&focus, &image).await?;

    Ok(Json(AnalyzeResponse {
        report: report.text,
        model: report.model,
        cached: report.cached,
        file_name: REPORT_FILE_NAME.to_string(),
        processing_time_ms: start.elapsed().as_millis(),
    }))
}

async fn download(Form(form): Form<DownloadForm>) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", REPORT_FILE_NAME),
            ),
        ],
        form.report,
    )
}
