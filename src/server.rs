//! HTTP API server.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/api/analyze-image` | Label an uploaded image (multipart field `image`) |
//! | `POST` | `/api/create-post-with-analysis` | Create a post from a form with an `imageFile` |
//! | `POST` | `/api/search-by-tags` | Rank stored posts against `{ "labels": [{ "name" }] }` |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! All error responses share one shape:
//!
//! ```json
//! { "error": "No file was uploaded." }
//! ```
//!
//! `400` for missing files, empty label lists and malformed bodies; `500`
//! for any downstream failure. The 500 message never says which downstream
//! service failed; the details go to the log.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so the browser front end
//! can be served from any origin.

use anyhow::Context;
use axum::{
    extract::{
        multipart::MultipartRejection, rejection::JsonRejection, DefaultBodyLimit, Multipart,
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::ServiceError;
use crate::ingest::{analyze_image, create_post_with_analysis};
use crate::models::{ImageUpload, Label, PostDocument, PostSubmission};
use crate::relevance::ScoredPost;
use crate::search::search_by_tags;
use crate::traits::Services;

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    services: Services,
}

/// Starts the HTTP server with clients for the configured remote services.
///
/// Binds to `config.server.bind` and runs until the process is terminated.
pub async fn run_server(config: Config) -> anyhow::Result<()> {
    let services = Services::connect(config)?;
    run_server_with_services(services).await
}

/// Starts the HTTP server with the given services.
///
/// Used by [`run_server`] and by tests that inject in-memory services.
pub async fn run_server_with_services(services: Services) -> anyhow::Result<()> {
    let bind_addr = services.config.server.bind.clone();
    let app = build_router(services);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;
    info!("pet-tagger listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Builds the router with all routes and layers.
pub fn build_router(services: Services) -> Router {
    let max_upload_bytes = services.config.server.max_upload_bytes;

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/analyze-image", post(handle_analyze_image))
        .route(
            "/api/create-post-with-analysis",
            post(handle_create_post_with_analysis),
        )
        .route("/api/search-by-tags", post(handle_search_by_tags))
        .route("/health", get(handle_health))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(AppState { services })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Constructs a 400 Bad Request error.
fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        message: message.into(),
    }
}

/// Constructs a 500 error with a caller-safe message.
fn internal(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        message: message.into(),
    }
}

/// Maps an orchestrator error to a response. Downstream failures are logged
/// with their full cause chain and answered with `public_message`.
fn service_error(err: ServiceError, public_message: &str) -> AppError {
    match err {
        ServiceError::InvalidInput(message) => bad_request(message),
        ServiceError::Remote(cause) => {
            error!("{} {:#}", public_message, cause);
            internal(public_message)
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    /// Always `"ok"` when the server is running.
    status: String,
    /// The crate version from `Cargo.toml`.
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /api/analyze-image ============

#[derive(Serialize)]
struct AnalyzeResponse {
    message: String,
    labels: Vec<Label>,
}

/// Handler for `POST /api/analyze-image`.
///
/// Reads the `image` part and returns every label the labeling service
/// reports, unfiltered.
async fn handle_analyze_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<AnalyzeResponse>, AppError> {
    let mut multipart = multipart.map_err(|e| bad_request(e.body_text()))?;

    let mut image = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.body_text()))?
    {
        if field.name() == Some("image") {
            image = Some(field.bytes().await.map_err(|e| bad_request(e.body_text()))?);
        }
    }

    let image = image
        .filter(|bytes| !bytes.is_empty())
        .ok_or_else(|| bad_request("No file was uploaded."))?;

    let labels = analyze_image(&state.services, &image)
        .await
        .map_err(|e| service_error(e, "Server error while analyzing the image."))?;

    Ok(Json(AnalyzeResponse {
        message: "Analysis completed successfully.".to_string(),
        labels,
    }))
}

// ============ POST /api/create-post-with-analysis ============

/// Handler for `POST /api/create-post-with-analysis`.
///
/// The `imageFile` part is the photo; every other part is a text field of
/// the post. Responds `201` with the created post document.
async fn handle_create_post_with_analysis(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<PostDocument>), AppError> {
    let mut multipart = multipart.map_err(|e| bad_request(e.body_text()))?;

    let mut submission = PostSubmission::default();
    let mut image: Option<ImageUpload> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == "imageFile" {
            let filename = field.file_name().unwrap_or("upload").to_string();
            let bytes = field.bytes().await.map_err(|e| bad_request(e.body_text()))?;
            image = Some(ImageUpload {
                filename,
                bytes: bytes.to_vec(),
            });
        } else {
            let value = field.text().await.map_err(|e| bad_request(e.body_text()))?;
            if !submission.set_field(&name, value) {
                debug!(field = %name, "ignoring unknown form field");
            }
        }
    }

    let image = image
        .filter(|upload| !upload.bytes.is_empty())
        .ok_or_else(|| bad_request("No image file was uploaded."))?;

    let post = create_post_with_analysis(&state.services, &submission, &image)
        .await
        .map_err(|e| service_error(e, "Internal server error while creating the post."))?;

    Ok((StatusCode::CREATED, Json(post)))
}

// ============ POST /api/search-by-tags ============

#[derive(Deserialize)]
struct SearchRequest {
    #[serde(default)]
    labels: Vec<SearchLabel>,
}

#[derive(Deserialize)]
struct SearchLabel {
    name: String,
}

/// Handler for `POST /api/search-by-tags`.
async fn handle_search_by_tags(
    State(state): State<AppState>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<Vec<ScoredPost>>, AppError> {
    let Json(request) = payload.map_err(|e| bad_request(e.body_text()))?;
    let terms: Vec<String> = request.labels.into_iter().map(|l| l.name).collect();

    let results = search_by_tags(&state.services, &terms)
        .await
        .map_err(|e| service_error(e, "Internal server error during the search."))?;

    Ok(Json(results))
}
