/*!
HTTP surface for chart generation.

## Endpoints

- `POST /generate-chart/` - Resolve and render a chart request
- `GET /api/v1/health` - Health check
*/

use crate::error::ChartError;
use crate::runtime;
use crate::{RenderOptions, VERSION};
use axum::{
    body::Bytes,
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

/// Shared application state
#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub options: RenderOptions,
}

// ============================================================================
// Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ChartResponse {
    pub image_data: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

// ============================================================================
// Error Handling
// ============================================================================

/// Maps a ChartError onto an HTTP status and `{"error": ...}` body
pub struct ApiErrorResponse {
    status: StatusCode,
    message: String,
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

impl From<ChartError> for ApiErrorResponse {
    fn from(err: ChartError) -> Self {
        let status = if err.is_client_error() {
            StatusCode::BAD_REQUEST
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };
        ApiErrorResponse {
            status,
            message: err.to_string(),
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /generate-chart/ - Resolve and render a chart
async fn generate_chart_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<ChartResponse>, ApiErrorResponse> {
    let request = runtime::parse_request(&body).map_err(|e| {
        warn!("Rejected chart request: {}", e);
        e
    })?;
    let kind = request.kind;
    info!("Generating {} chart", kind);

    let options = state.options.clone();
    let rendered = tokio::task::spawn_blocking(move || runtime::render_chart(&request, &options))
        .await
        .map_err(|e| ChartError::Internal(format!("render task failed: {}", e)))?;

    let bytes = rendered.map_err(|e| {
        if e.is_client_error() {
            warn!("Invalid {} chart request: {}", kind, e);
        } else {
            error!("Failed to render {} chart: {}", kind, e);
        }
        e
    })?;

    Ok(Json(ChartResponse {
        image_data: runtime::encode_data_url(&bytes, state.options.format),
    }))
}

/// GET /api/v1/health - Health check
async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: VERSION.to_string(),
    })
}

// ============================================================================
// Router
// ============================================================================

/// CORS for a comma-separated origin list, or any origin for `*`.
pub fn cors_layer(cors_origin: &str) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(vec![header::CONTENT_TYPE]);
    if cors_origin == "*" {
        layer.allow_origin(Any)
    } else {
        let origins: Vec<_> = cors_origin
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        layer.allow_origin(origins)
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/generate-chart/", post(generate_chart_handler))
        .route("/generate-chart", post(generate_chart_handler))
        .route("/api/v1/health", get(health_handler))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
