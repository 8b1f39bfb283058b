use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, ConnectInfo, DefaultBodyLimit, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};

use crate::handlers::{AnalysisError, AnalysisPipeline};

/// Transport cap on the whole request body, independent of the image cap.
pub const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

pub struct AppState {
    pub pipeline: AnalysisPipeline,
}

pub fn create_router(pipeline: AnalysisPipeline) -> Router {
    let state = Arc::new(AppState { pipeline });

    // also answers every OPTIONS request with 200
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_check))
        .route(
            "/api/analyze",
            post(analyze_handler).fallback(method_not_allowed),
        )
        .layer(
            ServiceBuilder::new()
                .layer(cors)
                .layer(DefaultBodyLimit::max(MAX_BODY_BYTES)),
        )
        .with_state(state)
}

/// Rate-limit key: first `X-Forwarded-For` hop, else the peer address.
pub fn client_identity(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
        .unwrap_or_else(|| "unknown".to_string())
}

async fn analyze_handler(
    State(state): State<Arc<AppState>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Result<Bytes, BytesRejection>,
) -> Response {
    let client_id = client_identity(&headers, connect_info.map(|ConnectInfo(addr)| addr));

    let payload: Result<&[u8], AnalysisError> = match &body {
        Ok(bytes) => Ok(bytes.as_ref()),
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            Err(AnalysisError::ImageTooLarge)
        }
        Err(rejection) => Err(AnalysisError::InvalidImage(rejection.body_text())),
    };

    let envelope = state.pipeline.handle(&client_id, payload).await;
    (envelope.http_status(), Json(envelope)).into_response()
}

async fn method_not_allowed() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::METHOD_NOT_ALLOWED,
        Json(serde_json::json!({ "error": "Method not allowed" })),
    )
}

async fn root_handler() -> &'static str {
    "CalorieSnap analysis server - POST a data URI image to /api/analyze"
}

async fn health_check() -> &'static str {
    "OK"
}
