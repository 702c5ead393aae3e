use axum::{http::Uri, response::Json};
use odata_http::ErrorResponse;
use serde_json::{json, Value};

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

/// Unknown routes answer with the same error body as the collections.
pub async fn not_found(uri: Uri) -> ErrorResponse {
    ErrorResponse::new(
        axum::http::StatusCode::NOT_FOUND,
        format!("No resource at {}", uri.path()),
    )
}
