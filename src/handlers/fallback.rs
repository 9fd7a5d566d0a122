use axum::{http::{StatusCode, Uri}, Json};
use crate::models::ErrorResponse;
use tracing::debug;

/// JSON 404 for every unknown path
pub async fn not_found(uri: Uri) -> (StatusCode, Json<ErrorResponse>) {
    debug!("No route for {}", uri);
    let status = StatusCode::NOT_FOUND;
    (
        status,
        Json(ErrorResponse {
            code: status.as_u16(),
            status: status.to_string(),
            error: format!("No route for {}", uri.path()),
        }),
    )
}
