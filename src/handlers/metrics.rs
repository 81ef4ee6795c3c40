use axum::http::StatusCode;
use tracing::error;

use crate::metrics;

pub async fn metrics_handler() -> Result<String, (StatusCode, String)> {
    metrics::gather().map_err(|e| {
        error!("Failed to gather metrics: {}", e);
        (StatusCode::INTERNAL_SERVER_ERROR, format!("Error gathering metrics: {}", e))
    })
}
