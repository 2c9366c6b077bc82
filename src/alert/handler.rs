//! Alertmanager webhook endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::api::AppState;

use super::types::AlertmanagerPayload;

/// `POST /api/v1/alerts/webhook`
///
/// Decodes the Alertmanager v4 payload, drops resolved items silently, and
/// ingests each firing alert. Responds `202` on successful enqueue, `400`
/// on malformed JSON, `500` if ingestion fails.
pub async fn alert_webhook(
    State(state): State<Arc<AppState>>,
    body: String,
) -> impl IntoResponse {
    let payload: AlertmanagerPayload = match serde_json::from_str(&body) {
        Ok(p) => p,
        Err(e) => {
            tracing::error!(error = %e, "failed to decode alertmanager payload");
            return (StatusCode::BAD_REQUEST, "invalid request body").into_response();
        }
    };

    let mut firing = 0usize;
    for item in &payload.alerts {
        if !item.is_firing() {
            tracing::debug!(status = %item.status, "skipping non-firing alert");
            continue;
        }
        if let Err(e) = state.aggregator.ingest(item) {
            tracing::error!(
                error = %e,
                alertname = item.labels.get("alertname").map(String::as_str).unwrap_or(""),
                "failed to ingest alert"
            );
            return (StatusCode::INTERNAL_SERVER_ERROR, "failed to ingest alert").into_response();
        }
        firing += 1;
    }

    tracing::info!(total = payload.alerts.len(), firing, "webhook received");
    StatusCode::ACCEPTED.into_response()
}
