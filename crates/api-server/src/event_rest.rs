//! Delivery event webhook and campaign metrics endpoints.

use crate::rest::{api_error, ApiError, AppState, ErrorResponse};
use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use campaign_core::error::IngestError;
use campaign_core::MetricsSnapshot;
use serde::Deserialize;
use serde_json::Value;
use tracing::{error, warn};
use utoipa::IntoParams;

const WEBHOOK_RECEIVED: &str = "Webhook received";
const NO_DATA_RECEIVED: &str = "No data received";

/// POST /v1/events: Delivery event webhook.
///
/// The body is a JSON array of `{email, event, timestamp}` objects. Malformed
/// items are skipped; the batch is still acknowledged.
#[utoipa::path(
    post,
    path = "/v1/events",
    tag = "Events",
    request_body(content = Vec<serde_json::Value>, description = "Delivery events", content_type = "application/json"),
    responses(
        (status = 200, description = "Webhook received", body = String),
        (status = 400, description = "No data received", body = String),
        (status = 500, description = "Event store failure", body = String),
    )
)]
pub async fn handle_event_webhook(
    State(state): State<AppState>,
    body: Bytes,
) -> (StatusCode, String) {
    let batch = match parse_batch(&body) {
        Ok(batch) => batch,
        Err(msg) => {
            warn!(error = msg, "Rejected webhook body");
            metrics::counter!("api.validation_errors", "kind" => "webhook").increment(1);
            return (StatusCode::BAD_REQUEST, msg.to_string());
        }
    };

    match state.ingestor.ingest(batch).await {
        Ok(_) => (StatusCode::OK, WEBHOOK_RECEIVED.to_string()),
        Err(IngestError::EmptyBatch) => (StatusCode::BAD_REQUEST, NO_DATA_RECEIVED.to_string()),
        Err(e) => {
            error!(error = %e, "Webhook ingestion failed");
            metrics::counter!("api.errors").increment(1);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    }
}

/// Absent, blank or `null` bodies mean "no data"; anything else must be an
/// array.
fn parse_batch(body: &[u8]) -> Result<Option<Vec<Value>>, &'static str> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Null) => Ok(None),
        Ok(Value::Array(events)) => Ok(Some(events)),
        Ok(_) => Err("Expected a JSON array of events"),
        Err(_) => Err("Invalid JSON body"),
    }
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MetricsParams {
    /// Restrict every counter to this recipient.
    pub email: Option<String>,
}

/// GET /v1/metrics: Campaign counters computed from stored events.
#[utoipa::path(
    get,
    path = "/v1/metrics",
    tag = "Events",
    params(MetricsParams),
    responses(
        (status = 200, description = "Current counters", body = MetricsSnapshot),
        (status = 500, description = "Event store failure", body = ErrorResponse),
    )
)]
pub async fn handle_metrics(
    State(state): State<AppState>,
    Query(params): Query<MetricsParams>,
) -> Result<Json<MetricsSnapshot>, ApiError> {
    let snapshot = match params.email.as_deref().map(str::trim) {
        Some(email) if !email.is_empty() => state.aggregator.snapshot_for(email).await,
        _ => state.aggregator.snapshot().await,
    };

    snapshot.map(Json).map_err(|e| {
        error!(error = %e, "Metrics query failed");
        metrics::counter!("api.errors").increment(1);
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "metrics_unavailable",
            e.to_string(),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_batch_no_data() {
        assert_eq!(parse_batch(b""), Ok(None));
        assert_eq!(parse_batch(b"  \n"), Ok(None));
        assert_eq!(parse_batch(b"null"), Ok(None));
    }

    #[test]
    fn test_parse_batch_array() {
        let batch = parse_batch(br#"[{"email":"a@x","event":"open","timestamp":1}]"#).unwrap();
        assert_eq!(
            batch,
            Some(vec![json!({"email": "a@x", "event": "open", "timestamp": 1})])
        );
        assert_eq!(parse_batch(b"[]"), Ok(Some(vec![])));
    }

    #[test]
    fn test_parse_batch_rejects_non_arrays() {
        assert!(parse_batch(br#"{"email":"a@x"}"#).is_err());
        assert!(parse_batch(b"[not json").is_err());
    }
}
