//! Campaign upload endpoint: load the audience, validate, schedule.

use crate::rest::{api_error, ApiError, AppState, ErrorResponse};
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use campaign_core::error::DatasetError;
use campaign_core::types::BatchResult;
use campaign_core::Dataset;
use campaign_integrations::{CsvSource, DatasetSource, SpreadsheetSource};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, warn};
use utoipa::ToSchema;
use uuid::Uuid;

/// A campaign: one template plus exactly one audience source.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CampaignRequest {
    /// Prompt template with `{column}` placeholders.
    pub template: String,
    pub subject: Option<String>,
    /// Inline records, one object per recipient.
    #[schema(value_type = Option<Vec<Object>>)]
    pub rows: Option<Vec<Map<String, Value>>>,
    /// CSV text with a header row.
    pub csv: Option<String>,
    /// Link to a published spreadsheet; its first sheet is used.
    pub sheet_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CampaignResponse {
    pub campaign_id: Uuid,
    pub scheduled: usize,
    pub skipped: Vec<SkippedRowResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SkippedRowResponse {
    pub row: usize,
    pub reason: String,
}

impl From<BatchResult> for CampaignResponse {
    fn from(result: BatchResult) -> Self {
        Self {
            campaign_id: result.campaign_id,
            scheduled: result.scheduled_count,
            skipped: result
                .skipped
                .into_iter()
                .map(|s| SkippedRowResponse {
                    row: s.row_index,
                    reason: s.reason.to_string(),
                })
                .collect(),
        }
    }
}

/// POST /v1/campaigns: Validate a campaign and schedule one email per row.
#[utoipa::path(
    post,
    path = "/v1/campaigns",
    tag = "Campaigns",
    request_body = CampaignRequest,
    responses(
        (status = 200, description = "Campaign scheduled", body = CampaignResponse),
        (status = 400, description = "Invalid dataset or template", body = ErrorResponse),
    )
)]
pub async fn handle_create_campaign(
    State(state): State<AppState>,
    Json(request): Json<CampaignRequest>,
) -> Result<Json<CampaignResponse>, ApiError> {
    let dataset = load_dataset(&request).await.map_err(|e| {
        warn!(error = %e, "Campaign dataset rejected");
        metrics::counter!("api.validation_errors", "kind" => "dataset").increment(1);
        api_error(StatusCode::BAD_REQUEST, "invalid_dataset", e.to_string())
    })?;

    let result = state
        .scheduler
        .schedule_with_subject(&dataset, &request.template, request.subject.as_deref())
        .await
        .map_err(|e| {
            warn!(error = %e, "Campaign template rejected");
            metrics::counter!("api.validation_errors", "kind" => "template").increment(1);
            api_error(StatusCode::BAD_REQUEST, "validation_failed", e.to_string())
        })?;

    info!(
        campaign_id = %result.campaign_id,
        scheduled = result.scheduled_count,
        "Campaign accepted"
    );
    Ok(Json(result.into()))
}

async fn load_dataset(request: &CampaignRequest) -> Result<Dataset, DatasetError> {
    match (&request.rows, &request.csv, &request.sheet_url) {
        (Some(rows), None, None) => Dataset::from_records(rows.clone()),
        (None, Some(csv), None) => CsvSource::from_text(csv.as_str()).load().await,
        (None, None, Some(url)) => SpreadsheetSource::new(url)?.load().await,
        (None, None, None) => Err(DatasetError::InvalidSource(
            "provide one of 'rows', 'csv' or 'sheet_url'".into(),
        )),
        _ => Err(DatasetError::InvalidSource(
            "provide only one of 'rows', 'csv' or 'sheet_url'".into(),
        )),
    }
}
