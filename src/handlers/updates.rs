use axum::{
    body::Bytes,
    extract::{Path, State},
    http::header::CONTENT_TYPE,
    response::IntoResponse,
    Json,
};
use tracing::debug;

use super::AppState;
use crate::error::AppError;
use crate::models::{parse_from_text, validate, Metric, WireMetric};

/// Handle POST /update/{type}/{name}/{value}
pub async fn update_from_path(
    State(state): State<AppState>,
    Path((kind, name, literal)): Path<(String, String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let metric = parse_from_text(&kind, &name, &literal)?;
    let merged = state.service.upsert(metric).await?;
    debug!(metric = %merged, "Updated from path");

    Ok(([(CONTENT_TYPE, "text/plain; charset=utf-8")], merged.scalar()))
}

/// Handle POST /update with one JSON metric
pub async fn update_json(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<WireMetric>, AppError> {
    let wire: WireMetric = serde_json::from_slice(&body)?;
    let metric = validate(wire)?;
    let merged = state.service.upsert(metric).await?;

    Ok(Json(merged.to_wire()))
}

/// Handle POST /updates with a JSON array.
///
/// Every entry is validated before anything touches the store; one invalid
/// entry rejects the whole batch.
pub async fn updates_json(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Vec<WireMetric>>, AppError> {
    let batch: Vec<WireMetric> = serde_json::from_slice(&body)?;
    let metrics = batch
        .into_iter()
        .map(validate)
        .collect::<Result<Vec<Metric>, _>>()?;

    let received = metrics.len();
    let merged = state.service.batch_update(metrics).await?;
    debug!(received, stored = merged.len(), "Batch update applied");

    Ok(Json(merged.iter().map(WireMetric::from).collect()))
}
