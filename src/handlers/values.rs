use axum::{
    body::Bytes,
    extract::{Path, State},
    http::header::CONTENT_TYPE,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;

use super::AppState;
use crate::error::AppError;
use crate::models::{MetricKind, WireMetric};

/// Body of POST /value
#[derive(Debug, Deserialize)]
pub struct ValueRequest {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Handle GET / with every stored metric
pub async fn list_all(State(state): State<AppState>) -> Result<Json<Vec<WireMetric>>, AppError> {
    let all = state.service.get_all().await?;
    Ok(Json(all.iter().map(WireMetric::from).collect()))
}

/// Handle GET /value/{type}/{name} as a plain-text scalar
pub async fn get_value(
    State(state): State<AppState>,
    Path((kind, name)): Path<(String, String)>,
) -> Result<impl IntoResponse, AppError> {
    let kind = MetricKind::parse(&kind)?;
    let metric = state.service.get(kind, &name).await?;

    Ok(([(CONTENT_TYPE, "text/plain; charset=utf-8")], metric.scalar()))
}

/// Handle POST /value with `{id, type}`
pub async fn value_json(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<WireMetric>, AppError> {
    let request: ValueRequest = serde_json::from_slice(&body)?;
    let kind = MetricKind::parse(&request.kind)?;
    let metric = state.service.get(kind, &request.id).await?;

    Ok(Json(metric.to_wire()))
}
