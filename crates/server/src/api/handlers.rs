use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use sweeparr_core::{CycleStats, StrikeRecord};

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// One strike record together with the download id it is keyed by.
#[derive(Serialize)]
pub struct StrikeEntry {
    pub id: String,
    #[serde(flatten)]
    pub record: StrikeRecord,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    collect_dynamic_metrics(&state).await;
    match encode_metrics() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Stats of the most recent cycle.
pub async fn last_cycle(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CycleStats>, (StatusCode, Json<ErrorResponse>)> {
    state.last_stats().await.map(Json).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: "No cycle has completed yet".to_string(),
            }),
        )
    })
}

/// Every tracked strike record, sorted by download id.
pub async fn list_strikes(State(state): State<Arc<AppState>>) -> Json<Vec<StrikeEntry>> {
    let mut entries: Vec<StrikeEntry> = state
        .ledger()
        .get_all_records()
        .await
        .into_iter()
        .map(|(id, record)| StrikeEntry { id, record })
        .collect();
    entries.sort_by(|a, b| a.id.cmp(&b.id));
    Json(entries)
}
