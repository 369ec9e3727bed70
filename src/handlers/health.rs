use axum::{Json, extract::State, http::StatusCode};
use serde_json::{Value, json};

use crate::routes::AppState;

pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "ready",
            "UTC_time": chrono::Utc::now().to_rfc2822(),
            "metrics": state.collector.catalog().len(),
            "sessions": state.collector.pool().len(),
        })),
    )
}
