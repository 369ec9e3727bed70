use axum::{Json, extract::State, http::StatusCode};
use tracing::warn;

use crate::collector::{MetricType, NamespacePattern};
use crate::error::Error;
use crate::formatter::{CollectionJson, JsonFormatter};
use crate::models::CollectRequest;
use crate::routes::AppState;

fn status_for(error: &Error) -> StatusCode {
    match error {
        Error::Config(_) | Error::UnsupportedNamespace(_) | Error::InvalidOid(_) => {
            StatusCode::BAD_REQUEST
        }
        Error::Connection { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn reject(error: Error) -> (StatusCode, String) {
    (status_for(&error), error.to_string())
}

/// Шаблоны из запроса; без них опрашиваются все метрики каталога.
fn requested_patterns(
    state: &AppState,
    namespaces: &[String],
) -> Result<Vec<NamespacePattern>, Error> {
    if namespaces.is_empty() {
        return state
            .collector
            .catalog()
            .definitions()
            .map(|metric| NamespacePattern::parse(&metric.key()))
            .collect();
    }

    namespaces.iter().map(|ns| NamespacePattern::parse(ns)).collect()
}

pub async fn handle_collect(
    State(state): State<AppState>,
    Json(request): Json<CollectRequest>,
) -> Result<Json<CollectionJson>, (StatusCode, String)> {
    let agent = request
        .agent
        .validate(state.default_timeout)
        .map_err(reject)?;

    let patterns = requested_patterns(&state, &request.namespaces).map_err(reject)?;

    let values = state
        .collector
        .collect(&agent, &patterns)
        .await
        .map_err(|e| {
            warn!(agent = %agent.name, error = %e, "сбор по HTTP не удался");
            reject(e)
        })?;

    Ok(Json(JsonFormatter::format_collection(&agent, &values)))
}

pub async fn metric_types(State(state): State<AppState>) -> Json<Vec<MetricType>> {
    Json(state.collector.catalog().metric_types())
}
