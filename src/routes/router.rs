use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::collector::Collector;
use crate::handlers::{handle_collect, health, metric_types};

/// Общее состояние HTTP обработчиков
#[derive(Clone)]
pub struct AppState {
    pub collector: Collector,
    /// Таймаут для агентов из запроса, если он не указан
    pub default_timeout: Option<u64>,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metric-types", get(metric_types))
        .route("/collect", post(handle_collect))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
