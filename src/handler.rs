use axum::{Json, Router, response::IntoResponse, routing::get};
use serde::Serialize;
use tracing::info;

use crate::assets::serve_index;
use crate::layer;
use crate::repo::FeatureRepository;

#[derive(Clone)]
pub struct AppState {
    pub repo: FeatureRepository,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub async fn healthcheck() -> impl IntoResponse {
    info!("got healthcheck request");
    Json(HealthResponse { status: "ok" })
}

/// Full route table. Kept out of main so the integration tests can drive
/// the router directly.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(serve_index))
        .route("/health", get(healthcheck))
        .nest("/layer", layer::routes())
        .with_state(state)
}
