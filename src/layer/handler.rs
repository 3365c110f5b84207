//! HTTP handlers for the layer API.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::error::FeatureError;
use crate::format::{self, LayerFormat};
use crate::guard;
use crate::handler::AppState;
use crate::model::{DocumentId, FeatureBody};

const KEY_REJECTION_MESSAGE: &str = "This key is not valid for this layer.";

#[derive(Debug, Deserialize)]
pub struct KeyParams {
    pub key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
}

fn success<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(data)).into_response()
}

fn error_response(err: FeatureError) -> Response {
    let (status, message) = match &err {
        FeatureError::KeyConflict => (StatusCode::FORBIDDEN, KEY_REJECTION_MESSAGE.to_string()),
        FeatureError::NotFound => (StatusCode::NOT_FOUND, "no such feature".to_string()),
        FeatureError::MalformedGeometry(detail) => {
            (StatusCode::UNPROCESSABLE_ENTITY, detail.clone())
        }
        FeatureError::Csv(detail) => {
            tracing::error!("failed to render csv: {}", detail);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to render csv".to_string(),
            )
        }
        FeatureError::Store(e) => {
            tracing::error!("store failure: {}", crate::unpack_error(e));
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal storage error".to_string(),
            )
        }
    };
    (status, Json(ErrorResponse { message })).into_response()
}

/// Runs the ownership guard for a write. Some(response) means the write
/// must not proceed.
async fn guard_write(state: &AppState, layer: &str, key: Option<&str>) -> Option<Response> {
    match guard::check_key(state.repo.store(), layer, key).await {
        Ok(true) => None,
        Ok(false) => Some(error_response(FeatureError::KeyConflict)),
        Err(e) => Some(error_response(FeatureError::Store(e))),
    }
}

pub async fn list_layer(State(state): State<AppState>, Path(segment): Path<String>) -> Response {
    let (layer, format) = format::parse_layer_segment(&segment);

    let features = match state.repo.list_by_layer(layer).await {
        Ok(features) => features,
        Err(e) => return error_response(e),
    };

    match format {
        LayerFormat::Csv => match format::to_csv(&features) {
            Ok(text) => ([(header::CONTENT_TYPE, "text/csv")], text).into_response(),
            Err(e) => error_response(e),
        },
        LayerFormat::GeoJson => success(format::feature_collection(features)),
    }
}

pub async fn get_feature(
    State(state): State<AppState>,
    // The layer segment is accepted but not consulted: id lookups are
    // store-wide.
    Path((_layer, id)): Path<(String, DocumentId)>,
) -> Response {
    match state.repo.get_by_id(id).await {
        Ok(feature) => success(feature),
        Err(e) => error_response(e),
    }
}

pub async fn create_feature(
    State(state): State<AppState>,
    Path(layer): Path<String>,
    Query(params): Query<KeyParams>,
    Json(body): Json<FeatureBody>,
) -> Response {
    let key = params.key.as_deref();
    if let Some(denied) = guard_write(&state, &layer, key).await {
        return denied;
    }

    tracing::info!(layer = %layer, "inserting feature");
    match state.repo.create(&layer, key, body).await {
        Ok(feature) => success(feature),
        Err(e) => error_response(e),
    }
}

pub async fn update_feature(
    State(state): State<AppState>,
    Path((layer, id)): Path<(String, DocumentId)>,
    Query(params): Query<KeyParams>,
    Json(body): Json<FeatureBody>,
) -> Response {
    if let Some(denied) = guard_write(&state, &layer, params.key.as_deref()).await {
        return denied;
    }

    tracing::info!(layer = %layer, id, "updating feature");
    match state.repo.update(id, &layer, body).await {
        Ok(ack) => success(ack),
        Err(e) => error_response(e),
    }
}

pub async fn delete_feature(
    State(state): State<AppState>,
    Path((layer, id)): Path<(String, DocumentId)>,
    Query(params): Query<KeyParams>,
) -> Response {
    if let Some(denied) = guard_write(&state, &layer, params.key.as_deref()).await {
        return denied;
    }

    tracing::info!(layer = %layer, id, "deleting feature");
    match state.repo.delete(id).await {
        Ok(ack) => success(ack),
        Err(e) => error_response(e),
    }
}
