use axum::{
    Router,
    routing::{delete, get, post, put},
};

use super::handler;
use crate::handler::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/:layer", get(handler::list_layer))
        .route("/:layer", post(handler::create_feature))
        .route("/:layer/:id", get(handler::get_feature))
        .route("/:layer/:id", put(handler::update_feature))
        .route("/:layer/:id", delete(handler::delete_feature))
}
