//! `/user` CRUD routes.

use crate::handlers::user::{
    batch_create, batch_update, count, create, delete as delete_handler, delete_many, id_list, list, page, read,
    update,
};
use crate::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;

/// Request bodies above this size are rejected with 413.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

pub fn user_routes(state: AppState) -> Router {
    Router::new()
        .route("/user", post(create).put(update).delete(delete_many))
        .route("/user/page", get(page))
        .route("/user/list", get(list))
        .route("/user/ids", get(id_list))
        .route("/user/count", get(count))
        .route("/user/batch", post(batch_create).put(batch_update))
        .route("/user/:id", get(read).delete(delete_handler))
        .layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)))
        .with_state(state)
}
