//! Route tables. [`api_router`] assembles everything under the configured API prefix.

mod common;
mod user;

pub use common::common_routes;
pub use user::{user_routes, MAX_BODY_BYTES};

use crate::state::AppState;
use axum::Router;

/// Common and user routes nested under `settings.api_version`.
pub fn api_router(state: AppState) -> Router {
    let routes = common_routes(state.clone()).merge(user_routes(state.clone()));
    match state.settings.api_version.as_str() {
        "/" => routes,
        prefix => Router::new().nest(prefix, routes),
    }
}
