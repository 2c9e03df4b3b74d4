use axum::{routing::MethodRouter, Router};
use std::sync::Arc;

use crate::web::AppState;

pub mod ingredient_routes;
pub mod recipe_routes;
pub mod tag_routes;

/// Registers `path` both with and without a trailing slash.
fn route_both(
    router: Router<Arc<AppState>>,
    path: &str,
    method_router: MethodRouter<Arc<AppState>>,
) -> Router<Arc<AppState>> {
    router
        .route(path, method_router.clone())
        .route(&format!("{path}/"), method_router)
}
