use axum::{
    extract::DefaultBodyLimit,
    http::Method,
    middleware as axum_middleware,
    routing::get,
    Router,
};
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;

use crate::server::config::ServerConfig;
use crate::web::middleware::auth;
use crate::web::routes::{ingredient_routes, recipe_routes, tag_routes};

pub use crate::web::error::AppError;

pub mod error;
pub mod extract;
pub mod middleware;
pub mod models;
pub mod routes;

#[cfg(test)]
mod tests;

/// Mount point of the recipe resources.
pub const API_PREFIX: &str = "/api/recipe";

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DatabaseConnection,
    pub config: Arc<ServerConfig>,
}

async fn health_check_handler() -> &'static str {
    "OK"
}

pub fn create_axum_router(db_pool: DatabaseConnection, config: Arc<ServerConfig>) -> Router {
    let app_state = Arc::new(AppState {
        db_pool,
        config: config.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(vec![
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any);

    let recipe_api = Router::new()
        .merge(tag_routes::create_tags_router())
        .merge(ingredient_routes::create_ingredients_router())
        .merge(recipe_routes::create_recipes_router())
        .route_layer(axum_middleware::from_fn_with_state(app_state.clone(), auth::auth));

    let mut router = Router::new()
        .route("/api/health", get(health_check_handler))
        .nest(API_PREFIX, recipe_api);

    // Stored images are public once their URL is known.
    if config.media_url.starts_with('/') && config.media_url.len() > 1 {
        router = router.nest_service(&config.media_url, ServeDir::new(&config.media_root));
    }

    router
        .with_state(app_state)
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(cors)
}
