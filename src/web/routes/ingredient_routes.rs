use axum::{
    extract::{Extension, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use crate::db::services::{IngredientError, IngredientService};
use crate::web::extract::{ApiJson, ApiPath};
use crate::web::models::tag_models::{IngredientResponse, NamePayload};
use crate::web::models::{required_text, AssignedQuery, AuthenticatedUser};
use crate::web::{AppError, AppState};

// --- Route Handlers ---

async fn list_ingredients_handler(
    Extension(user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<AssignedQuery>,
) -> Result<Json<Vec<IngredientResponse>>, AppError> {
    let ingredients = IngredientService::list_ingredients(&app_state.db_pool, user.id, query.assigned_only()?).await?;
    Ok(Json(ingredients.into_iter().map(IngredientResponse::from).collect()))
}

async fn create_ingredient_handler(
    Extension(user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<NamePayload>,
) -> Result<(StatusCode, Json<IngredientResponse>), AppError> {
    let name = required_text("name", payload.into_name()?)?;
    let ingredient = IngredientService::create_ingredient(&app_state.db_pool, user.id, name).await?;
    Ok((StatusCode::CREATED, Json(ingredient.into())))
}

async fn get_ingredient_handler(
    Extension(user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    ApiPath(ingredient_id): ApiPath<i32>,
) -> Result<Json<IngredientResponse>, AppError> {
    let ingredient = IngredientService::get_ingredient(&app_state.db_pool, ingredient_id, user.id).await?;
    Ok(Json(ingredient.into()))
}

async fn update_ingredient_handler(
    Extension(user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    ApiPath(ingredient_id): ApiPath<i32>,
    ApiJson(payload): ApiJson<NamePayload>,
) -> Result<Json<IngredientResponse>, AppError> {
    let name = required_text("name", payload.into_name()?)?;
    let ingredient = IngredientService::update_ingredient(&app_state.db_pool, ingredient_id, user.id, name).await?;
    Ok(Json(ingredient.into()))
}

/// PATCH without `name` returns the ingredient unchanged.
async fn patch_ingredient_handler(
    Extension(user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    ApiPath(ingredient_id): ApiPath<i32>,
    ApiJson(payload): ApiJson<NamePayload>,
) -> Result<Json<IngredientResponse>, AppError> {
    let ingredient = match payload.into_name()? {
        Some(name) => {
            let name = required_text("name", Some(name))?;
            IngredientService::update_ingredient(&app_state.db_pool, ingredient_id, user.id, name).await?
        }
        None => IngredientService::get_ingredient(&app_state.db_pool, ingredient_id, user.id).await?,
    };
    Ok(Json(ingredient.into()))
}

async fn delete_ingredient_handler(
    Extension(user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    ApiPath(ingredient_id): ApiPath<i32>,
) -> Result<StatusCode, AppError> {
    IngredientService::delete_ingredient(&app_state.db_pool, ingredient_id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Router ---

pub fn create_ingredients_router() -> Router<Arc<AppState>> {
    let router = super::route_both(
        Router::new(),
        "/ingridients",
        get(list_ingredients_handler).post(create_ingredient_handler),
    );
    super::route_both(
        router,
        "/ingridients/{ingredient_id}",
        get(get_ingredient_handler)
            .put(update_ingredient_handler)
            .patch(patch_ingredient_handler)
            .delete(delete_ingredient_handler),
    )
}

impl From<IngredientError> for AppError {
    fn from(err: IngredientError) -> Self {
        match err {
            IngredientError::DbErr(e) => AppError::DatabaseError(e.to_string()),
            IngredientError::NotFound(_) => AppError::NotFound("Ingredient not found.".to_string()),
        }
    }
}
