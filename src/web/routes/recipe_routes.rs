use axum::{
    extract::{multipart::MultipartRejection, Extension, Multipart, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;

use crate::db::services::{RecipeError, RecipeService};
use crate::services::image_service::{self, ImageError};
use crate::web::extract::{ApiJson, ApiPath};
use crate::web::models::recipe_models::{
    RecipeDetailResponse, RecipeFilterQuery, RecipeImageResponse, RecipePayload, RecipeResponse,
};
use crate::web::models::AuthenticatedUser;
use crate::web::{AppError, AppState};

// --- Route Handlers ---

async fn list_recipes_handler(
    Extension(user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<RecipeFilterQuery>,
) -> Result<Json<Vec<RecipeResponse>>, AppError> {
    let filter = query.into_filter()?;
    let recipes = RecipeService::list_recipes(&app_state.db_pool, user.id, &filter).await?;
    Ok(Json(recipes.into_iter().map(RecipeResponse::from).collect()))
}

async fn create_recipe_handler(
    Extension(user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<RecipePayload>,
) -> Result<(StatusCode, Json<RecipeResponse>), AppError> {
    let new_recipe = payload.into_new_recipe()?;
    let created = RecipeService::create_recipe(&app_state.db_pool, user.id, new_recipe).await?;
    Ok((StatusCode::CREATED, Json(created.into())))
}

async fn get_recipe_handler(
    Extension(user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    ApiPath(recipe_id): ApiPath<i32>,
) -> Result<Json<RecipeDetailResponse>, AppError> {
    let detail = RecipeService::get_recipe_detail(&app_state.db_pool, recipe_id, user.id).await?;
    Ok(Json(detail.into()))
}

async fn replace_recipe_handler(
    Extension(user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    ApiPath(recipe_id): ApiPath<i32>,
    ApiJson(payload): ApiJson<RecipePayload>,
) -> Result<Json<RecipeResponse>, AppError> {
    let changes = payload.into_replacement()?;
    let updated =
        RecipeService::update_recipe(&app_state.db_pool, recipe_id, user.id, changes).await?;
    Ok(Json(updated.into()))
}

async fn patch_recipe_handler(
    Extension(user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    ApiPath(recipe_id): ApiPath<i32>,
    ApiJson(payload): ApiJson<RecipePayload>,
) -> Result<Json<RecipeResponse>, AppError> {
    let changes = payload.into_changes()?;
    let updated =
        RecipeService::update_recipe(&app_state.db_pool, recipe_id, user.id, changes).await?;
    Ok(Json(updated.into()))
}

async fn delete_recipe_handler(
    Extension(user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    ApiPath(recipe_id): ApiPath<i32>,
) -> Result<StatusCode, AppError> {
    let deleted = RecipeService::delete_recipe(&app_state.db_pool, recipe_id, user.id).await?;
    if let Some(image) = deleted.image.as_deref() {
        image_service::remove_image(&PathBuf::from(&app_state.config.media_root), image).await;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// Accepts a multipart body with an `image` field. The recipe keeps its
/// previous image unless the new one validates, is stored and is recorded.
async fn upload_image_handler(
    Extension(user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    ApiPath(recipe_id): ApiPath<i32>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<RecipeImageResponse>, AppError> {
    // Ownership is checked before the body is read.
    RecipeService::get_recipe(&app_state.db_pool, recipe_id, user.id).await?;
    let mut multipart = multipart?;

    let mut image_bytes = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() == Some("image") {
            image_bytes = Some(field.bytes().await?.to_vec());
            break;
        }
    }
    let image_bytes = image_bytes.ok_or(ImageError::Missing)?;

    let media_root = PathBuf::from(&app_state.config.media_root);
    let stored = image_service::store_recipe_image(&media_root, image_bytes)
        .await
        .inspect_err(|e| warn!(user_id = user.id, recipe_id, error = %e, "Rejected recipe image upload."))?;

    let (updated, replaced) = match RecipeService::set_recipe_image(
        &app_state.db_pool,
        recipe_id,
        user.id,
        stored.clone(),
    )
    .await
    {
        Ok(swap) => swap,
        Err(e) => {
            image_service::remove_image(&media_root, &stored).await;
            return Err(e.into());
        }
    };

    if let Some(old_image) = replaced.as_deref() {
        if old_image != stored {
            image_service::remove_image(&media_root, old_image).await;
        }
    }

    Ok(Json(RecipeImageResponse::from_model(
        &updated,
        &app_state.config.media_url,
    )))
}

// --- Router ---

pub fn create_recipes_router() -> Router<Arc<AppState>> {
    let router = super::route_both(
        Router::new(),
        "/recipes",
        get(list_recipes_handler).post(create_recipe_handler),
    );
    let router = super::route_both(
        router,
        "/recipes/{recipe_id}",
        get(get_recipe_handler)
            .put(replace_recipe_handler)
            .patch(patch_recipe_handler)
            .delete(delete_recipe_handler),
    );
    super::route_both(router, "/recipes/{recipe_id}/image", post(upload_image_handler))
}

impl From<RecipeError> for AppError {
    fn from(err: RecipeError) -> Self {
        match err {
            RecipeError::DbErr(e) => AppError::DatabaseError(e.to_string()),
            RecipeError::NotFound(_) => AppError::NotFound("Recipe not found.".to_string()),
            RecipeError::UnknownTag(id) => AppError::InvalidInput(format!(
                "tags: Invalid pk \"{id}\" - object does not exist."
            )),
            RecipeError::UnknownIngredient(id) => AppError::InvalidInput(format!(
                "ingredients: Invalid pk \"{id}\" - object does not exist."
            )),
        }
    }
}

impl From<ImageError> for AppError {
    fn from(err: ImageError) -> Self {
        match err {
            ImageError::Missing | ImageError::Empty | ImageError::Invalid(_) => {
                AppError::InvalidInput(format!("image: {err}"))
            }
            ImageError::Io(_) | ImageError::Task(_) => AppError::InternalServerError(err.to_string()),
        }
    }
}
