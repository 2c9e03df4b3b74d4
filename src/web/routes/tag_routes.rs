use axum::{
    extract::{Extension, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use crate::db::services::{TagError, TagService};
use crate::web::extract::{ApiJson, ApiPath};
use crate::web::models::tag_models::{NamePayload, TagResponse};
use crate::web::models::{required_text, AssignedQuery, AuthenticatedUser};
use crate::web::{AppError, AppState};

// --- Route Handlers ---

async fn list_tags_handler(
    Extension(user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    Query(query): Query<AssignedQuery>,
) -> Result<Json<Vec<TagResponse>>, AppError> {
    let tags = TagService::list_tags(&app_state.db_pool, user.id, query.assigned_only()?).await?;
    Ok(Json(tags.into_iter().map(TagResponse::from).collect()))
}

async fn create_tag_handler(
    Extension(user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    ApiJson(payload): ApiJson<NamePayload>,
) -> Result<(StatusCode, Json<TagResponse>), AppError> {
    let name = required_text("name", payload.into_name()?)?;
    let tag = TagService::create_tag(&app_state.db_pool, user.id, name).await?;
    Ok((StatusCode::CREATED, Json(tag.into())))
}

async fn get_tag_handler(
    Extension(user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    ApiPath(tag_id): ApiPath<i32>,
) -> Result<Json<TagResponse>, AppError> {
    let tag = TagService::get_tag(&app_state.db_pool, tag_id, user.id).await?;
    Ok(Json(tag.into()))
}

async fn update_tag_handler(
    Extension(user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    ApiPath(tag_id): ApiPath<i32>,
    ApiJson(payload): ApiJson<NamePayload>,
) -> Result<Json<TagResponse>, AppError> {
    let name = required_text("name", payload.into_name()?)?;
    let tag = TagService::update_tag(&app_state.db_pool, tag_id, user.id, name).await?;
    Ok(Json(tag.into()))
}

/// PATCH without `name` returns the tag unchanged.
async fn patch_tag_handler(
    Extension(user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    ApiPath(tag_id): ApiPath<i32>,
    ApiJson(payload): ApiJson<NamePayload>,
) -> Result<Json<TagResponse>, AppError> {
    let tag = match payload.into_name()? {
        Some(name) => {
            let name = required_text("name", Some(name))?;
            TagService::update_tag(&app_state.db_pool, tag_id, user.id, name).await?
        }
        None => TagService::get_tag(&app_state.db_pool, tag_id, user.id).await?,
    };
    Ok(Json(tag.into()))
}

async fn delete_tag_handler(
    Extension(user): Extension<AuthenticatedUser>,
    State(app_state): State<Arc<AppState>>,
    ApiPath(tag_id): ApiPath<i32>,
) -> Result<StatusCode, AppError> {
    TagService::delete_tag(&app_state.db_pool, tag_id, user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// --- Router ---

pub fn create_tags_router() -> Router<Arc<AppState>> {
    let router = super::route_both(
        Router::new(),
        "/tags",
        get(list_tags_handler).post(create_tag_handler),
    );
    super::route_both(
        router,
        "/tags/{tag_id}",
        get(get_tag_handler)
            .put(update_tag_handler)
            .patch(patch_tag_handler)
            .delete(delete_tag_handler),
    )
}

impl From<TagError> for AppError {
    fn from(err: TagError) -> Self {
        match err {
            TagError::DbErr(e) => AppError::DatabaseError(e.to_string()),
            TagError::NotFound(_) => AppError::NotFound("Tag not found.".to_string()),
        }
    }
}
