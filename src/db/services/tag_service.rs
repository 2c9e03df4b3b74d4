use sea_orm::sea_query::Query;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbConn, DbErr, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use tracing::info;

use crate::db::entities::{prelude::Tag, recipe_tag, tag};

#[derive(Debug, thiserror::Error)]
pub enum TagError {
    #[error("Database error: {0}")]
    DbErr(#[from] DbErr),
    #[error("Tag not found: {0}")]
    NotFound(i32),
}

pub struct TagService;

impl TagService {
    pub async fn create_tag(db: &DbConn, user_id: i32, name: String) -> Result<tag::Model, TagError> {
        let new_tag = tag::ActiveModel {
            user_id: Set(user_id),
            name: Set(name),
            ..Default::default()
        };

        let saved = new_tag.insert(db).await?;
        info!(user_id, tag_id = saved.id, "Tag created.");
        Ok(saved)
    }

    /// Lists the caller's tags, name descending. With `assigned_only` the
    /// result is narrowed to tags linked to at least one recipe.
    pub async fn list_tags(
        db: &DbConn,
        user_id: i32,
        assigned_only: bool,
    ) -> Result<Vec<tag::Model>, TagError> {
        let mut query = Tag::find().filter(tag::Column::UserId.eq(user_id));

        if assigned_only {
            query = query.filter(
                tag::Column::Id.in_subquery(
                    Query::select()
                        .column(recipe_tag::Column::TagId)
                        .from(recipe_tag::Entity)
                        .to_owned(),
                ),
            );
        }

        Ok(query.order_by_desc(tag::Column::Name).all(db).await?)
    }

    pub async fn get_tag(db: &DbConn, tag_id: i32, user_id: i32) -> Result<tag::Model, TagError> {
        Tag::find_by_id(tag_id)
            .filter(tag::Column::UserId.eq(user_id))
            .one(db)
            .await?
            .ok_or(TagError::NotFound(tag_id))
    }

    pub async fn update_tag(
        db: &DbConn,
        tag_id: i32,
        user_id: i32,
        name: String,
    ) -> Result<tag::Model, TagError> {
        let existing = Self::get_tag(db, tag_id, user_id).await?;

        let mut active_tag: tag::ActiveModel = existing.into();
        active_tag.name = Set(name);

        Ok(active_tag.update(db).await?)
    }

    /// Deletes the tag. Its recipe links go with it through the cascade.
    pub async fn delete_tag(db: &DbConn, tag_id: i32, user_id: i32) -> Result<(), TagError> {
        let existing = Self::get_tag(db, tag_id, user_id).await?;
        existing.delete(db).await?;
        info!(user_id, tag_id, "Tag deleted.");
        Ok(())
    }
}
