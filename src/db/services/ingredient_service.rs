use sea_orm::sea_query::Query;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbConn, DbErr, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use tracing::info;

use crate::db::entities::{ingredient, prelude::Ingredient, recipe_ingredient};

#[derive(Debug, thiserror::Error)]
pub enum IngredientError {
    #[error("Database error: {0}")]
    DbErr(#[from] DbErr),
    #[error("Ingredient not found: {0}")]
    NotFound(i32),
}

pub struct IngredientService;

impl IngredientService {
    pub async fn create_ingredient(
        db: &DbConn,
        user_id: i32,
        name: String,
    ) -> Result<ingredient::Model, IngredientError> {
        let new_ingredient = ingredient::ActiveModel {
            user_id: Set(user_id),
            name: Set(name),
            ..Default::default()
        };

        let saved = new_ingredient.insert(db).await?;
        info!(user_id, ingredient_id = saved.id, "Ingredient created.");
        Ok(saved)
    }

    pub async fn list_ingredients(
        db: &DbConn,
        user_id: i32,
        assigned_only: bool,
    ) -> Result<Vec<ingredient::Model>, IngredientError> {
        let mut query = Ingredient::find().filter(ingredient::Column::UserId.eq(user_id));

        if assigned_only {
            query = query.filter(
                ingredient::Column::Id.in_subquery(
                    Query::select()
                        .column(recipe_ingredient::Column::IngredientId)
                        .from(recipe_ingredient::Entity)
                        .to_owned(),
                ),
            );
        }

        Ok(query.order_by_desc(ingredient::Column::Name).all(db).await?)
    }

    pub async fn get_ingredient(
        db: &DbConn,
        ingredient_id: i32,
        user_id: i32,
    ) -> Result<ingredient::Model, IngredientError> {
        Ingredient::find_by_id(ingredient_id)
            .filter(ingredient::Column::UserId.eq(user_id))
            .one(db)
            .await?
            .ok_or(IngredientError::NotFound(ingredient_id))
    }

    pub async fn update_ingredient(
        db: &DbConn,
        ingredient_id: i32,
        user_id: i32,
        name: String,
    ) -> Result<ingredient::Model, IngredientError> {
        let existing = Self::get_ingredient(db, ingredient_id, user_id).await?;

        let mut active_ingredient: ingredient::ActiveModel = existing.into();
        active_ingredient.name = Set(name);

        Ok(active_ingredient.update(db).await?)
    }

    pub async fn delete_ingredient(
        db: &DbConn,
        ingredient_id: i32,
        user_id: i32,
    ) -> Result<(), IngredientError> {
        let existing = Self::get_ingredient(db, ingredient_id, user_id).await?;
        existing.delete(db).await?;
        info!(user_id, ingredient_id, "Ingredient deleted.");
        Ok(())
    }
}
