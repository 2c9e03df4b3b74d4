//! Recipe persistence.
//!
//! Recipes are always looked up together with the caller's `user_id`, so a
//! recipe owned by someone else is indistinguishable from a missing one.
//! Tag and ingredient identifiers are resolved against the caller's own
//! records only, and the recipe row and its link rows are written in one
//! transaction.

use std::collections::{BTreeSet, HashMap, HashSet};

use sea_orm::sea_query::{Expr, Query};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbConn, DbErr, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use tracing::info;

use crate::db::entities::{
    ingredient,
    prelude::{Ingredient, Recipe, RecipeIngredient, RecipeTag, Tag},
    recipe, recipe_ingredient, recipe_tag, tag,
};

#[derive(Debug, thiserror::Error)]
pub enum RecipeError {
    #[error("Database error: {0}")]
    DbErr(#[from] DbErr),
    #[error("Recipe not found: {0}")]
    NotFound(i32),
    #[error("Tag does not exist: {0}")]
    UnknownTag(i32),
    #[error("Ingredient does not exist: {0}")]
    UnknownIngredient(i32),
}

/// Validated input for a new recipe.
#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub title: String,
    pub time_minutes: i32,
    pub price: f64,
    pub link: String,
    pub tag_ids: Vec<i32>,
    pub ingredient_ids: Vec<i32>,
}

/// Validated changes for an existing recipe. `None` leaves the stored value
/// alone; a `Some` id list replaces the whole set.
#[derive(Debug, Clone, Default)]
pub struct RecipeChanges {
    pub title: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<f64>,
    pub link: Option<String>,
    pub tag_ids: Option<Vec<i32>>,
    pub ingredient_ids: Option<Vec<i32>>,
}

/// Narrows a recipe listing. A recipe matches a non-empty id list when it
/// references any of the ids; the two lists are combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub tag_ids: Vec<i32>,
    pub ingredient_ids: Vec<i32>,
}

/// A recipe with its related records referenced by id, ascending.
#[derive(Debug, Clone)]
pub struct RecipeWithLinks {
    pub recipe: recipe::Model,
    pub tag_ids: Vec<i32>,
    pub ingredient_ids: Vec<i32>,
}

/// A recipe with its related records loaded in full, ordered by id.
#[derive(Debug, Clone)]
pub struct RecipeDetail {
    pub recipe: recipe::Model,
    pub tags: Vec<tag::Model>,
    pub ingredients: Vec<ingredient::Model>,
}

pub struct RecipeService;

impl RecipeService {
    pub async fn create_recipe(
        db: &DbConn,
        user_id: i32,
        new_recipe: NewRecipe,
    ) -> Result<RecipeWithLinks, RecipeError> {
        let tag_ids = dedup(new_recipe.tag_ids);
        let ingredient_ids = dedup(new_recipe.ingredient_ids);

        let txn = db.begin().await?;

        ensure_owned_tags(&txn, user_id, &tag_ids).await?;
        ensure_owned_ingredients(&txn, user_id, &ingredient_ids).await?;

        let saved = recipe::ActiveModel {
            user_id: Set(user_id),
            title: Set(new_recipe.title),
            time_minutes: Set(new_recipe.time_minutes),
            price: Set(new_recipe.price),
            link: Set(new_recipe.link),
            image: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        replace_tags(&txn, saved.id, &tag_ids).await?;
        replace_ingredients(&txn, saved.id, &ingredient_ids).await?;

        txn.commit().await?;

        info!(user_id, recipe_id = saved.id, "Recipe created.");
        Ok(RecipeWithLinks {
            recipe: saved,
            tag_ids,
            ingredient_ids,
        })
    }

    pub async fn list_recipes(
        db: &DbConn,
        user_id: i32,
        filter: &RecipeFilter,
    ) -> Result<Vec<RecipeWithLinks>, RecipeError> {
        let mut query = Recipe::find().filter(recipe::Column::UserId.eq(user_id));

        if !filter.tag_ids.is_empty() {
            query = query.filter(
                recipe::Column::Id.in_subquery(
                    Query::select()
                        .column(recipe_tag::Column::RecipeId)
                        .from(recipe_tag::Entity)
                        .and_where(recipe_tag::Column::TagId.is_in(filter.tag_ids.clone()))
                        .to_owned(),
                ),
            );
        }

        if !filter.ingredient_ids.is_empty() {
            query = query.filter(
                recipe::Column::Id.in_subquery(
                    Query::select()
                        .column(recipe_ingredient::Column::RecipeId)
                        .from(recipe_ingredient::Entity)
                        .and_where(
                            recipe_ingredient::Column::IngredientId
                                .is_in(filter.ingredient_ids.clone()),
                        )
                        .to_owned(),
                ),
            );
        }

        let recipes = query.order_by_desc(recipe::Column::Id).all(db).await?;
        if recipes.is_empty() {
            return Ok(Vec::new());
        }

        let recipe_ids: Vec<i32> = recipes.iter().map(|r| r.id).collect();

        let tag_links = RecipeTag::find()
            .filter(recipe_tag::Column::RecipeId.is_in(recipe_ids.clone()))
            .all(db)
            .await?;
        let ingredient_links = RecipeIngredient::find()
            .filter(recipe_ingredient::Column::RecipeId.is_in(recipe_ids))
            .all(db)
            .await?;

        let mut tag_map: HashMap<i32, Vec<i32>> = HashMap::new();
        for link in tag_links {
            tag_map.entry(link.recipe_id).or_default().push(link.tag_id);
        }

        let mut ingredient_map: HashMap<i32, Vec<i32>> = HashMap::new();
        for link in ingredient_links {
            ingredient_map
                .entry(link.recipe_id)
                .or_default()
                .push(link.ingredient_id);
        }

        Ok(recipes
            .into_iter()
            .map(|recipe| {
                let mut tag_ids = tag_map.remove(&recipe.id).unwrap_or_default();
                let mut ingredient_ids = ingredient_map.remove(&recipe.id).unwrap_or_default();
                tag_ids.sort_unstable();
                ingredient_ids.sort_unstable();
                RecipeWithLinks {
                    recipe,
                    tag_ids,
                    ingredient_ids,
                }
            })
            .collect())
    }

    pub async fn get_recipe(
        db: &DbConn,
        recipe_id: i32,
        user_id: i32,
    ) -> Result<recipe::Model, RecipeError> {
        find_owned(db, recipe_id, user_id).await
    }

    pub async fn get_recipe_detail(
        db: &DbConn,
        recipe_id: i32,
        user_id: i32,
    ) -> Result<RecipeDetail, RecipeError> {
        let recipe = find_owned(db, recipe_id, user_id).await?;

        let tags = recipe
            .find_related(Tag)
            .order_by_asc(tag::Column::Id)
            .all(db)
            .await?;
        let ingredients = recipe
            .find_related(Ingredient)
            .order_by_asc(ingredient::Column::Id)
            .all(db)
            .await?;

        Ok(RecipeDetail {
            recipe,
            tags,
            ingredients,
        })
    }

    pub async fn update_recipe(
        db: &DbConn,
        recipe_id: i32,
        user_id: i32,
        changes: RecipeChanges,
    ) -> Result<RecipeWithLinks, RecipeError> {
        let txn = db.begin().await?;

        let existing = find_owned(&txn, recipe_id, user_id).await?;

        let tag_ids = changes.tag_ids.map(dedup);
        let ingredient_ids = changes.ingredient_ids.map(dedup);
        if let Some(ids) = &tag_ids {
            ensure_owned_tags(&txn, user_id, ids).await?;
        }
        if let Some(ids) = &ingredient_ids {
            ensure_owned_ingredients(&txn, user_id, ids).await?;
        }

        let mut active_recipe: recipe::ActiveModel = existing.clone().into();
        if let Some(title) = changes.title {
            active_recipe.title = Set(title);
        }
        if let Some(time_minutes) = changes.time_minutes {
            active_recipe.time_minutes = Set(time_minutes);
        }
        if let Some(price) = changes.price {
            active_recipe.price = Set(price);
        }
        if let Some(link) = changes.link {
            active_recipe.link = Set(link);
        }
        let updated = if active_recipe.is_changed() {
            active_recipe.update(&txn).await?
        } else {
            existing
        };

        if let Some(ids) = &tag_ids {
            replace_tags(&txn, recipe_id, ids).await?;
        }
        if let Some(ids) = &ingredient_ids {
            replace_ingredients(&txn, recipe_id, ids).await?;
        }

        let tag_ids = match tag_ids {
            Some(ids) => ids,
            None => linked_tag_ids(&txn, recipe_id).await?,
        };
        let ingredient_ids = match ingredient_ids {
            Some(ids) => ids,
            None => linked_ingredient_ids(&txn, recipe_id).await?,
        };

        txn.commit().await?;

        info!(user_id, recipe_id, "Recipe updated.");
        Ok(RecipeWithLinks {
            recipe: updated,
            tag_ids,
            ingredient_ids,
        })
    }

    /// Deletes the recipe and returns the removed row so the caller can clean
    /// up its stored image.
    pub async fn delete_recipe(
        db: &DbConn,
        recipe_id: i32,
        user_id: i32,
    ) -> Result<recipe::Model, RecipeError> {
        let existing = find_owned(db, recipe_id, user_id).await?;
        existing.clone().delete(db).await?;
        info!(user_id, recipe_id, "Recipe deleted.");
        Ok(existing)
    }

    /// Points the recipe at a stored image path and returns the updated row
    /// with the path it replaced. The swap only succeeds against the image
    /// value that was read, so concurrent uploads each get back a distinct
    /// replaced path.
    pub async fn set_recipe_image(
        db: &DbConn,
        recipe_id: i32,
        user_id: i32,
        image_path: String,
    ) -> Result<(recipe::Model, Option<String>), RecipeError> {
        loop {
            let existing = find_owned(db, recipe_id, user_id).await?;
            let previous = existing.image.clone();

            let current_image = match &previous {
                Some(path) => recipe::Column::Image.eq(path.clone()),
                None => recipe::Column::Image.is_null(),
            };
            let result = Recipe::update_many()
                .col_expr(recipe::Column::Image, Expr::value(image_path.clone()))
                .filter(recipe::Column::Id.eq(recipe_id))
                .filter(recipe::Column::UserId.eq(user_id))
                .filter(current_image)
                .exec(db)
                .await?;

            if result.rows_affected == 1 {
                info!(user_id, recipe_id, "Recipe image updated.");
                let updated = recipe::Model {
                    image: Some(image_path),
                    ..existing
                };
                return Ok((updated, previous));
            }
        }
    }
}

async fn find_owned<C>(conn: &C, recipe_id: i32, user_id: i32) -> Result<recipe::Model, RecipeError>
where
    C: ConnectionTrait,
{
    Recipe::find_by_id(recipe_id)
        .filter(recipe::Column::UserId.eq(user_id))
        .one(conn)
        .await?
        .ok_or(RecipeError::NotFound(recipe_id))
}

fn dedup(ids: Vec<i32>) -> Vec<i32> {
    ids.into_iter().collect::<BTreeSet<_>>().into_iter().collect()
}

async fn ensure_owned_tags<C>(conn: &C, user_id: i32, tag_ids: &[i32]) -> Result<(), RecipeError>
where
    C: ConnectionTrait,
{
    if tag_ids.is_empty() {
        return Ok(());
    }

    let found: HashSet<i32> = Tag::find()
        .filter(tag::Column::UserId.eq(user_id))
        .filter(tag::Column::Id.is_in(tag_ids.to_vec()))
        .all(conn)
        .await?
        .into_iter()
        .map(|t| t.id)
        .collect();

    match tag_ids.iter().find(|id| !found.contains(id)) {
        Some(missing) => Err(RecipeError::UnknownTag(*missing)),
        None => Ok(()),
    }
}

async fn ensure_owned_ingredients<C>(
    conn: &C,
    user_id: i32,
    ingredient_ids: &[i32],
) -> Result<(), RecipeError>
where
    C: ConnectionTrait,
{
    if ingredient_ids.is_empty() {
        return Ok(());
    }

    let found: HashSet<i32> = Ingredient::find()
        .filter(ingredient::Column::UserId.eq(user_id))
        .filter(ingredient::Column::Id.is_in(ingredient_ids.to_vec()))
        .all(conn)
        .await?
        .into_iter()
        .map(|i| i.id)
        .collect();

    match ingredient_ids.iter().find(|id| !found.contains(id)) {
        Some(missing) => Err(RecipeError::UnknownIngredient(*missing)),
        None => Ok(()),
    }
}

// Composite-key link rows have no single last-insert id, so they are written
// with `exec_without_returning`.
async fn replace_tags<C>(conn: &C, recipe_id: i32, tag_ids: &[i32]) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    RecipeTag::delete_many()
        .filter(recipe_tag::Column::RecipeId.eq(recipe_id))
        .exec(conn)
        .await?;

    if !tag_ids.is_empty() {
        let links = tag_ids.iter().map(|&tag_id| recipe_tag::ActiveModel {
            recipe_id: Set(recipe_id),
            tag_id: Set(tag_id),
        });
        RecipeTag::insert_many(links).exec_without_returning(conn).await?;
    }
    Ok(())
}

async fn replace_ingredients<C>(
    conn: &C,
    recipe_id: i32,
    ingredient_ids: &[i32],
) -> Result<(), DbErr>
where
    C: ConnectionTrait,
{
    RecipeIngredient::delete_many()
        .filter(recipe_ingredient::Column::RecipeId.eq(recipe_id))
        .exec(conn)
        .await?;

    if !ingredient_ids.is_empty() {
        let links = ingredient_ids
            .iter()
            .map(|&ingredient_id| recipe_ingredient::ActiveModel {
                recipe_id: Set(recipe_id),
                ingredient_id: Set(ingredient_id),
            });
        RecipeIngredient::insert_many(links)
            .exec_without_returning(conn)
            .await?;
    }
    Ok(())
}

async fn linked_tag_ids<C>(conn: &C, recipe_id: i32) -> Result<Vec<i32>, DbErr>
where
    C: ConnectionTrait,
{
    let mut ids: Vec<i32> = RecipeTag::find()
        .filter(recipe_tag::Column::RecipeId.eq(recipe_id))
        .all(conn)
        .await?
        .into_iter()
        .map(|link| link.tag_id)
        .collect();
    ids.sort_unstable();
    Ok(ids)
}

async fn linked_ingredient_ids<C>(conn: &C, recipe_id: i32) -> Result<Vec<i32>, DbErr>
where
    C: ConnectionTrait,
{
    let mut ids: Vec<i32> = RecipeIngredient::find()
        .filter(recipe_ingredient::Column::RecipeId.eq(recipe_id))
        .all(conn)
        .await?
        .into_iter()
        .map(|link| link.ingredient_id)
        .collect();
    ids.sort_unstable();
    Ok(ids)
}
