use serde::{Deserialize, Serialize};

use crate::db::entities::recipe;
use crate::db::services::{NewRecipe, RecipeChanges, RecipeDetail, RecipeFilter, RecipeWithLinks};
use crate::services::image_service;
use crate::web::error::AppError;
use crate::web::models::tag_models::{IngredientResponse, TagResponse};
use crate::web::models::{not_null, nullable, optional_text, required_text};

/// Largest price accepted: five digits, two of them decimals.
const MAX_PRICE: f64 = 999.99;

/// Recipe with tags and ingredients referenced by id. Used for listings and
/// as the response to writes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeResponse {
    pub id: i32,
    pub title: String,
    pub time_minutes: i32,
    pub price: f64,
    pub link: String,
    pub tags: Vec<i32>,
    pub ingredients: Vec<i32>,
}

impl From<RecipeWithLinks> for RecipeResponse {
    fn from(value: RecipeWithLinks) -> Self {
        let recipe = value.recipe;
        RecipeResponse {
            id: recipe.id,
            title: recipe.title,
            time_minutes: recipe.time_minutes,
            price: recipe.price,
            link: recipe.link,
            tags: value.tag_ids,
            ingredients: value.ingredient_ids,
        }
    }
}

/// Recipe with tags and ingredients embedded in full. Read-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeDetailResponse {
    pub id: i32,
    pub title: String,
    pub time_minutes: i32,
    pub price: f64,
    pub link: String,
    pub tags: Vec<TagResponse>,
    pub ingredients: Vec<IngredientResponse>,
}

impl From<RecipeDetail> for RecipeDetailResponse {
    fn from(value: RecipeDetail) -> Self {
        let recipe = value.recipe;
        RecipeDetailResponse {
            id: recipe.id,
            title: recipe.title,
            time_minutes: recipe.time_minutes,
            price: recipe.price,
            link: recipe.link,
            tags: value.tags.into_iter().map(TagResponse::from).collect(),
            ingredients: value
                .ingredients
                .into_iter()
                .map(IngredientResponse::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeImageResponse {
    pub id: i32,
    pub image: Option<String>,
}

impl RecipeImageResponse {
    pub fn from_model(model: &recipe::Model, media_url: &str) -> Self {
        RecipeImageResponse {
            id: model.id,
            image: model
                .image
                .as_deref()
                .map(|path| image_service::image_url(media_url, path)),
        }
    }
}

/// Recipe write payload. Every key is optional at the wire level; which ones
/// are required depends on whether the request creates, replaces or patches.
/// No key may be sent as `null`.
#[derive(Debug, Default, Deserialize)]
pub struct RecipePayload {
    #[serde(default, deserialize_with = "nullable")]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub time_minutes: Option<Option<i32>>,
    #[serde(default, deserialize_with = "nullable")]
    pub price: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub link: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub tags: Option<Option<Vec<i32>>>,
    #[serde(default, deserialize_with = "nullable")]
    pub ingredients: Option<Option<Vec<i32>>>,
}

/// Keys actually supplied in a [`RecipePayload`].
struct Supplied {
    title: Option<String>,
    time_minutes: Option<i32>,
    price: Option<f64>,
    link: Option<String>,
    tags: Option<Vec<i32>>,
    ingredients: Option<Vec<i32>>,
}

impl RecipePayload {
    fn supplied(self) -> Result<Supplied, AppError> {
        Ok(Supplied {
            title: not_null("title", self.title)?,
            time_minutes: not_null("time_minutes", self.time_minutes)?,
            price: not_null("price", self.price)?,
            link: not_null("link", self.link)?,
            tags: not_null("tags", self.tags)?,
            ingredients: not_null("ingredients", self.ingredients)?,
        })
    }

    /// POST: title, time and price are required.
    pub fn into_new_recipe(self) -> Result<NewRecipe, AppError> {
        let fields = self.supplied()?;
        Ok(NewRecipe {
            title: required_text("title", fields.title)?,
            time_minutes: validate_time(required("time_minutes", fields.time_minutes)?)?,
            price: validate_price(required("price", fields.price)?)?,
            link: optional_text("link", fields.link.unwrap_or_default())?,
            tag_ids: fields.tags.unwrap_or_default(),
            ingredient_ids: fields.ingredients.unwrap_or_default(),
        })
    }

    /// PUT: same requirements as create; omitted optional keys reset.
    pub fn into_replacement(self) -> Result<RecipeChanges, AppError> {
        let replacement = self.into_new_recipe()?;
        Ok(RecipeChanges {
            title: Some(replacement.title),
            time_minutes: Some(replacement.time_minutes),
            price: Some(replacement.price),
            link: Some(replacement.link),
            tag_ids: Some(replacement.tag_ids),
            ingredient_ids: Some(replacement.ingredient_ids),
        })
    }

    /// PATCH: only supplied keys change.
    pub fn into_changes(self) -> Result<RecipeChanges, AppError> {
        let fields = self.supplied()?;
        Ok(RecipeChanges {
            title: fields
                .title
                .map(|title| required_text("title", Some(title)))
                .transpose()?,
            time_minutes: fields.time_minutes.map(validate_time).transpose()?,
            price: fields.price.map(validate_price).transpose()?,
            link: fields.link.map(|link| optional_text("link", link)).transpose()?,
            tag_ids: fields.tags,
            ingredient_ids: fields.ingredients,
        })
    }
}

fn required<T>(field: &str, value: Option<T>) -> Result<T, AppError> {
    value.ok_or_else(|| AppError::InvalidInput(format!("{field}: This field is required.")))
}

fn validate_time(minutes: i32) -> Result<i32, AppError> {
    if minutes < 0 {
        return Err(AppError::InvalidInput(
            "time_minutes: Ensure this value is greater than or equal to 0.".to_string(),
        ));
    }
    Ok(minutes)
}

fn validate_price(price: f64) -> Result<f64, AppError> {
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::InvalidInput(
            "price: A valid non-negative number is required.".to_string(),
        ));
    }
    let cents = (price * 100.0).round();
    if (cents - price * 100.0).abs() > 1e-6 {
        return Err(AppError::InvalidInput(
            "price: Ensure that there are no more than 2 decimal places.".to_string(),
        ));
    }
    if price > MAX_PRICE {
        return Err(AppError::InvalidInput(
            "price: Ensure that there are no more than 5 digits in total.".to_string(),
        ));
    }
    Ok(cents / 100.0)
}

/// Query string accepted by the recipe list endpoint, e.g.
/// `?tags=1,2&ingredients=3`.
#[derive(Debug, Default, Deserialize)]
pub struct RecipeFilterQuery {
    pub tags: Option<String>,
    pub ingredients: Option<String>,
}

impl RecipeFilterQuery {
    pub fn into_filter(self) -> Result<RecipeFilter, AppError> {
        Ok(RecipeFilter {
            tag_ids: parse_id_list("tags", self.tags.as_deref())?,
            ingredient_ids: parse_id_list("ingredients", self.ingredients.as_deref())?,
        })
    }
}

fn parse_id_list(field: &str, raw: Option<&str>) -> Result<Vec<i32>, AppError> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<i32>().map_err(|_| {
                AppError::InvalidInput(format!("{field}: \"{part}\" is not a valid id."))
            })
        })
        .collect()
}
