//! Ownership-scoped data access for each entity. Every query takes the
//! caller's `user_id`; records owned by someone else behave as if absent.

pub mod ingredient_service;
pub mod recipe_service;
pub mod tag_service;

pub use ingredient_service::{IngredientError, IngredientService};
pub use recipe_service::{
    NewRecipe, RecipeChanges, RecipeDetail, RecipeError, RecipeFilter, RecipeService,
    RecipeWithLinks,
};
pub use tag_service::{TagError, TagService};
