use serde::{Deserialize, Serialize};

use crate::db::entities::{ingredient, tag};
use crate::web::error::AppError;
use crate::web::models::{not_null, nullable};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagResponse {
    pub id: i32,
    pub name: String,
}

impl From<tag::Model> for TagResponse {
    fn from(model: tag::Model) -> Self {
        TagResponse {
            id: model.id,
            name: model.name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngredientResponse {
    pub id: i32,
    pub name: String,
}

impl From<ingredient::Model> for IngredientResponse {
    fn from(model: ingredient::Model) -> Self {
        IngredientResponse {
            id: model.id,
            name: model.name,
        }
    }
}

/// Write payload shared by tags and ingredients. `id` and any owner key in
/// the body are ignored.
#[derive(Debug, Default, Deserialize)]
pub struct NamePayload {
    #[serde(default, deserialize_with = "nullable")]
    pub name: Option<Option<String>>,
}

impl NamePayload {
    /// The supplied `name`, or `None` when the key is absent.
    pub fn into_name(self) -> Result<Option<String>, AppError> {
        not_null("name", self.name)
    }
}
