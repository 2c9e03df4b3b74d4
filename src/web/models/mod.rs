use serde::{Deserialize, Deserializer, Serialize};

use crate::web::error::AppError;

pub mod recipe_models;
pub mod tag_models;

/// Longest `name`, `title` and `link` accepted.
pub const MAX_TEXT_LEN: usize = 255;

// JWT Claims structure, as issued by the identity provider
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // username
    pub user_id: i32,
    pub exp: usize, // Expiration time (timestamp)
}

/// Struct to hold authenticated user details, to be passed as a request extension.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub id: i32,
    pub username: String,
}

/// Query string accepted by the tag and ingredient list endpoints.
#[derive(Debug, Default, Deserialize)]
pub struct AssignedQuery {
    pub assigned_only: Option<String>,
}

impl AssignedQuery {
    pub fn assigned_only(&self) -> Result<bool, AppError> {
        match self.assigned_only.as_deref().map(str::trim) {
            None | Some("") | Some("0") | Some("false") => Ok(false),
            Some("1") | Some("true") => Ok(true),
            Some(other) => Err(AppError::InvalidInput(format!(
                "assigned_only: expected 0 or 1, got \"{other}\"."
            ))),
        }
    }
}

/// `deserialize_with` target for payload keys where an explicit `null` must
/// be told apart from an absent key. Pair it with `#[serde(default)]`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Rejects a key that was sent as `null`; an absent key stays `None`.
pub fn not_null<T>(field: &str, value: Option<Option<T>>) -> Result<Option<T>, AppError> {
    match value {
        Some(None) => Err(AppError::InvalidInput(format!(
            "{field}: This field may not be null."
        ))),
        Some(Some(v)) => Ok(Some(v)),
        None => Ok(None),
    }
}

/// Trims a required text field and enforces the length limit.
pub fn required_text(field: &str, value: Option<String>) -> Result<String, AppError> {
    let value = value
        .map(|v| v.trim().to_string())
        .ok_or_else(|| AppError::InvalidInput(format!("{field}: This field is required.")))?;
    if value.is_empty() {
        return Err(AppError::InvalidInput(format!(
            "{field}: This field may not be blank."
        )));
    }
    check_length(field, value)
}

/// Like [`required_text`] but allows blank values.
pub fn optional_text(field: &str, value: String) -> Result<String, AppError> {
    check_length(field, value.trim().to_string())
}

fn check_length(field: &str, value: String) -> Result<String, AppError> {
    if value.chars().count() > MAX_TEXT_LEN {
        return Err(AppError::InvalidInput(format!(
            "{field}: Ensure this field has no more than {MAX_TEXT_LEN} characters."
        )));
    }
    Ok(value)
}
