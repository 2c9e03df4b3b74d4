use axum::extract::{FromRequest, FromRequestParts};

use crate::web::error::AppError;

/// `axum::Json` whose rejections render as a 400 `AppError` body instead of
/// axum's plain-text 415/422 responses.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Path` whose rejections render as a 404 `AppError` body. An
/// id that cannot name a record is treated like one that names nobody's.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);
