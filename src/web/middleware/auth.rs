use axum::{
    body::Body as AxumBody,
    extract::State,
    http::{header, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, DecodingKey, Validation};
use std::sync::Arc;
use tracing::warn;

use crate::web::models::{AuthenticatedUser, Claims};
use crate::web::{error::AppError, AppState};

/// Cookie read when the request carries no `Authorization` header.
pub const TOKEN_COOKIE: &str = "token";

/// Bearer token from the `Authorization` header, else the token cookie.
fn request_token(headers: &HeaderMap, jar: &CookieJar) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    match bearer {
        Some(token) => Some(token.to_string()),
        None => jar.get(TOKEN_COOKIE).map(|cookie| cookie.value().to_string()),
    }
}

/// Verifies the caller's JWT and stores an [`AuthenticatedUser`] in the
/// request extensions. Tokens are issued by the identity provider and signed
/// with the shared `jwt_secret`.
pub async fn auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut req: Request<AxumBody>,
    next: Next,
) -> Result<Response, AppError> {
    let token = request_token(req.headers(), &jar).ok_or_else(|| {
        AppError::Unauthorized("Authentication credentials were not provided.".to_string())
    })?;

    let key = DecodingKey::from_secret(state.config.jwt_secret.as_bytes());
    let claims = decode::<Claims>(&token, &key, &Validation::default())
        .map_err(|e| {
            warn!(error = ?e, path = %req.uri().path(), "Rejected recipe API token.");
            AppError::InvalidCredentials
        })?
        .claims;

    req.extensions_mut().insert(AuthenticatedUser {
        id: claims.user_id,
        username: claims.sub,
    });
    Ok(next.run(req).await)
}
