use axum::{
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};

use crate::error::AppError;
use crate::models::User;
use crate::state::AppState;

/// Extractor for endpoints that require an authenticated caller.
/// Rejects with 401 when the token header is missing or unknown.
pub struct CurrentUser(pub User);

/// Extractor for endpoints that behave differently for anonymous callers.
/// A missing header yields `None`; a present but invalid token is still 401.
pub struct OptionalUser(pub Option<User>);

/// Pulls the opaque key out of an `Authorization` header.
/// Both `Token <key>` and `Bearer <key>` schemes are accepted.
pub fn token_key(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    value
        .strip_prefix("Token ")
        .or_else(|| value.strip_prefix("Bearer "))
        .map(str::trim)
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let key = token_key(&parts.headers).ok_or_else(|| {
            AppError::Unauthorized("Authentication credentials were not provided".to_string())
        })?;

        let user = state
            .store
            .user_for_token(key)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid token".to_string()))?;

        Ok(CurrentUser(user))
    }
}

#[axum::async_trait]
impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let Some(key) = token_key(&parts.headers) else {
            return Ok(OptionalUser(None));
        };

        let user = state
            .store
            .user_for_token(key)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Invalid token".to_string()))?;

        Ok(OptionalUser(Some(user)))
    }
}
