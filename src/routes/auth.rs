use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::token_key;
use crate::services::auth as auth_service;
use crate::state::AppState;

use super::users::UserResponse;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub auth_token: String,
    pub user: UserResponse,
}

/// Exchange email + password for an opaque token
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let user = state
        .store
        .user_by_email(&request.email)
        .await?
        .filter(|user| auth_service::verify_password(&request.password, &user.password_hash))
        .ok_or_else(|| {
            AppError::InvalidInput("Unable to log in with provided credentials".to_string())
        })?;

    let key = auth_service::new_token_key();
    state.store.insert_token(&key, user.id).await?;

    tracing::info!(user_id = user.id, "token issued");

    Ok(Json(LoginResponse {
        auth_token: key,
        user: UserResponse::new(&user, false),
    }))
}

/// Revoke the token presented in the Authorization header
pub async fn logout(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> AppResult<StatusCode> {
    let key = token_key(&headers).ok_or_else(|| {
        AppError::Unauthorized("Authentication credentials were not provided".to_string())
    })?;

    if !state.store.delete_token(key).await? {
        return Err(AppError::Unauthorized("Invalid token".to_string()));
    }

    Ok(StatusCode::NO_CONTENT)
}
