use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::{CurrentUser, OptionalUser};
use crate::models::{NewUser, User};
use crate::services::auth as auth_service;
use crate::state::AppState;
use crate::store::Store;

use super::recipes::RecipeShort;
use super::{PageQuery, Paginated};

/// Public profile shape returned for every user
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub avatar: Option<String>,
    pub is_subscribed: bool,
}

impl UserResponse {
    pub fn new(user: &User, is_subscribed: bool) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            avatar: user.avatar.clone(),
            is_subscribed,
        }
    }

    /// Profile as seen by `viewer` (anonymous viewers are never subscribed)
    pub async fn for_viewer(
        store: &dyn Store,
        user: &User,
        viewer: Option<&User>,
    ) -> AppResult<Self> {
        let is_subscribed = match viewer {
            Some(viewer) => store.is_following(viewer.id, user.id).await?,
            None => false,
        };
        Ok(Self::new(user, is_subscribed))
    }
}

/// A followed author together with their recipes
#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub recipes: Vec<RecipeShort>,
    pub recipes_count: usize,
}

impl SubscriptionResponse {
    async fn build(store: &dyn Store, author: &User) -> AppResult<Self> {
        let recipes: Vec<RecipeShort> = store
            .recipes_by_author(author.id)
            .await?
            .iter()
            .map(RecipeShort::from)
            .collect();
        Ok(Self {
            user: UserResponse::new(author, true),
            recipes_count: recipes.len(),
            recipes,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub password: String,
}

/// Register a new account
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<UserResponse>)> {
    if request.email.trim().is_empty() || !request.email.contains('@') {
        return Err(AppError::InvalidInput("A valid email is required".to_string()));
    }
    if request.username.trim().is_empty() {
        return Err(AppError::InvalidInput("A username is required".to_string()));
    }
    if request.password.len() < 8 {
        return Err(AppError::InvalidInput(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    if state.store.user_by_email(&request.email).await?.is_some() {
        return Err(AppError::InvalidInput(
            "A user with this email already exists".to_string(),
        ));
    }
    if state
        .store
        .user_by_username(&request.username)
        .await?
        .is_some()
    {
        return Err(AppError::InvalidInput(
            "A user with this username already exists".to_string(),
        ));
    }

    let password_hash = auth_service::hash_password(&request.password)?;
    let user = state
        .store
        .create_user(NewUser {
            email: request.email,
            username: request.username,
            first_name: request.first_name,
            last_name: request.last_name,
            password_hash,
        })
        .await?;

    tracing::info!(user_id = user.id, "user registered");

    Ok((StatusCode::CREATED, Json(UserResponse::new(&user, false))))
}

/// List all users, paginated
pub async fn list_users(
    State(state): State<AppState>,
    OptionalUser(viewer): OptionalUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Paginated<UserResponse>>> {
    let (count, users) = state.store.list_users(query.page()).await?;

    let mut results = Vec::with_capacity(users.len());
    for user in &users {
        results.push(UserResponse::for_viewer(&*state.store, user, viewer.as_ref()).await?);
    }

    Ok(Json(Paginated { count, results }))
}

/// Fetch one user's public profile
pub async fn get_user(
    State(state): State<AppState>,
    OptionalUser(viewer): OptionalUser,
    Path(id): Path<i64>,
) -> AppResult<Json<UserResponse>> {
    let user = state
        .store
        .user_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;

    Ok(Json(
        UserResponse::for_viewer(&*state.store, &user, viewer.as_ref()).await?,
    ))
}

/// The authenticated caller's own profile
pub async fn me(CurrentUser(user): CurrentUser) -> Json<UserResponse> {
    Json(UserResponse::new(&user, false))
}

#[derive(Debug, Deserialize, Serialize)]
pub struct AvatarRequest {
    pub avatar: String,
}

/// Set the caller's avatar
pub async fn set_avatar(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<AvatarRequest>,
) -> AppResult<Json<AvatarRequest>> {
    state
        .store
        .set_avatar(user.id, Some(&request.avatar))
        .await?;
    Ok(Json(request))
}

/// Clear the caller's avatar
pub async fn delete_avatar(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<StatusCode> {
    state.store.set_avatar(user.id, None).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct SetPasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Change the caller's password after verifying the current one
pub async fn set_password(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<SetPasswordRequest>,
) -> AppResult<StatusCode> {
    if !auth_service::verify_password(&request.current_password, &user.password_hash) {
        return Err(AppError::InvalidInput(
            "Current password is incorrect".to_string(),
        ));
    }
    if request.new_password.len() < 8 {
        return Err(AppError::InvalidInput(
            "Password must be at least 8 characters".to_string(),
        ));
    }

    let password_hash = auth_service::hash_password(&request.new_password)?;
    state
        .store
        .set_password_hash(user.id, &password_hash)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
}

/// Password reset stub: acknowledges known emails, no mail is sent
pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> AppResult<Json<serde_json::Value>> {
    if state.store.user_by_email(&request.email).await?.is_none() {
        return Err(AppError::NotFound(
            "No user with this email exists".to_string(),
        ));
    }

    Ok(Json(serde_json::json!({
        "detail": "Password reset instructions sent"
    })))
}

/// Follow an author
pub async fn subscribe(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<(StatusCode, Json<SubscriptionResponse>)> {
    let author = state
        .store
        .user_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;

    if author.id == user.id {
        return Err(AppError::InvalidInput(
            "You cannot subscribe to yourself".to_string(),
        ));
    }
    if !state.store.create_follow(user.id, author.id).await? {
        return Err(AppError::InvalidInput(
            "You are already subscribed to this user".to_string(),
        ));
    }

    let response = SubscriptionResponse::build(&*state.store, &author).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Unfollow an author
pub async fn unsubscribe(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let author = state
        .store
        .user_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("User {} not found", id)))?;

    if !state.store.delete_follow(user.id, author.id).await? {
        return Err(AppError::InvalidInput(
            "You were not subscribed to this user".to_string(),
        ));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// List the authors the caller follows, with their recipes
pub async fn subscriptions(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<PageQuery>,
) -> AppResult<Json<Paginated<SubscriptionResponse>>> {
    let (count, authors) = state.store.followed_authors(user.id, query.page()).await?;

    let mut results = Vec::with_capacity(authors.len());
    for author in &authors {
        results.push(SubscriptionResponse::build(&*state.store, author).await?);
    }

    Ok(Json(Paginated { count, results }))
}
