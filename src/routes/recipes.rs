use std::collections::HashSet;

use axum::{
    extract::{Path, Query, State},
    http::{
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
        StatusCode,
    },
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::{CurrentUser, OptionalUser};
use crate::models::{
    NewIngredientLine, NewRecipe, Recipe, RecipeIngredientLine, RecipeUpdate, User, MAX_AMOUNT,
    MIN_AMOUNT, MIN_COOKING_TIME,
};
use crate::services::shopping_list::{build_shopping_list, render_shopping_list};
use crate::state::AppState;
use crate::store::{RecipeFilter, Store};

use super::users::UserResponse;
use super::{PageQuery, Paginated};

/// Full recipe shape with author, lines and viewer-relative flags
#[derive(Debug, Serialize)]
pub struct RecipeResponse {
    pub id: i64,
    pub author: UserResponse,
    pub name: String,
    pub image: Option<String>,
    pub text: String,
    pub ingredients: Vec<RecipeIngredientLine>,
    pub cooking_time: i32,
    pub created_at: DateTime<Utc>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

/// Compact recipe shape used inside subscription listings
#[derive(Debug, Serialize)]
pub struct RecipeShort {
    pub id: i64,
    pub name: String,
    pub image: Option<String>,
    pub cooking_time: i32,
}

impl From<&Recipe> for RecipeShort {
    fn from(recipe: &Recipe) -> Self {
        Self {
            id: recipe.id,
            name: recipe.name.clone(),
            image: recipe.image.clone(),
            cooking_time: recipe.cooking_time,
        }
    }
}

impl RecipeResponse {
    /// Assembles the response shape for one recipe as seen by `viewer`
    async fn build(store: &dyn Store, recipe: &Recipe, viewer: Option<&User>) -> AppResult<Self> {
        let author = store.user_by_id(recipe.author_id).await?.ok_or_else(|| {
            AppError::Internal(format!("Author of recipe {} is missing", recipe.id))
        })?;
        let author = UserResponse::for_viewer(store, &author, viewer).await?;

        let ingredients = store.recipe_lines(recipe.id).await?;

        let (is_favorited, is_in_shopping_cart) = match viewer {
            Some(viewer) => (
                store.is_favorited(viewer.id, recipe.id).await?,
                store.in_cart(viewer.id, recipe.id).await?,
            ),
            None => (false, false),
        };

        Ok(Self {
            id: recipe.id,
            author,
            name: recipe.name.clone(),
            image: recipe.image.clone(),
            text: recipe.text.clone(),
            ingredients,
            cooking_time: recipe.cooking_time,
            created_at: recipe.created_at,
            is_favorited,
            is_in_shopping_cart,
        })
    }
}

/// Checks client-submitted ingredient lines against the catalog and the
/// amount bounds. An empty list is allowed; such a recipe simply
/// contributes nothing to shopping lists.
async fn validate_lines(store: &dyn Store, lines: &[NewIngredientLine]) -> AppResult<()> {
    let mut seen = HashSet::new();
    for line in lines {
        if !(MIN_AMOUNT..=MAX_AMOUNT).contains(&line.amount) {
            return Err(AppError::InvalidInput(format!(
                "Amount must be between {} and {}",
                MIN_AMOUNT, MAX_AMOUNT
            )));
        }
        if !seen.insert(line.ingredient_id) {
            return Err(AppError::InvalidInput(
                "Duplicate ingredient in recipe".to_string(),
            ));
        }
        if store.ingredient_by_id(line.ingredient_id).await?.is_none() {
            return Err(AppError::InvalidInput(format!(
                "Unknown ingredient id {}",
                line.ingredient_id
            )));
        }
    }
    Ok(())
}

fn validate_cooking_time(cooking_time: i32) -> AppResult<()> {
    if cooking_time < MIN_COOKING_TIME {
        return Err(AppError::InvalidInput(format!(
            "Cooking time must be at least {} minute",
            MIN_COOKING_TIME
        )));
    }
    Ok(())
}

async fn recipe_or_404(store: &dyn Store, id: i64) -> AppResult<Recipe> {
    store
        .recipe_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Recipe {} not found", id)))
}

#[derive(Debug, Deserialize)]
pub struct RecipeListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub author: Option<i64>,
    pub is_favorited: Option<String>,
    pub is_in_shopping_cart: Option<String>,
}

fn flag_set(value: &Option<String>) -> bool {
    matches!(value.as_deref(), Some("1") | Some("true"))
}

/// List recipes, newest first, with optional filters.
/// The favorite/cart flags only apply to authenticated callers.
pub async fn list_recipes(
    State(state): State<AppState>,
    OptionalUser(viewer): OptionalUser,
    Query(query): Query<RecipeListQuery>,
) -> AppResult<Json<Paginated<RecipeResponse>>> {
    let filter = RecipeFilter {
        author_id: query.author,
        favorited_by: viewer
            .as_ref()
            .filter(|_| flag_set(&query.is_favorited))
            .map(|v| v.id),
        in_cart_of: viewer
            .as_ref()
            .filter(|_| flag_set(&query.is_in_shopping_cart))
            .map(|v| v.id),
    };
    let page = PageQuery {
        page: query.page,
        limit: query.limit,
    }
    .page();

    let (count, recipes) = state.store.list_recipes(filter, page).await?;

    let mut results = Vec::with_capacity(recipes.len());
    for recipe in &recipes {
        results.push(RecipeResponse::build(&*state.store, recipe, viewer.as_ref()).await?);
    }

    Ok(Json(Paginated { count, results }))
}

#[derive(Debug, Deserialize)]
pub struct CreateRecipeRequest {
    pub name: String,
    pub text: String,
    pub image: Option<String>,
    pub cooking_time: i32,
    pub ingredients: Vec<NewIngredientLine>,
}

/// Publish a new recipe
pub async fn create_recipe(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Json(request): Json<CreateRecipeRequest>,
) -> AppResult<(StatusCode, Json<RecipeResponse>)> {
    validate_cooking_time(request.cooking_time)?;
    validate_lines(&*state.store, &request.ingredients).await?;

    let recipe = state
        .store
        .create_recipe(NewRecipe {
            author_id: user.id,
            name: request.name,
            image: request.image,
            text: request.text,
            cooking_time: request.cooking_time,
            ingredients: request.ingredients,
        })
        .await?;

    tracing::info!(recipe_id = recipe.id, author_id = user.id, "recipe created");

    let response = RecipeResponse::build(&*state.store, &recipe, Some(&user)).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

/// Fetch one recipe
pub async fn get_recipe(
    State(state): State<AppState>,
    OptionalUser(viewer): OptionalUser,
    Path(id): Path<i64>,
) -> AppResult<Json<RecipeResponse>> {
    let recipe = recipe_or_404(&*state.store, id).await?;
    Ok(Json(
        RecipeResponse::build(&*state.store, &recipe, viewer.as_ref()).await?,
    ))
}

#[derive(Debug, Deserialize)]
pub struct UpdateRecipeRequest {
    pub name: Option<String>,
    pub text: Option<String>,
    pub image: Option<String>,
    pub cooking_time: Option<i32>,
    pub ingredients: Option<Vec<NewIngredientLine>>,
}

/// Update a recipe; only its author may do so
pub async fn update_recipe(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
    Json(request): Json<UpdateRecipeRequest>,
) -> AppResult<Json<RecipeResponse>> {
    let recipe = recipe_or_404(&*state.store, id).await?;
    if recipe.author_id != user.id {
        return Err(AppError::Forbidden(
            "Only the author can edit this recipe".to_string(),
        ));
    }

    if let Some(cooking_time) = request.cooking_time {
        validate_cooking_time(cooking_time)?;
    }
    if let Some(lines) = &request.ingredients {
        validate_lines(&*state.store, lines).await?;
    }

    let updated = state
        .store
        .update_recipe(
            id,
            RecipeUpdate {
                name: request.name,
                image: request.image,
                text: request.text,
                cooking_time: request.cooking_time,
                ingredients: request.ingredients,
            },
        )
        .await?;

    Ok(Json(
        RecipeResponse::build(&*state.store, &updated, Some(&user)).await?,
    ))
}

/// Delete a recipe; only its author may do so
pub async fn delete_recipe(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let recipe = recipe_or_404(&*state.store, id).await?;
    if recipe.author_id != user.id {
        return Err(AppError::Forbidden(
            "Only the author can delete this recipe".to_string(),
        ));
    }

    state.store.delete_recipe(id).await?;
    tracing::info!(recipe_id = id, author_id = user.id, "recipe deleted");

    Ok(StatusCode::NO_CONTENT)
}

/// Short link for sharing a recipe
pub async fn get_link(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Value>> {
    recipe_or_404(&*state.store, id).await?;
    let url = format!("{}/recipes/{}/", state.config.base_url, id);
    Ok(Json(json!({ "short-link": url })))
}

/// Favorite a recipe
pub async fn add_favorite(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<(StatusCode, Json<RecipeShort>)> {
    let recipe = recipe_or_404(&*state.store, id).await?;
    if !state.store.add_favorite(user.id, recipe.id).await? {
        return Err(AppError::InvalidInput(
            "Recipe is already in favorites".to_string(),
        ));
    }

    Ok((StatusCode::CREATED, Json(RecipeShort::from(&recipe))))
}

/// Remove a recipe from favorites
pub async fn remove_favorite(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let recipe = recipe_or_404(&*state.store, id).await?;
    if !state.store.remove_favorite(user.id, recipe.id).await? {
        return Err(AppError::InvalidInput(
            "Recipe is not in favorites".to_string(),
        ));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Add a recipe to the caller's shopping cart
pub async fn add_to_cart(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<(StatusCode, Json<RecipeShort>)> {
    let recipe = recipe_or_404(&*state.store, id).await?;
    if !state.store.add_cart_entry(user.id, recipe.id).await? {
        return Err(AppError::InvalidInput(
            "Recipe is already in the shopping cart".to_string(),
        ));
    }

    Ok((StatusCode::CREATED, Json(RecipeShort::from(&recipe))))
}

/// Remove a recipe from the caller's shopping cart
pub async fn remove_from_cart(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<i64>,
) -> AppResult<StatusCode> {
    let recipe = recipe_or_404(&*state.store, id).await?;
    if !state.store.remove_cart_entry(user.id, recipe.id).await? {
        return Err(AppError::InvalidInput(
            "Recipe is not in the shopping cart".to_string(),
        ));
    }

    Ok(StatusCode::NO_CONTENT)
}

/// Download the aggregated shopping list for everything in the cart
pub async fn download_shopping_cart(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> AppResult<impl axum::response::IntoResponse> {
    let items = build_shopping_list(&*state.store, user.id).await?;
    let body = render_shopping_list(&items);

    tracing::info!(
        user_id = user.id,
        items = items.len(),
        "shopping list rendered"
    );

    Ok((
        [
            (CONTENT_TYPE, "text/plain; charset=utf-8"),
            (
                CONTENT_DISPOSITION,
                "attachment; filename=\"shopping_list.txt\"",
            ),
        ],
        body,
    ))
}
