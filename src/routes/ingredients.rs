use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::models::Ingredient;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct IngredientQuery {
    /// Case-insensitive name prefix filter
    pub name: Option<String>,
}

/// List the ingredient catalog, optionally filtered by name prefix
pub async fn list_ingredients(
    State(state): State<AppState>,
    Query(query): Query<IngredientQuery>,
) -> AppResult<Json<Vec<Ingredient>>> {
    let ingredients = state
        .store
        .list_ingredients(query.name.as_deref())
        .await?;
    Ok(Json(ingredients))
}

/// Fetch one catalog ingredient
pub async fn get_ingredient(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Ingredient>> {
    let ingredient = state
        .store
        .ingredient_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Ingredient {} not found", id)))?;
    Ok(Json(ingredient))
}
