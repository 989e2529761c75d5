use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A published recipe as stored in the database
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Recipe {
    pub id: i64,
    pub author_id: i64,
    pub name: String,
    pub image: Option<String>,
    pub text: String,
    pub cooking_time: i32,
    pub created_at: DateTime<Utc>,
}

/// One ingredient requirement of a recipe, joined with the catalog entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct RecipeIngredientLine {
    #[serde(rename = "id")]
    pub ingredient_id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

/// An (ingredient id, amount) pair as submitted by a client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct NewIngredientLine {
    #[serde(rename = "id")]
    pub ingredient_id: i64,
    pub amount: i32,
}

/// Fields required to create a recipe
#[derive(Debug, Clone)]
pub struct NewRecipe {
    pub author_id: i64,
    pub name: String,
    pub image: Option<String>,
    pub text: String,
    pub cooking_time: i32,
    pub ingredients: Vec<NewIngredientLine>,
}

/// Partial update of a recipe; `None` fields are left untouched.
/// When `ingredients` is present the full line set is replaced.
#[derive(Debug, Clone, Default)]
pub struct RecipeUpdate {
    pub name: Option<String>,
    pub image: Option<String>,
    pub text: Option<String>,
    pub cooking_time: Option<i32>,
    pub ingredients: Option<Vec<NewIngredientLine>>,
}
