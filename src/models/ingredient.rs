use serde::{Deserialize, Serialize};

/// Reference-data ingredient, unique per (name, measurement_unit)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Ingredient {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
}
