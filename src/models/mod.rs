pub mod ingredient;
pub mod recipe;
pub mod user;

pub use ingredient::Ingredient;
pub use recipe::{NewIngredientLine, NewRecipe, Recipe, RecipeIngredientLine, RecipeUpdate};
pub use user::{NewUser, User};

/// Inclusive bounds on a single ingredient line amount
pub const MIN_AMOUNT: i32 = 1;
pub const MAX_AMOUNT: i32 = 32000;

/// Minimum cooking time in minutes
pub const MIN_COOKING_TIME: i32 = 1;
