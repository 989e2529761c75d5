pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{
    Ingredient, NewRecipe, NewUser, Recipe, RecipeIngredientLine, RecipeUpdate, User,
};
use crate::services::shopping_list::CartSource;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Page window for list endpoints, already clamped to sane bounds
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub number: u32,
    pub limit: u32,
}

impl Page {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    pub fn new(number: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            number: number.unwrap_or(1).max(1),
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.number - 1) * i64::from(self.limit)
    }
}

/// Filters applied to recipe listings. `None` fields are inactive.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecipeFilter {
    pub author_id: Option<i64>,
    /// Only recipes favorited by this user
    pub favorited_by: Option<i64>,
    /// Only recipes in this user's shopping cart
    pub in_cart_of: Option<i64>,
}

/// Storage interface behind every handler.
///
/// `CartSource` is a supertrait so the shopping-list aggregator can consume
/// the same store through its narrow capability interface. Backed by
/// PostgreSQL in production and by `MemoryStore` in the HTTP tests.
#[async_trait]
pub trait Store: CartSource {
    // Users
    async fn create_user(&self, new_user: NewUser) -> AppResult<User>;
    async fn user_by_id(&self, id: i64) -> AppResult<Option<User>>;
    async fn user_by_email(&self, email: &str) -> AppResult<Option<User>>;
    async fn user_by_username(&self, username: &str) -> AppResult<Option<User>>;
    async fn list_users(&self, page: Page) -> AppResult<(i64, Vec<User>)>;
    async fn set_password_hash(&self, user_id: i64, password_hash: &str) -> AppResult<()>;
    async fn set_avatar(&self, user_id: i64, avatar: Option<&str>) -> AppResult<()>;

    // Auth tokens
    async fn insert_token(&self, key: &str, user_id: i64) -> AppResult<()>;
    async fn user_for_token(&self, key: &str) -> AppResult<Option<User>>;
    /// Returns false when the key was not present
    async fn delete_token(&self, key: &str) -> AppResult<bool>;

    // Follows
    /// Returns false when the follow already existed
    async fn create_follow(&self, user_id: i64, author_id: i64) -> AppResult<bool>;
    /// Returns false when there was nothing to delete
    async fn delete_follow(&self, user_id: i64, author_id: i64) -> AppResult<bool>;
    async fn is_following(&self, user_id: i64, author_id: i64) -> AppResult<bool>;
    async fn followed_authors(&self, user_id: i64, page: Page) -> AppResult<(i64, Vec<User>)>;

    // Ingredients
    /// Full catalog ordered by name; `name_prefix` filters case-insensitively
    async fn list_ingredients(&self, name_prefix: Option<&str>) -> AppResult<Vec<Ingredient>>;
    async fn ingredient_by_id(&self, id: i64) -> AppResult<Option<Ingredient>>;

    // Recipes
    async fn create_recipe(&self, new_recipe: NewRecipe) -> AppResult<Recipe>;
    async fn recipe_by_id(&self, id: i64) -> AppResult<Option<Recipe>>;
    async fn update_recipe(&self, id: i64, update: RecipeUpdate) -> AppResult<Recipe>;
    async fn delete_recipe(&self, id: i64) -> AppResult<()>;
    /// Newest first
    async fn list_recipes(&self, filter: RecipeFilter, page: Page) -> AppResult<(i64, Vec<Recipe>)>;
    async fn recipes_by_author(&self, author_id: i64) -> AppResult<Vec<Recipe>>;
    async fn recipe_lines(&self, recipe_id: i64) -> AppResult<Vec<RecipeIngredientLine>>;

    // Favorites
    async fn add_favorite(&self, user_id: i64, recipe_id: i64) -> AppResult<bool>;
    async fn remove_favorite(&self, user_id: i64, recipe_id: i64) -> AppResult<bool>;
    async fn is_favorited(&self, user_id: i64, recipe_id: i64) -> AppResult<bool>;

    // Shopping cart membership
    async fn add_cart_entry(&self, user_id: i64, recipe_id: i64) -> AppResult<bool>;
    async fn remove_cart_entry(&self, user_id: i64, recipe_id: i64) -> AppResult<bool>;
    async fn in_cart(&self, user_id: i64, recipe_id: i64) -> AppResult<bool>;
}
