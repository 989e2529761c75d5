use async_trait::async_trait;
use sqlx::PgPool;

use crate::error::AppResult;
use crate::models::{
    Ingredient, NewRecipe, NewUser, Recipe, RecipeIngredientLine, RecipeUpdate, User,
};
use crate::services::shopping_list::{CartSource, IngredientLine};

use super::{Page, RecipeFilter, Store};

const USER_COLUMNS: &str =
    "id, email, username, first_name, last_name, password_hash, avatar, created_at";

const RECIPE_COLUMNS: &str = "id, author_id, name, image, text, cooking_time, created_at";

/// Escapes `LIKE` metacharacters so a user-supplied prefix matches literally.
fn escape_like_prefix(prefix: &str) -> String {
    let mut escaped = String::with_capacity(prefix.len());
    for c in prefix.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn replace_recipe_lines(
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        recipe_id: i64,
        lines: &[crate::models::NewIngredientLine],
    ) -> AppResult<()> {
        sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
            .bind(recipe_id)
            .execute(&mut **tx)
            .await?;

        for line in lines {
            sqlx::query(
                "INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount) \
                 VALUES ($1, $2, $3)",
            )
            .bind(recipe_id)
            .bind(line.ingredient_id)
            .bind(line.amount)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl CartSource for PgStore {
    async fn cart_recipe_ids(&self, user_id: i64) -> AppResult<Vec<i64>> {
        let ids = sqlx::query_scalar::<_, i64>(
            "SELECT recipe_id FROM cart_entries WHERE user_id = $1 ORDER BY recipe_id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }

    async fn ingredient_lines(&self, recipe_id: i64) -> AppResult<Vec<IngredientLine>> {
        let rows = sqlx::query_as::<_, (String, String, i32)>(
            "SELECT i.name, i.measurement_unit, ri.amount \
             FROM recipe_ingredients ri \
             JOIN ingredients i ON i.id = ri.ingredient_id \
             WHERE ri.recipe_id = $1",
        )
        .bind(recipe_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(name, measurement_unit, amount)| IngredientLine {
                name,
                measurement_unit,
                amount,
            })
            .collect())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn create_user(&self, new_user: NewUser) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "INSERT INTO users (email, username, first_name, last_name, password_hash) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {USER_COLUMNS}"
        ))
        .bind(&new_user.email)
        .bind(&new_user.username)
        .bind(&new_user.first_name)
        .bind(&new_user.last_name)
        .bind(&new_user.password_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }

    async fn user_by_id(&self, id: i64) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE username = $1"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn list_users(&self, page: Page) -> AppResult<(i64, Vec<User>)> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY id LIMIT $1 OFFSET $2"
        ))
        .bind(i64::from(page.limit))
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((count, users))
    }

    async fn set_password_hash(&self, user_id: i64, password_hash: &str) -> AppResult<()> {
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(user_id)
            .bind(password_hash)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn set_avatar(&self, user_id: i64, avatar: Option<&str>) -> AppResult<()> {
        sqlx::query("UPDATE users SET avatar = $2 WHERE id = $1")
            .bind(user_id)
            .bind(avatar)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn insert_token(&self, key: &str, user_id: i64) -> AppResult<()> {
        sqlx::query("INSERT INTO auth_tokens (key, user_id) VALUES ($1, $2)")
            .bind(key)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn user_for_token(&self, key: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT u.{} FROM users u \
             JOIN auth_tokens t ON t.user_id = u.id \
             WHERE t.key = $1",
            USER_COLUMNS.replace(", ", ", u.")
        ))
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn delete_token(&self, key: &str) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM auth_tokens WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_follow(&self, user_id: i64, author_id: i64) -> AppResult<bool> {
        let result = sqlx::query(
            "INSERT INTO follows (user_id, author_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(author_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn delete_follow(&self, user_id: i64, author_id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM follows WHERE user_id = $1 AND author_id = $2")
            .bind(user_id)
            .bind(author_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn is_following(&self, user_id: i64, author_id: i64) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE user_id = $1 AND author_id = $2)",
        )
        .bind(user_id)
        .bind(author_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn followed_authors(&self, user_id: i64, page: Page) -> AppResult<(i64, Vec<User>)> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM follows WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let authors = sqlx::query_as::<_, User>(&format!(
            "SELECT u.{} FROM users u \
             JOIN follows f ON f.author_id = u.id \
             WHERE f.user_id = $1 ORDER BY u.id LIMIT $2 OFFSET $3",
            USER_COLUMNS.replace(", ", ", u.")
        ))
        .bind(user_id)
        .bind(i64::from(page.limit))
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((count, authors))
    }

    async fn list_ingredients(&self, name_prefix: Option<&str>) -> AppResult<Vec<Ingredient>> {
        let ingredients = match name_prefix {
            Some(prefix) => {
                sqlx::query_as::<_, Ingredient>(
                    "SELECT id, name, measurement_unit FROM ingredients \
                     WHERE name ILIKE $1 ESCAPE '\\' ORDER BY name, measurement_unit",
                )
                .bind(format!("{}%", escape_like_prefix(prefix)))
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Ingredient>(
                    "SELECT id, name, measurement_unit FROM ingredients \
                     ORDER BY name, measurement_unit",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(ingredients)
    }

    async fn ingredient_by_id(&self, id: i64) -> AppResult<Option<Ingredient>> {
        let ingredient = sqlx::query_as::<_, Ingredient>(
            "SELECT id, name, measurement_unit FROM ingredients WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(ingredient)
    }

    async fn create_recipe(&self, new_recipe: NewRecipe) -> AppResult<Recipe> {
        let mut tx = self.pool.begin().await?;

        let recipe = sqlx::query_as::<_, Recipe>(&format!(
            "INSERT INTO recipes (author_id, name, image, text, cooking_time) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {RECIPE_COLUMNS}"
        ))
        .bind(new_recipe.author_id)
        .bind(&new_recipe.name)
        .bind(&new_recipe.image)
        .bind(&new_recipe.text)
        .bind(new_recipe.cooking_time)
        .fetch_one(&mut *tx)
        .await?;

        Self::replace_recipe_lines(&mut tx, recipe.id, &new_recipe.ingredients).await?;

        tx.commit().await?;

        Ok(recipe)
    }

    async fn recipe_by_id(&self, id: i64) -> AppResult<Option<Recipe>> {
        let recipe = sqlx::query_as::<_, Recipe>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(recipe)
    }

    async fn update_recipe(&self, id: i64, update: RecipeUpdate) -> AppResult<Recipe> {
        let mut tx = self.pool.begin().await?;

        let recipe = sqlx::query_as::<_, Recipe>(&format!(
            "UPDATE recipes SET \
                 name = COALESCE($2, name), \
                 image = COALESCE($3, image), \
                 text = COALESCE($4, text), \
                 cooking_time = COALESCE($5, cooking_time) \
             WHERE id = $1 RETURNING {RECIPE_COLUMNS}"
        ))
        .bind(id)
        .bind(&update.name)
        .bind(&update.image)
        .bind(&update.text)
        .bind(update.cooking_time)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(lines) = &update.ingredients {
            Self::replace_recipe_lines(&mut tx, id, lines).await?;
        }

        tx.commit().await?;

        Ok(recipe)
    }

    async fn delete_recipe(&self, id: i64) -> AppResult<()> {
        // Lines, favorites and cart entries cascade away with the row
        sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn list_recipes(
        &self,
        filter: RecipeFilter,
        page: Page,
    ) -> AppResult<(i64, Vec<Recipe>)> {
        const WHERE_CLAUSE: &str = "($1::bigint IS NULL OR r.author_id = $1) \
             AND ($2::bigint IS NULL OR EXISTS \
                 (SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = $2)) \
             AND ($3::bigint IS NULL OR EXISTS \
                 (SELECT 1 FROM cart_entries c WHERE c.recipe_id = r.id AND c.user_id = $3))";

        let count = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM recipes r WHERE {WHERE_CLAUSE}"
        ))
        .bind(filter.author_id)
        .bind(filter.favorited_by)
        .bind(filter.in_cart_of)
        .fetch_one(&self.pool)
        .await?;

        let recipes = sqlx::query_as::<_, Recipe>(&format!(
            "SELECT r.{} FROM recipes r WHERE {WHERE_CLAUSE} \
             ORDER BY r.created_at DESC, r.id DESC LIMIT $4 OFFSET $5",
            RECIPE_COLUMNS.replace(", ", ", r.")
        ))
        .bind(filter.author_id)
        .bind(filter.favorited_by)
        .bind(filter.in_cart_of)
        .bind(i64::from(page.limit))
        .bind(page.offset())
        .fetch_all(&self.pool)
        .await?;

        Ok((count, recipes))
    }

    async fn recipes_by_author(&self, author_id: i64) -> AppResult<Vec<Recipe>> {
        let recipes = sqlx::query_as::<_, Recipe>(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE author_id = $1 \
             ORDER BY created_at DESC, id DESC"
        ))
        .bind(author_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(recipes)
    }

    async fn recipe_lines(&self, recipe_id: i64) -> AppResult<Vec<RecipeIngredientLine>> {
        let lines = sqlx::query_as::<_, RecipeIngredientLine>(
            "SELECT i.id AS ingredient_id, i.name, i.measurement_unit, ri.amount \
             FROM recipe_ingredients ri \
             JOIN ingredients i ON i.id = ri.ingredient_id \
             WHERE ri.recipe_id = $1 ORDER BY i.name, i.measurement_unit",
        )
        .bind(recipe_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(lines)
    }

    async fn add_favorite(&self, user_id: i64, recipe_id: i64) -> AppResult<bool> {
        let result = sqlx::query(
            "INSERT INTO favorites (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(recipe_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_favorite(&self, user_id: i64, recipe_id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND recipe_id = $2")
            .bind(user_id)
            .bind(recipe_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn is_favorited(&self, user_id: i64, recipe_id: i64) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM favorites WHERE user_id = $1 AND recipe_id = $2)",
        )
        .bind(user_id)
        .bind(recipe_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn add_cart_entry(&self, user_id: i64, recipe_id: i64) -> AppResult<bool> {
        let result = sqlx::query(
            "INSERT INTO cart_entries (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(recipe_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn remove_cart_entry(&self, user_id: i64, recipe_id: i64) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM cart_entries WHERE user_id = $1 AND recipe_id = $2")
            .bind(user_id)
            .bind(recipe_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn in_cart(&self, user_id: i64, recipe_id: i64) -> AppResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM cart_entries WHERE user_id = $1 AND recipe_id = $2)",
        )
        .bind(user_id)
        .bind(recipe_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }
}
