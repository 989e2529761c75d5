use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::{AppError, AppResult};
use crate::models::{
    Ingredient, NewRecipe, NewUser, Recipe, RecipeIngredientLine, RecipeUpdate, User,
};
use crate::services::shopping_list::{CartSource, IngredientLine};

use super::{Page, RecipeFilter, Store};

#[derive(Default)]
struct Inner {
    next_user_id: i64,
    next_ingredient_id: i64,
    next_recipe_id: i64,
    users: HashMap<i64, User>,
    tokens: HashMap<String, i64>,
    follows: HashSet<(i64, i64)>,
    ingredients: HashMap<i64, Ingredient>,
    recipes: HashMap<i64, Recipe>,
    recipe_lines: HashMap<i64, Vec<RecipeIngredientLine>>,
    favorites: HashSet<(i64, i64)>,
    cart_entries: HashSet<(i64, i64)>,
}

/// In-memory store used by the HTTP tests; same contract as `PgStore`
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds one catalog ingredient and returns it. The catalog is
    /// reference data loaded out-of-band in production, so this is not
    /// part of the `Store` contract.
    pub async fn insert_ingredient(&self, name: &str, measurement_unit: &str) -> Ingredient {
        let mut inner = self.inner.write().await;
        inner.next_ingredient_id += 1;
        let ingredient = Ingredient {
            id: inner.next_ingredient_id,
            name: name.to_string(),
            measurement_unit: measurement_unit.to_string(),
        };
        inner.ingredients.insert(ingredient.id, ingredient.clone());
        ingredient
    }
}

fn resolve_lines(
    inner: &Inner,
    lines: &[crate::models::NewIngredientLine],
) -> AppResult<Vec<RecipeIngredientLine>> {
    lines
        .iter()
        .map(|line| {
            let ingredient = inner
                .ingredients
                .get(&line.ingredient_id)
                .ok_or_else(|| {
                    AppError::InvalidInput(format!("Unknown ingredient id {}", line.ingredient_id))
                })?;
            Ok(RecipeIngredientLine {
                ingredient_id: ingredient.id,
                name: ingredient.name.clone(),
                measurement_unit: ingredient.measurement_unit.clone(),
                amount: line.amount,
            })
        })
        .collect()
}

fn paginate<T: Clone>(items: &[T], page: Page) -> (i64, Vec<T>) {
    let count = items.len() as i64;
    let window = items
        .iter()
        .skip(page.offset() as usize)
        .take(page.limit as usize)
        .cloned()
        .collect();
    (count, window)
}

#[async_trait]
impl CartSource for MemoryStore {
    async fn cart_recipe_ids(&self, user_id: i64) -> AppResult<Vec<i64>> {
        let inner = self.inner.read().await;
        let mut ids: Vec<i64> = inner
            .cart_entries
            .iter()
            .filter(|(uid, _)| *uid == user_id)
            .map(|(_, rid)| *rid)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    async fn ingredient_lines(&self, recipe_id: i64) -> AppResult<Vec<IngredientLine>> {
        let inner = self.inner.read().await;
        Ok(inner
            .recipe_lines
            .get(&recipe_id)
            .map(|lines| {
                lines
                    .iter()
                    .map(|line| IngredientLine {
                        name: line.name.clone(),
                        measurement_unit: line.measurement_unit.clone(),
                        amount: line.amount,
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, new_user: NewUser) -> AppResult<User> {
        let mut inner = self.inner.write().await;
        inner.next_user_id += 1;
        let user = User {
            id: inner.next_user_id,
            email: new_user.email,
            username: new_user.username,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            password_hash: new_user.password_hash,
            avatar: None,
            created_at: Utc::now(),
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn user_by_id(&self, id: i64) -> AppResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.get(&id).cloned())
    }

    async fn user_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    async fn user_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn list_users(&self, page: Page) -> AppResult<(i64, Vec<User>)> {
        let inner = self.inner.read().await;
        let mut users: Vec<User> = inner.users.values().cloned().collect();
        users.sort_by_key(|u| u.id);
        Ok(paginate(&users, page))
    }

    async fn set_password_hash(&self, user_id: i64, password_hash: &str) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.password_hash = password_hash.to_string();
        }
        Ok(())
    }

    async fn set_avatar(&self, user_id: i64, avatar: Option<&str>) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        if let Some(user) = inner.users.get_mut(&user_id) {
            user.avatar = avatar.map(str::to_string);
        }
        Ok(())
    }

    async fn insert_token(&self, key: &str, user_id: i64) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner.tokens.insert(key.to_string(), user_id);
        Ok(())
    }

    async fn user_for_token(&self, key: &str) -> AppResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .tokens
            .get(key)
            .and_then(|user_id| inner.users.get(user_id))
            .cloned())
    }

    async fn delete_token(&self, key: &str) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.tokens.remove(key).is_some())
    }

    async fn create_follow(&self, user_id: i64, author_id: i64) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.follows.insert((user_id, author_id)))
    }

    async fn delete_follow(&self, user_id: i64, author_id: i64) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.follows.remove(&(user_id, author_id)))
    }

    async fn is_following(&self, user_id: i64, author_id: i64) -> AppResult<bool> {
        let inner = self.inner.read().await;
        Ok(inner.follows.contains(&(user_id, author_id)))
    }

    async fn followed_authors(&self, user_id: i64, page: Page) -> AppResult<(i64, Vec<User>)> {
        let inner = self.inner.read().await;
        let mut authors: Vec<User> = inner
            .follows
            .iter()
            .filter(|(uid, _)| *uid == user_id)
            .filter_map(|(_, author_id)| inner.users.get(author_id))
            .cloned()
            .collect();
        authors.sort_by_key(|u| u.id);
        Ok(paginate(&authors, page))
    }

    async fn list_ingredients(&self, name_prefix: Option<&str>) -> AppResult<Vec<Ingredient>> {
        let inner = self.inner.read().await;
        let prefix = name_prefix.map(str::to_lowercase);
        let mut ingredients: Vec<Ingredient> = inner
            .ingredients
            .values()
            .filter(|i| match &prefix {
                Some(p) => i.name.to_lowercase().starts_with(p),
                None => true,
            })
            .cloned()
            .collect();
        ingredients.sort_by(|a, b| {
            (&a.name, &a.measurement_unit).cmp(&(&b.name, &b.measurement_unit))
        });
        Ok(ingredients)
    }

    async fn ingredient_by_id(&self, id: i64) -> AppResult<Option<Ingredient>> {
        let inner = self.inner.read().await;
        Ok(inner.ingredients.get(&id).cloned())
    }

    async fn create_recipe(&self, new_recipe: NewRecipe) -> AppResult<Recipe> {
        let mut inner = self.inner.write().await;
        let lines = resolve_lines(&inner, &new_recipe.ingredients)?;
        inner.next_recipe_id += 1;
        let recipe = Recipe {
            id: inner.next_recipe_id,
            author_id: new_recipe.author_id,
            name: new_recipe.name,
            image: new_recipe.image,
            text: new_recipe.text,
            cooking_time: new_recipe.cooking_time,
            created_at: Utc::now(),
        };
        inner.recipes.insert(recipe.id, recipe.clone());
        inner.recipe_lines.insert(recipe.id, lines);
        Ok(recipe)
    }

    async fn recipe_by_id(&self, id: i64) -> AppResult<Option<Recipe>> {
        let inner = self.inner.read().await;
        Ok(inner.recipes.get(&id).cloned())
    }

    async fn update_recipe(&self, id: i64, update: RecipeUpdate) -> AppResult<Recipe> {
        let mut inner = self.inner.write().await;
        let lines = match &update.ingredients {
            Some(lines) => Some(resolve_lines(&inner, lines)?),
            None => None,
        };

        let recipe = inner
            .recipes
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Recipe {} not found", id)))?;

        if let Some(name) = update.name {
            recipe.name = name;
        }
        if let Some(image) = update.image {
            recipe.image = Some(image);
        }
        if let Some(text) = update.text {
            recipe.text = text;
        }
        if let Some(cooking_time) = update.cooking_time {
            recipe.cooking_time = cooking_time;
        }
        let recipe = recipe.clone();

        if let Some(lines) = lines {
            inner.recipe_lines.insert(id, lines);
        }

        Ok(recipe)
    }

    async fn delete_recipe(&self, id: i64) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner.recipes.remove(&id);
        inner.recipe_lines.remove(&id);
        inner.favorites.retain(|(_, rid)| *rid != id);
        inner.cart_entries.retain(|(_, rid)| *rid != id);
        Ok(())
    }

    async fn list_recipes(
        &self,
        filter: RecipeFilter,
        page: Page,
    ) -> AppResult<(i64, Vec<Recipe>)> {
        let inner = self.inner.read().await;
        let mut recipes: Vec<Recipe> = inner
            .recipes
            .values()
            .filter(|r| filter.author_id.map_or(true, |a| r.author_id == a))
            .filter(|r| {
                filter
                    .favorited_by
                    .map_or(true, |u| inner.favorites.contains(&(u, r.id)))
            })
            .filter(|r| {
                filter
                    .in_cart_of
                    .map_or(true, |u| inner.cart_entries.contains(&(u, r.id)))
            })
            .cloned()
            .collect();
        // Newest first; ids break creation-time ties
        recipes.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(paginate(&recipes, page))
    }

    async fn recipes_by_author(&self, author_id: i64) -> AppResult<Vec<Recipe>> {
        let inner = self.inner.read().await;
        let mut recipes: Vec<Recipe> = inner
            .recipes
            .values()
            .filter(|r| r.author_id == author_id)
            .cloned()
            .collect();
        recipes.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(recipes)
    }

    async fn recipe_lines(&self, recipe_id: i64) -> AppResult<Vec<RecipeIngredientLine>> {
        let inner = self.inner.read().await;
        let mut lines = inner
            .recipe_lines
            .get(&recipe_id)
            .cloned()
            .unwrap_or_default();
        lines.sort_by(|a, b| {
            (&a.name, &a.measurement_unit).cmp(&(&b.name, &b.measurement_unit))
        });
        Ok(lines)
    }

    async fn add_favorite(&self, user_id: i64, recipe_id: i64) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.favorites.insert((user_id, recipe_id)))
    }

    async fn remove_favorite(&self, user_id: i64, recipe_id: i64) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.favorites.remove(&(user_id, recipe_id)))
    }

    async fn is_favorited(&self, user_id: i64, recipe_id: i64) -> AppResult<bool> {
        let inner = self.inner.read().await;
        Ok(inner.favorites.contains(&(user_id, recipe_id)))
    }

    async fn add_cart_entry(&self, user_id: i64, recipe_id: i64) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.cart_entries.insert((user_id, recipe_id)))
    }

    async fn remove_cart_entry(&self, user_id: i64, recipe_id: i64) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.cart_entries.remove(&(user_id, recipe_id)))
    }

    async fn in_cart(&self, user_id: i64, recipe_id: i64) -> AppResult<bool> {
        let inner = self.inner.read().await;
        Ok(inner.cart_entries.contains(&(user_id, recipe_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewIngredientLine;
    use crate::services::shopping_list::{build_shopping_list, render_shopping_list};

    async fn user(store: &MemoryStore, email: &str) -> User {
        store
            .create_user(NewUser {
                email: email.to_string(),
                username: email.split('@').next().unwrap().to_string(),
                first_name: String::new(),
                last_name: String::new(),
                password_hash: "x".to_string(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn cart_aggregation_matches_rendered_listing() {
        let store = MemoryStore::new();
        let author = user(&store, "cook@example.com").await;
        let shopper = user(&store, "shopper@example.com").await;

        let flour = store.insert_ingredient("flour", "g").await;
        let sugar = store.insert_ingredient("sugar", "g").await;

        let recipe_a = store
            .create_recipe(NewRecipe {
                author_id: author.id,
                name: "Bread".to_string(),
                image: None,
                text: "Bake it".to_string(),
                cooking_time: 90,
                ingredients: vec![NewIngredientLine {
                    ingredient_id: flour.id,
                    amount: 200,
                }],
            })
            .await
            .unwrap();
        let recipe_b = store
            .create_recipe(NewRecipe {
                author_id: author.id,
                name: "Cake".to_string(),
                image: None,
                text: "Bake it too".to_string(),
                cooking_time: 60,
                ingredients: vec![
                    NewIngredientLine {
                        ingredient_id: flour.id,
                        amount: 150,
                    },
                    NewIngredientLine {
                        ingredient_id: sugar.id,
                        amount: 50,
                    },
                ],
            })
            .await
            .unwrap();

        store.add_cart_entry(shopper.id, recipe_a.id).await.unwrap();
        store.add_cart_entry(shopper.id, recipe_b.id).await.unwrap();

        let items = build_shopping_list(&store, shopper.id).await.unwrap();
        assert_eq!(
            render_shopping_list(&items),
            "flour (g) — 350\nsugar (g) — 50"
        );

        // Idempotent without intervening writes
        let again = build_shopping_list(&store, shopper.id).await.unwrap();
        assert_eq!(items, again);
    }

    #[tokio::test]
    async fn deleting_a_recipe_drops_its_cart_entries() {
        let store = MemoryStore::new();
        let author = user(&store, "cook@example.com").await;
        let flour = store.insert_ingredient("flour", "g").await;

        let recipe = store
            .create_recipe(NewRecipe {
                author_id: author.id,
                name: "Bread".to_string(),
                image: None,
                text: "Bake".to_string(),
                cooking_time: 90,
                ingredients: vec![NewIngredientLine {
                    ingredient_id: flour.id,
                    amount: 200,
                }],
            })
            .await
            .unwrap();

        store.add_cart_entry(author.id, recipe.id).await.unwrap();
        store.delete_recipe(recipe.id).await.unwrap();

        assert!(store.cart_recipe_ids(author.id).await.unwrap().is_empty());
        assert_eq!(
            render_shopping_list(&build_shopping_list(&store, author.id).await.unwrap()),
            ""
        );
    }

    #[tokio::test]
    async fn duplicate_memberships_are_rejected() {
        let store = MemoryStore::new();
        let u = user(&store, "a@example.com").await;
        assert!(store.add_favorite(u.id, 1).await.unwrap());
        assert!(!store.add_favorite(u.id, 1).await.unwrap());
        assert!(store.add_cart_entry(u.id, 1).await.unwrap());
        assert!(!store.add_cart_entry(u.id, 1).await.unwrap());
    }

    #[tokio::test]
    async fn ingredient_prefix_filter_is_case_insensitive() {
        let store = MemoryStore::new();
        store.insert_ingredient("Sugar", "g").await;
        store.insert_ingredient("salt", "g").await;
        store.insert_ingredient("flour", "g").await;

        let matches = store.list_ingredients(Some("s")).await.unwrap();
        let names: Vec<&str> = matches.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["Sugar", "salt"]);
    }
}
