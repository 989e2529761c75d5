use axum::{
    http::StatusCode,
    middleware as axum_middleware,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod auth;
pub mod ingredients;
pub mod recipes;
pub mod users;

use crate::middleware::request_id::{make_span_with_request_id, request_id_middleware};
use crate::state::AppState;
use crate::store::Page;

/// Creates the application router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes())
        .layer(TraceLayer::new_for_http().make_span_with(make_span_with_request_id))
        .layer(axum_middleware::from_fn(request_id_middleware))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// API routes under /api
fn api_routes() -> Router<AppState> {
    Router::new()
        // Users
        .route("/users/", get(users::list_users).post(users::register))
        .route("/users/me/", get(users::me))
        .route(
            "/users/me/avatar/",
            put(users::set_avatar).delete(users::delete_avatar),
        )
        .route("/users/set_password/", post(users::set_password))
        .route("/users/reset_password/", post(users::reset_password))
        .route("/users/subscriptions/", get(users::subscriptions))
        .route("/users/:id/", get(users::get_user))
        .route(
            "/users/:id/subscribe/",
            post(users::subscribe).delete(users::unsubscribe),
        )
        // Auth tokens
        .route("/auth/token/login/", post(auth::login))
        .route("/auth/token/logout/", post(auth::logout))
        // Ingredient catalog
        .route("/ingredients/", get(ingredients::list_ingredients))
        .route("/ingredients/:id/", get(ingredients::get_ingredient))
        // Recipes
        .route(
            "/recipes/",
            get(recipes::list_recipes).post(recipes::create_recipe),
        )
        .route(
            "/recipes/download_shopping_cart/",
            get(recipes::download_shopping_cart),
        )
        .route(
            "/recipes/:id/",
            get(recipes::get_recipe)
                .patch(recipes::update_recipe)
                .delete(recipes::delete_recipe),
        )
        .route("/recipes/:id/get-link/", get(recipes::get_link))
        .route(
            "/recipes/:id/favorite/",
            post(recipes::add_favorite).delete(recipes::remove_favorite),
        )
        .route(
            "/recipes/:id/shopping_cart/",
            post(recipes::add_to_cart).delete(recipes::remove_from_cart),
        )
}

/// Health check endpoint
async fn health_check() -> (StatusCode, Json<Value>) {
    (StatusCode::OK, Json(json!({ "status": "healthy" })))
}

/// Page window query parameters shared by list endpoints
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl PageQuery {
    pub fn page(&self) -> Page {
        Page::new(self.page, self.limit)
    }
}

/// Standard envelope for paginated listings
#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub count: i64,
    pub results: Vec<T>,
}
