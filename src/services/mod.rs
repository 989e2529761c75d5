pub mod auth;
pub mod shopping_list;
