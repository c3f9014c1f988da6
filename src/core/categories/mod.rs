//! Category management module

pub mod api;

pub use api::{CategoriesApiState, categories_api_router};
