//! Product catalog module

pub mod api;

pub use api::{ProductsApiState, products_api_router};
