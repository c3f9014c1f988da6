//! User management module

pub mod api;

pub use api::{UsersApiState, users_api_router};
