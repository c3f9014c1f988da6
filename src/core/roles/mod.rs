//! Role and permission management module

pub mod api;

pub use api::{RolesApiState, roles_api_router};
