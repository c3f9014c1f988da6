//! Core domain modules: configuration, persistence, auth and the per-resource
//! API routers.

pub mod auth;
pub mod categories;
pub mod config;
pub mod db;
pub mod http;
pub mod orders;
pub mod payments;
pub mod products;
pub mod roles;
pub mod stock;
pub mod users;
