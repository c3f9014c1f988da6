//! Database module for Shopkeeper
//!
//! Provides database connectivity, models and repositories for persistent
//! storage using PostgreSQL and SQLx.

pub mod models;
pub mod pool;
pub mod repositories;

pub use models::*;
pub use pool::{DbConfig, DbError, create_pool, create_pool_with_migrations, health_check};
pub use repositories::{
    CategoryRepository, CategoryRepositoryError, OrderRepository, OrderRepositoryError,
    PaymentRepository, PaymentRepositoryError, ProductRepository, ProductRepositoryError,
    RoleRepository, RoleRepositoryError, SessionRepository, SessionRepositoryError,
    StockRepository, StockRepositoryError, UserRepository, UserRepositoryError,
};
pub use repositories::product::ProductFilter;

pub use sqlx::PgPool;
