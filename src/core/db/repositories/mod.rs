//! Repository modules for database operations

pub mod category;
pub mod order;
pub mod payment;
pub mod product;
pub mod role;
pub mod session;
pub mod stock;
pub mod user;

pub use category::{CategoryRepository, CategoryRepositoryError};
pub use order::{OrderRepository, OrderRepositoryError};
pub use payment::{PaymentRepository, PaymentRepositoryError};
pub use product::{ProductRepository, ProductRepositoryError};
pub use role::{RoleRepository, RoleRepositoryError};
pub use session::{SessionRepository, SessionRepositoryError};
pub use stock::{StockRepository, StockRepositoryError};
pub use user::{UserRepository, UserRepositoryError};
