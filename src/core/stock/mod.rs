//! Stock ledger module

pub mod api;

pub use api::{StockApiState, stock_api_router};
