//! Order fulfillment module

pub mod api;

pub use api::{OrdersApiState, orders_api_router};
