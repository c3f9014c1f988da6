//! Payment processing module

pub mod api;

pub use api::{PaymentsApiState, payments_api_router};
