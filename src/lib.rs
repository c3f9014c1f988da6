//! Shopkeeper - E-commerce Administrative Backend
//!
//! REST API for catalog, inventory, order and payment administration,
//! backed by PostgreSQL. Stock levels are never stored directly: they are
//! derived from an append-only ledger of stock transactions.

pub mod app;
pub mod core;
