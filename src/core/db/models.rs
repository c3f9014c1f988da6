//! Database models for Shopkeeper
//!
//! This module defines the database entity structs that map to PostgreSQL
//! tables, plus the create/update DTOs and API response shapes built from
//! them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Helper module for deserializing Option<Option<T>> where:
/// - Missing field -> None (don't update)
/// - Field with null -> Some(None) (set to null)
/// - Field with value -> Some(Some(value)) (set to value)
pub mod double_option {
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
    where
        T: Deserialize<'de>,
        D: Deserializer<'de>,
    {
        // Only called when the field is present, so wrap in Some()
        Option::<T>::deserialize(deserializer).map(Some)
    }
}

// ============================================================================
// User / Role / Permission
// ============================================================================

/// User entity representing an admin-panel account
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_active: bool,
    pub role_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// User data for creation (plain password, hashed by the repository)
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role_id: Option<Uuid>,
}

/// User data for updates
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateUser {
    pub email: Option<String>,
    pub password: Option<String>,
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub role_id: Option<Option<Uuid>>,
}

/// User without sensitive data (for API responses)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub is_active: bool,
    pub role_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            is_active: user.is_active,
            role_id: user.role_id,
            created_at: user.created_at,
        }
    }
}

/// Role entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
}

/// Permission entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Permission {
    pub id: Uuid,
    pub name: String,
}

/// Role data for creation
#[derive(Debug, Clone, Deserialize)]
pub struct CreateRole {
    pub name: String,
    #[serde(default)]
    pub permission_ids: Vec<Uuid>,
}

/// Role data for updates
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateRole {
    pub name: Option<String>,
    pub permission_ids: Option<Vec<Uuid>>,
}

/// Role with its resolved permissions (for API responses)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleResponse {
    pub id: Uuid,
    pub name: String,
    pub permissions: Vec<Permission>,
}

// ============================================================================
// Session
// ============================================================================

/// Refresh-token session; token_hash is the SHA-256 hex of the refresh JWT
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Category
// ============================================================================

/// Category entity for grouping products
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Category data for creation
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCategory {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Category data for updates
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateCategory {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub description: Option<Option<String>>,
}

// ============================================================================
// Product
// ============================================================================

/// Product entity. Current stock is NOT a column: it is derived from the
/// stock ledger (new_stock of the latest transaction).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub currency: String,
    pub is_active: bool,
    pub category_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Product data for creation
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProduct {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub category_id: Option<Uuid>,
}

fn default_currency() -> String {
    "USD".to_string()
}

fn default_true() -> bool {
    true
}

/// Product data for updates
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateProduct {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub description: Option<Option<String>>,
    pub price: Option<f64>,
    pub currency: Option<String>,
    pub is_active: Option<bool>,
    #[serde(default, deserialize_with = "double_option::deserialize")]
    pub category_id: Option<Option<Uuid>>,
}

/// Product with derived stock and resolved category name (for API responses)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub price: f64,
    pub currency: String,
    pub is_active: bool,
    pub category_id: Option<Uuid>,
    pub category_name: Option<String>,
    pub stock: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ============================================================================
// Stock ledger
// ============================================================================

/// Kind of a stock ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum StockTransactionType {
    /// First entry for a product
    Init,
    /// Positive adjustment (restock, cancelled order)
    In,
    /// Negative adjustment (manual stock-out, confirmed order)
    Out,
}

impl std::fmt::Display for StockTransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StockTransactionType::Init => write!(f, "init"),
            StockTransactionType::In => write!(f, "in"),
            StockTransactionType::Out => write!(f, "out"),
        }
    }
}

/// Append-only stock ledger row. Invariant: new_stock = old_stock + change,
/// and old_stock equals the previous row's new_stock for the same product.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StockTransaction {
    pub id: Uuid,
    pub seq: i64,
    pub product_id: Uuid,
    pub old_stock: i64,
    pub change: i64,
    pub new_stock: i64,
    pub transaction_type: StockTransactionType,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Order
// ============================================================================

/// Order lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Paid,
    Shipped,
    Cancelled,
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatus::Pending => write!(f, "pending"),
            OrderStatus::Confirmed => write!(f, "confirmed"),
            OrderStatus::Paid => write!(f, "paid"),
            OrderStatus::Shipped => write!(f, "shipped"),
            OrderStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Order entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub shipping_address: String,
    pub payment_method: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
}

/// Order line item; price is the unit price captured at order time
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i64,
    pub price: f64,
    pub total_price: f64,
}

/// Item of a new order
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderItem {
    pub product_id: Uuid,
    pub quantity: i64,
}

/// Order data for creation
#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrder {
    pub customer_id: Uuid,
    pub shipping_address: String,
    pub payment_method: String,
    pub items: Vec<CreateOrderItem>,
}

/// Order data for updates
#[derive(Debug, Clone, Deserialize, Default)]
pub struct UpdateOrder {
    pub shipping_address: Option<String>,
    pub payment_method: Option<String>,
}

/// Order line item with resolved product name and current derived stock
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: Option<String>,
    pub quantity: i64,
    pub price: f64,
    pub total_price: f64,
    pub current_stock: Option<i64>,
}

/// Full order representation with items and totals
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResponse {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub shipping_address: String,
    pub payment_method: String,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub confirmed_at: Option<DateTime<Utc>>,
    pub items: Vec<OrderItemResponse>,
    pub total_amount: f64,
}

// ============================================================================
// Payment
// ============================================================================

/// Payment lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type, Default)]
#[sqlx(type_name = "VARCHAR", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Completed,
    Failed,
    Refunded,
    Cancelled,
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Completed => write!(f, "completed"),
            PaymentStatus::Failed => write!(f, "failed"),
            PaymentStatus::Refunded => write!(f, "refunded"),
            PaymentStatus::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Payment method entity (cash, credit_card, ...)
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PaymentMethod {
    pub id: Uuid,
    pub name: String,
}

/// Payment entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub order_id: Uuid,
    pub payment_method_id: Uuid,
    pub amount: f64,
    pub currency: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payment data for creation
#[derive(Debug, Clone, Deserialize)]
pub struct CreatePayment {
    pub order_id: Uuid,
    pub payment_method_id: Uuid,
    pub amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_serialization() {
        assert_eq!(
            serde_json::to_string(&OrderStatus::Pending).unwrap(),
            r#""pending""#
        );
        assert_eq!(
            serde_json::to_string(&OrderStatus::Confirmed).unwrap(),
            r#""confirmed""#
        );
        assert_eq!(
            serde_json::to_string(&OrderStatus::Cancelled).unwrap(),
            r#""cancelled""#
        );
    }

    #[test]
    fn test_order_status_deserialization() {
        let status: OrderStatus = serde_json::from_str(r#""paid""#).unwrap();
        assert_eq!(status, OrderStatus::Paid);

        let status: OrderStatus = serde_json::from_str(r#""shipped""#).unwrap();
        assert_eq!(status, OrderStatus::Shipped);
    }

    #[test]
    fn test_order_status_display() {
        assert_eq!(OrderStatus::Pending.to_string(), "pending");
        assert_eq!(OrderStatus::Confirmed.to_string(), "confirmed");
        assert_eq!(OrderStatus::Paid.to_string(), "paid");
        assert_eq!(OrderStatus::Shipped.to_string(), "shipped");
        assert_eq!(OrderStatus::Cancelled.to_string(), "cancelled");
    }

    #[test]
    fn test_payment_status_round_trip() {
        for status in [
            PaymentStatus::Pending,
            PaymentStatus::Completed,
            PaymentStatus::Failed,
            PaymentStatus::Refunded,
            PaymentStatus::Cancelled,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            let back: PaymentStatus = serde_json::from_str(&json).unwrap();
            assert_eq!(back, status);
        }
    }

    #[test]
    fn test_stock_transaction_type_display() {
        assert_eq!(StockTransactionType::Init.to_string(), "init");
        assert_eq!(StockTransactionType::In.to_string(), "in");
        assert_eq!(StockTransactionType::Out.to_string(), "out");
    }

    #[test]
    fn test_user_response_hides_password_hash() {
        let user = User {
            id: Uuid::new_v4(),
            email: "admin@example.com".to_string(),
            password_hash: "$2b$12$secret".to_string(),
            is_active: true,
            role_id: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        // The entity itself must not leak the hash when serialized
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("password_hash"));
        assert!(!json.contains("$2b$12$secret"));

        let response: UserResponse = user.into();
        assert_eq!(response.email, "admin@example.com");
    }

    #[test]
    fn test_create_user_deserialization() {
        let json = r#"{"email": "a@b.com", "password": "secret1"}"#;
        let dto: CreateUser = serde_json::from_str(json).unwrap();
        assert_eq!(dto.email, "a@b.com");
        assert!(dto.role_id.is_none());
    }

    #[test]
    fn test_update_user_role_double_option() {
        // Missing field: don't touch the role
        let dto: UpdateUser = serde_json::from_str(r#"{"email": "x@y.com"}"#).unwrap();
        assert!(dto.role_id.is_none());

        // Explicit null: clear the role
        let dto: UpdateUser = serde_json::from_str(r#"{"role_id": null}"#).unwrap();
        assert_eq!(dto.role_id, Some(None));

        // Value: set the role
        let id = Uuid::new_v4();
        let dto: UpdateUser =
            serde_json::from_str(&format!(r#"{{"role_id": "{}"}}"#, id)).unwrap();
        assert_eq!(dto.role_id, Some(Some(id)));
    }

    #[test]
    fn test_create_product_defaults() {
        let json = r#"{"name": "Widget", "price": 9.99}"#;
        let dto: CreateProduct = serde_json::from_str(json).unwrap();
        assert_eq!(dto.currency, "USD");
        assert!(dto.is_active);
        assert!(dto.category_id.is_none());
    }

    #[test]
    fn test_update_product_category_double_option() {
        let dto: UpdateProduct = serde_json::from_str(r#"{"price": 5.0}"#).unwrap();
        assert!(dto.category_id.is_none());

        let dto: UpdateProduct = serde_json::from_str(r#"{"category_id": null}"#).unwrap();
        assert_eq!(dto.category_id, Some(None));
    }

    #[test]
    fn test_create_order_deserialization() {
        let product_id = Uuid::new_v4();
        let json = format!(
            r#"{{
                "customer_id": "{}",
                "shipping_address": "1 Main St",
                "payment_method": "cash",
                "items": [{{"product_id": "{}", "quantity": 2}}]
            }}"#,
            Uuid::new_v4(),
            product_id
        );

        let dto: CreateOrder = serde_json::from_str(&json).unwrap();
        assert_eq!(dto.items.len(), 1);
        assert_eq!(dto.items[0].product_id, product_id);
        assert_eq!(dto.items[0].quantity, 2);
    }

    #[test]
    fn test_create_payment_default_currency() {
        let json = format!(
            r#"{{"order_id": "{}", "payment_method_id": "{}", "amount": 10.5}}"#,
            Uuid::new_v4(),
            Uuid::new_v4()
        );
        let dto: CreatePayment = serde_json::from_str(&json).unwrap();
        assert_eq!(dto.currency, "USD");
        assert_eq!(dto.amount, 10.5);
    }
}
