use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::errors::KitchenOrderError;

// ============================================================================
// Kitchen Order Value Objects
// ============================================================================

const MIN_TEXT_LEN: usize = 3;
const MAX_TEXT_LEN: usize = 100;

/// Well-known order status identifiers, seeded out-of-band.
/// The core treats them as opaque stable values.
pub mod status_id {
    pub const RECEIVED: &str = "5b2ca90b-90ba-4bc3-a7b9-8e10d7eebd04";
    pub const PREPARING: &str = "f3bd2d16-2ea3-4b30-8b4c-29b3fdbcd3cb";
    pub const READY: &str = "20d487e2-0384-4b5e-8b0f-1a2b9d0a0aef";
    pub const FINISHED: &str = "8a3edc2f-c5c1-42d8-b5cb-4f9b3e4d17ea";
}

/// Daily-sequential display code shown to the kitchen staff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slug(String);

impl Slug {
    pub fn new(slug: impl Into<String>) -> Result<Self, KitchenOrderError> {
        let slug = slug.into();
        if slug.len() < MIN_TEXT_LEN || slug.len() > MAX_TEXT_LEN {
            return Err(KitchenOrderError::InvalidKitchenOrderData(format!(
                "slug must be between {} and {} characters, got {}",
                MIN_TEXT_LEN,
                MAX_TEXT_LEN,
                slug.len()
            )));
        }
        Ok(Self(slug))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Slug {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Human-readable status name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Name(String);

impl Name {
    pub fn new(name: impl Into<String>) -> Result<Self, KitchenOrderError> {
        let name = name.into();
        if name.len() < MIN_TEXT_LEN || name.len() > MAX_TEXT_LEN {
            return Err(KitchenOrderError::InvalidKitchenOrderData(format!(
                "name must be between {} and {} characters, got {}",
                MIN_TEXT_LEN,
                MAX_TEXT_LEN,
                name.len()
            )));
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Order status: a stable well-known identifier plus its display name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderStatus {
    pub id: String,
    pub name: Name,
}

impl OrderStatus {
    pub fn new(id: impl Into<String>, name: Name) -> Self {
        Self { id: id.into(), name }
    }
}

/// A single line item owned by a kitchen order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl OrderItem {
    pub fn new(
        id: impl Into<String>,
        order_id: impl Into<String>,
        product_id: impl Into<String>,
        quantity: i32,
        unit_price: Decimal,
    ) -> Result<Self, KitchenOrderError> {
        let id = id.into();
        let order_id = order_id.into();
        let product_id = product_id.into();

        if id.is_empty() || order_id.is_empty() || product_id.is_empty() {
            return Err(KitchenOrderError::InvalidKitchenOrderData(
                "order item identifiers cannot be empty".to_string(),
            ));
        }
        if quantity <= 0 {
            return Err(KitchenOrderError::InvalidKitchenOrderData(format!(
                "order item quantity must be positive, got {}",
                quantity
            )));
        }
        if unit_price < Decimal::ZERO {
            return Err(KitchenOrderError::InvalidKitchenOrderData(format!(
                "order item unit price cannot be negative, got {}",
                unit_price
            )));
        }

        Ok(Self {
            id,
            order_id,
            product_id,
            quantity,
            unit_price,
        })
    }

    pub fn subtotal(&self) -> Decimal {
        Decimal::from(self.quantity) * self.unit_price
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
