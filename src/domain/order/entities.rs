use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::errors::KitchenOrderError;
use super::value_objects::{OrderItem, OrderStatus, Slug};

// ============================================================================
// KitchenOrder Aggregate - Domain Logic
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KitchenOrder {
    // Identity
    pub id: String,
    pub order_id: String,
    pub customer_id: Option<String>,

    // Current State
    pub amount: Decimal,
    pub slug: Slug,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,

    // Audit Trail
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl KitchenOrder {
    pub fn new(
        id: impl Into<String>,
        order_id: impl Into<String>,
        customer_id: Option<String>,
        slug: Slug,
        status: OrderStatus,
        items: Vec<OrderItem>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, KitchenOrderError> {
        let id = id.into();
        let order_id = order_id.into();

        if id.is_empty() || order_id.is_empty() {
            return Err(KitchenOrderError::InvalidKitchenOrderData(
                "kitchen order identifiers cannot be empty".to_string(),
            ));
        }

        Ok(Self {
            id,
            order_id,
            customer_id,
            amount: Decimal::ZERO,
            slug,
            status,
            items,
            created_at,
            updated_at: None,
        })
    }

    /// Recompute `amount` from the current item list.
    ///
    /// The amount is NOT kept in sync automatically; callers must invoke this
    /// after mutating `items`.
    pub fn calc_total_amount(&mut self) {
        self.amount = self.items.iter().map(OrderItem::subtotal).sum();
    }

    /// Replace the status and stamp `updated_at`.
    ///
    /// No transition graph is enforced: any status may move to any other.
    pub fn set_status(&mut self, status: OrderStatus) {
        self.status = status;
        self.updated_at = Some(Utc::now());
    }

    /// Structural zero-value check, used by the find-by-id path to classify
    /// an "empty" persistence result as not-found.
    pub fn is_empty(&self) -> bool {
        self.id.is_empty() && self.order_id.is_empty()
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
