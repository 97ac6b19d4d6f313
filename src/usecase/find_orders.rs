use std::sync::Arc;

use anyhow::Result;

use crate::domain::order::{KitchenOrder, KitchenOrderError, OrderStatus};
use crate::gateway::{KitchenOrderDataSource, OrderFilter, OrderStatusDataSource};

// ============================================================================
// Read Use Cases - Thin Pass-Through to the Gateways
// ============================================================================

pub struct FindAllKitchenOrdersUseCase {
    orders: Arc<dyn KitchenOrderDataSource>,
}

impl FindAllKitchenOrdersUseCase {
    pub fn new(orders: Arc<dyn KitchenOrderDataSource>) -> Self {
        Self { orders }
    }

    pub async fn execute(&self, filter: &OrderFilter) -> Result<Vec<KitchenOrder>> {
        self.orders.find_all(filter).await
    }
}

pub struct FindKitchenOrderByIdUseCase {
    orders: Arc<dyn KitchenOrderDataSource>,
}

impl FindKitchenOrderByIdUseCase {
    pub fn new(orders: Arc<dyn KitchenOrderDataSource>) -> Self {
        Self { orders }
    }

    /// A structurally-empty aggregate counts as not-found even when the data
    /// source reported success.
    pub async fn execute(&self, id: &str) -> Result<KitchenOrder> {
        let order = self
            .orders
            .find_by_id(id)
            .await?
            .filter(|o| !o.is_empty())
            .ok_or(KitchenOrderError::KitchenOrderNotFound)?;

        Ok(order)
    }
}

pub struct FindAllOrderStatusUseCase {
    statuses: Arc<dyn OrderStatusDataSource>,
}

impl FindAllOrderStatusUseCase {
    pub fn new(statuses: Arc<dyn OrderStatusDataSource>) -> Self {
        Self { statuses }
    }

    pub async fn execute(&self) -> Result<Vec<OrderStatus>> {
        self.statuses.find_all().await
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
