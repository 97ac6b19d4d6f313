use std::sync::Arc;

use anyhow::Result;

use crate::domain::order::{KitchenOrder, KitchenOrderError};
use crate::gateway::{KitchenOrderDataSource, OrderStatusDataSource};

// ============================================================================
// Update Kitchen Order Use Case
// ============================================================================

pub struct UpdateKitchenOrderUseCase {
    orders: Arc<dyn KitchenOrderDataSource>,
    statuses: Arc<dyn OrderStatusDataSource>,
}

impl UpdateKitchenOrderUseCase {
    pub fn new(
        orders: Arc<dyn KitchenOrderDataSource>,
        statuses: Arc<dyn OrderStatusDataSource>,
    ) -> Self {
        Self { orders, statuses }
    }

    pub async fn execute(&self, id: &str, status_id: &str) -> Result<KitchenOrder> {
        if id.is_empty() {
            return Err(KitchenOrderError::InvalidKitchenOrderData(
                "kitchen order id cannot be empty".to_string(),
            )
            .into());
        }

        let mut order = self
            .orders
            .find_by_id(id)
            .await?
            .filter(|o| !o.is_empty())
            .ok_or(KitchenOrderError::KitchenOrderNotFound)?;

        let status = self
            .statuses
            .find_by_id(status_id)
            .await?
            .ok_or(KitchenOrderError::OrderStatusNotFound)?;

        order.set_status(status);

        // Persistence failures on the update path collapse into the generic
        // invalid-data error; the original cause is only logged.
        if let Err(e) = self.orders.update(&order).await {
            tracing::error!(
                kitchen_order_id = %order.id,
                error = %e,
                "Failed to persist kitchen order update"
            );
            return Err(KitchenOrderError::InvalidKitchenOrderData(
                "could not update kitchen order".to_string(),
            )
            .into());
        }

        tracing::info!(
            kitchen_order_id = %order.id,
            status = %order.status.name,
            "Kitchen order status updated"
        );

        Ok(order)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
