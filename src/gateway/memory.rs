use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::order::value_objects::status_id;
use crate::domain::order::{KitchenOrder, Name, OrderStatus};

use super::{KitchenOrderDataSource, OrderFilter, OrderStatusDataSource};

// ============================================================================
// In-Memory Data Sources
// ============================================================================
//
// - No IO
// - Best-effort fidelity to the persistence contract
// - Used by the local wiring binary and the use-case tests
//
// ============================================================================

#[derive(Default)]
pub struct InMemoryKitchenOrderDataSource {
    orders: Mutex<Vec<KitchenOrder>>,
}

impl InMemoryKitchenOrderDataSource {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KitchenOrderDataSource for InMemoryKitchenOrderDataSource {
    async fn insert(&self, order: &KitchenOrder) -> Result<()> {
        self.orders.lock().await.push(order.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<KitchenOrder>> {
        let orders = self.orders.lock().await;
        Ok(orders.iter().find(|o| o.id == id).cloned())
    }

    async fn find_all(&self, filter: &OrderFilter) -> Result<Vec<KitchenOrder>> {
        let orders = self.orders.lock().await;
        Ok(orders
            .iter()
            .filter(|o| {
                filter
                    .created_at_from
                    .map_or(true, |from| o.created_at >= from)
                    && filter.created_at_to.map_or(true, |to| o.created_at <= to)
                    && filter
                        .status_id
                        .as_ref()
                        .map_or(true, |status| o.status.id == *status)
            })
            .cloned()
            .collect())
    }

    async fn update(&self, order: &KitchenOrder) -> Result<()> {
        let mut orders = self.orders.lock().await;
        match orders.iter_mut().find(|o| o.id == order.id) {
            Some(existing) => {
                *existing = order.clone();
                Ok(())
            }
            None => anyhow::bail!("kitchen order {} does not exist", order.id),
        }
    }
}

pub struct InMemoryOrderStatusDataSource {
    statuses: Vec<OrderStatus>,
}

impl InMemoryOrderStatusDataSource {
    /// Seed the four well-known statuses, mirroring what the out-of-band
    /// database seeding provides in production.
    pub fn seeded() -> Self {
        let statuses = [
            (status_id::RECEIVED, "RECEIVED"),
            (status_id::PREPARING, "PREPARING"),
            (status_id::READY, "READY"),
            (status_id::FINISHED, "FINISHED"),
        ]
        .into_iter()
        .filter_map(|(id, name)| Name::new(name).ok().map(|n| OrderStatus::new(id, n)))
        .collect();

        Self { statuses }
    }
}

#[async_trait]
impl OrderStatusDataSource for InMemoryOrderStatusDataSource {
    async fn find_by_id(&self, id: &str) -> Result<Option<OrderStatus>> {
        Ok(self.statuses.iter().find(|s| s.id == id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<OrderStatus>> {
        Ok(self.statuses.clone())
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
