use std::sync::Arc;

use anyhow::Result;

use crate::domain::order::{KitchenOrder, OrderStatus};
use crate::gateway::{KitchenOrderDataSource, OrderFilter, OrderStatusDataSource};

use super::{
    CreateKitchenOrderInput, CreateKitchenOrderUseCase, FindAllKitchenOrdersUseCase,
    FindAllOrderStatusUseCase, FindKitchenOrderByIdUseCase, UpdateKitchenOrderUseCase,
};

// ============================================================================
// Kitchen Order Controller
// ============================================================================
//
// Bundles the use cases behind one handle so the consumer (and any other
// inbound adapter) only carries a single collaborator. Constructed from
// injected data sources; never a process-wide singleton.
//
// ============================================================================

pub struct KitchenOrderController {
    create: CreateKitchenOrderUseCase,
    update: UpdateKitchenOrderUseCase,
    find_all: FindAllKitchenOrdersUseCase,
    find_by_id: FindKitchenOrderByIdUseCase,
    find_statuses: FindAllOrderStatusUseCase,
}

impl KitchenOrderController {
    pub fn new(
        orders: Arc<dyn KitchenOrderDataSource>,
        statuses: Arc<dyn OrderStatusDataSource>,
    ) -> Self {
        Self {
            create: CreateKitchenOrderUseCase::new(orders.clone(), statuses.clone()),
            update: UpdateKitchenOrderUseCase::new(orders.clone(), statuses.clone()),
            find_all: FindAllKitchenOrdersUseCase::new(orders.clone()),
            find_by_id: FindKitchenOrderByIdUseCase::new(orders),
            find_statuses: FindAllOrderStatusUseCase::new(statuses),
        }
    }

    pub async fn create_order(&self, input: CreateKitchenOrderInput) -> Result<KitchenOrder> {
        self.create.execute(input).await
    }

    pub async fn update_order(&self, id: &str, status_id: &str) -> Result<KitchenOrder> {
        self.update.execute(id, status_id).await
    }

    pub async fn find_all_orders(&self, filter: &OrderFilter) -> Result<Vec<KitchenOrder>> {
        self.find_all.execute(filter).await
    }

    pub async fn find_order_by_id(&self, id: &str) -> Result<KitchenOrder> {
        self.find_by_id.execute(id).await
    }

    pub async fn find_all_statuses(&self) -> Result<Vec<OrderStatus>> {
        self.find_statuses.execute().await
    }
}
