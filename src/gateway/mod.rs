// ============================================================================
// Gateway Layer - Abstract Persistence Contracts
// ============================================================================
//
// The data-source traits below are the external collaborator boundary: the
// concrete persistence implementation (ORM, DynamoDB, ...) lives outside this
// crate and is injected into the use cases as `Arc<dyn ...DataSource>`.
//
// The in-memory implementations back the local wiring binary and the
// use-case tests.
//
// ============================================================================

mod memory;

pub use memory::{InMemoryKitchenOrderDataSource, InMemoryOrderStatusDataSource};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::order::{KitchenOrder, OrderStatus};

/// Filter accepted by `KitchenOrderDataSource::find_all`.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    pub created_at_from: Option<DateTime<Utc>>,
    pub created_at_to: Option<DateTime<Utc>>,
    pub status_id: Option<String>,
}

/// Persistence operations for the `KitchenOrder` aggregate.
#[async_trait]
pub trait KitchenOrderDataSource: Send + Sync {
    async fn insert(&self, order: &KitchenOrder) -> Result<()>;

    async fn find_by_id(&self, id: &str) -> Result<Option<KitchenOrder>>;

    async fn find_all(&self, filter: &OrderFilter) -> Result<Vec<KitchenOrder>>;

    async fn update(&self, order: &KitchenOrder) -> Result<()>;
}

/// Read operations for the seeded `OrderStatus` reference data.
#[async_trait]
pub trait OrderStatusDataSource: Send + Sync {
    async fn find_by_id(&self, id: &str) -> Result<Option<OrderStatus>>;

    async fn find_all(&self) -> Result<Vec<OrderStatus>>;
}
