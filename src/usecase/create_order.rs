use std::sync::Arc;

use anyhow::Result;
use chrono::{Local, NaiveTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::order::value_objects::status_id;
use crate::domain::order::{KitchenOrder, KitchenOrderError, OrderItem, Slug};
use crate::gateway::{KitchenOrderDataSource, OrderFilter, OrderStatusDataSource};

// ============================================================================
// Create Kitchen Order Use Case
// ============================================================================

/// Item payload accepted by the create operation, before domain validation.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone)]
pub struct CreateKitchenOrderInput {
    pub order_id: String,
    pub customer_id: Option<String>,
    pub items: Vec<NewOrderItem>,
}

pub struct CreateKitchenOrderUseCase {
    orders: Arc<dyn KitchenOrderDataSource>,
    statuses: Arc<dyn OrderStatusDataSource>,
}

impl CreateKitchenOrderUseCase {
    pub fn new(
        orders: Arc<dyn KitchenOrderDataSource>,
        statuses: Arc<dyn OrderStatusDataSource>,
    ) -> Self {
        Self { orders, statuses }
    }

    pub async fn execute(&self, input: CreateKitchenOrderInput) -> Result<KitchenOrder> {
        let received = self
            .statuses
            .find_by_id(status_id::RECEIVED)
            .await?
            .ok_or(KitchenOrderError::OrderStatusNotFound)?;

        let slug = self.next_slug().await?;
        let id = Uuid::new_v4().to_string();

        let mut items = Vec::with_capacity(input.items.len());
        for item in input.items {
            items.push(OrderItem::new(
                Uuid::new_v4().to_string(),
                id.clone(),
                item.product_id,
                item.quantity,
                item.unit_price,
            )?);
        }

        let mut order = KitchenOrder::new(
            id,
            input.order_id,
            input.customer_id,
            slug,
            received,
            items,
            Utc::now(),
        )?;
        order.calc_total_amount();

        self.orders.insert(&order).await?;

        tracing::info!(
            kitchen_order_id = %order.id,
            order_id = %order.order_id,
            slug = %order.slug,
            "Kitchen order created"
        );

        Ok(order)
    }

    /// Compute the next daily-sequential slug: the zero-padded 3-digit count
    /// of orders created since local midnight, plus one.
    async fn next_slug(&self) -> Result<Slug> {
        let now = Local::now();
        let start_of_day = now
            .date_naive()
            .and_time(NaiveTime::MIN)
            .and_local_timezone(Local)
            .earliest()
            .unwrap_or(now);

        let filter = OrderFilter {
            created_at_from: Some(start_of_day.with_timezone(&Utc)),
            created_at_to: Some(now.with_timezone(&Utc)),
            status_id: None,
        };
        let todays_orders = self.orders.find_all(&filter).await?;

        Ok(Slug::new(format!("{:03}", todays_orders.len() + 1))?)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{InMemoryKitchenOrderDataSource, InMemoryOrderStatusDataSource};

    fn use_case(
        orders: Arc<InMemoryKitchenOrderDataSource>,
    ) -> CreateKitchenOrderUseCase {
        CreateKitchenOrderUseCase::new(orders, Arc::new(InMemoryOrderStatusDataSource::seeded()))
    }

    fn input(order_id: &str) -> CreateKitchenOrderInput {
        CreateKitchenOrderInput {
            order_id: order_id.to_string(),
            customer_id: None,
            items: vec![],
        }
    }

    #[tokio::test]
    async fn test_first_order_of_the_day_gets_slug_001() {
        let orders = Arc::new(InMemoryKitchenOrderDataSource::new());
        let uc = use_case(orders);

        let order = uc.execute(input("O1")).await.unwrap();

        assert_eq!(order.slug.as_str(), "001");
        assert_eq!(order.status.id, status_id::RECEIVED);
        assert_eq!(order.order_id, "O1");
        assert!(order.updated_at.is_none());
    }

    #[tokio::test]
    async fn test_slug_counts_prior_orders_today() {
        let orders = Arc::new(InMemoryKitchenOrderDataSource::new());
        let uc = use_case(orders.clone());

        uc.execute(input("O1")).await.unwrap();
        uc.execute(input("O2")).await.unwrap();
        let third = uc.execute(input("O3")).await.unwrap();

        assert_eq!(third.slug.as_str(), "003");
    }

    #[tokio::test]
    async fn test_amount_computed_from_items() {
        let orders = Arc::new(InMemoryKitchenOrderDataSource::new());
        let uc = use_case(orders);

        let order = uc
            .execute(CreateKitchenOrderInput {
                order_id: "O1".to_string(),
                customer_id: Some("C1".to_string()),
                items: vec![
                    NewOrderItem {
                        product_id: "burger".to_string(),
                        quantity: 2,
                        unit_price: Decimal::new(999, 2),
                    },
                    NewOrderItem {
                        product_id: "fries".to_string(),
                        quantity: 1,
                        unit_price: Decimal::new(350, 2),
                    },
                ],
            })
            .await
            .unwrap();

        // 2 x 9.99 + 3.50 = 23.48
        assert_eq!(order.amount, Decimal::new(2348, 2));
        assert_eq!(order.items.len(), 2);
        assert!(order.items.iter().all(|i| i.order_id == order.id));
    }

    #[tokio::test]
    async fn test_invalid_item_propagates_and_nothing_persisted() {
        let orders = Arc::new(InMemoryKitchenOrderDataSource::new());
        let uc = use_case(orders.clone());

        let result = uc
            .execute(CreateKitchenOrderInput {
                order_id: "O1".to_string(),
                customer_id: None,
                items: vec![NewOrderItem {
                    product_id: "burger".to_string(),
                    quantity: 0,
                    unit_price: Decimal::ONE,
                }],
            })
            .await;

        let err = result.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<KitchenOrderError>(),
            Some(KitchenOrderError::InvalidKitchenOrderData(_))
        ));

        let stored = orders.find_all(&OrderFilter::default()).await.unwrap();
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn test_missing_received_status_fails() {
        struct EmptyStatuses;

        #[async_trait::async_trait]
        impl OrderStatusDataSource for EmptyStatuses {
            async fn find_by_id(
                &self,
                _id: &str,
            ) -> Result<Option<crate::domain::order::OrderStatus>> {
                Ok(None)
            }

            async fn find_all(&self) -> Result<Vec<crate::domain::order::OrderStatus>> {
                Ok(vec![])
            }
        }

        let uc = CreateKitchenOrderUseCase::new(
            Arc::new(InMemoryKitchenOrderDataSource::new()),
            Arc::new(EmptyStatuses),
        );

        let err = uc.execute(input("O1")).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<KitchenOrderError>(),
            Some(KitchenOrderError::OrderStatusNotFound)
        ));
    }
}
