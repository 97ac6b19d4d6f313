// ============================================================================
// Kitchen Order Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum KitchenOrderError {
    #[error("Order status not found")]
    OrderStatusNotFound,

    #[error("Kitchen order not found")]
    KitchenOrderNotFound,

    #[error("Invalid kitchen order data: {0}")]
    InvalidKitchenOrderData(String),
}
