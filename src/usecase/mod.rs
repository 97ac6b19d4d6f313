// ============================================================================
// Use-Case Layer - Application Operations
// ============================================================================
//
// One struct per application operation, each owning only the data-source
// contracts it needs. Collaborators are always injected through the
// constructor; there are no process-wide singletons.
//
// Error convention:
// - Business rule violations surface as `KitchenOrderError` (downcastable
//   through the `anyhow::Error` returned at the boundary).
// - Create-side persistence failures propagate unchanged.
// - Update-side persistence failures collapse into InvalidKitchenOrderData.
//
// ============================================================================

mod controller;
mod create_order;
mod find_orders;
mod update_order;

pub use controller::KitchenOrderController;
pub use create_order::{CreateKitchenOrderInput, CreateKitchenOrderUseCase, NewOrderItem};
pub use find_orders::{
    FindAllKitchenOrdersUseCase, FindAllOrderStatusUseCase, FindKitchenOrderByIdUseCase,
};
pub use update_order::UpdateKitchenOrderUseCase;
