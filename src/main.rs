use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kitchen_orders::config::AppConfig;
use kitchen_orders::consumer::KitchenOrderConsumer;
use kitchen_orders::gateway::{InMemoryKitchenOrderDataSource, InMemoryOrderStatusDataSource};
use kitchen_orders::messaging;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,kitchen_orders=debug")),
        )
        .init();

    tracing::info!("🚀 Starting kitchen order lifecycle service");

    let config = AppConfig::from_env();
    tracing::info!(broker = ?config.broker, "Configuration loaded");

    // === 1. Build and connect the configured broker backend ===
    let broker = messaging::build_broker(&config);
    broker.connect().await?;

    // === 2. Wire the data-source collaborators ===
    // The persistence implementation is an external collaborator; the
    // in-memory sources here back local runs and demos.
    let orders = Arc::new(InMemoryKitchenOrderDataSource::new());
    let statuses = Arc::new(InMemoryOrderStatusDataSource::seeded());

    // === 3. Start the consumer workers ===
    let ctx = CancellationToken::new();
    let consumer = KitchenOrderConsumer::new(broker.clone(), orders, statuses);
    consumer.start(ctx.clone()).await?;
    broker.start(ctx.clone()).await?;

    tracing::info!("✅ Consumer running, waiting for commands (ctrl-c to stop)");

    // === 4. Shut down gracefully on ctrl-c ===
    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");

    ctx.cancel();
    if let Err(e) = broker.stop().await {
        tracing::warn!(error = %e, "Broker stop failed");
    }
    broker.close().await?;

    tracing::info!("🎉 Shutdown complete");
    Ok(())
}
