use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

mod config;
mod logging;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = config::WebhookdConfig::load()?;

    logging::init_logging(&config.logging);

    if config.metrics.enabled {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let addr: std::net::SocketAddr = config.metrics.listen_addr.parse()?;
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .expect("failed to install Prometheus recorder");
        info!(addr = %config.metrics.listen_addr, "Prometheus metrics endpoint listening");
    }

    info!("Starting webhookd v{}", env!("CARGO_PKG_VERSION"));

    let db_config = persistence::db::DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        min_connections: config.database.min_connections,
        connect_timeout_secs: config.database.connect_timeout_secs,
        idle_timeout_secs: config.database.idle_timeout_secs,
    };
    let pool = persistence::db::create_pool(&db_config).await?;

    let registry = persistence::repositories::WebhookRepository::new(pool.clone());
    let history = persistence::repositories::WebhookDeliveryRepository::new(pool.clone());
    let deliverer = engine::HttpDeliverer::new();
    let queue = Arc::new(engine::PriorityQueue::new(
        config.queue.max_concurrent,
        Duration::from_millis(config.queue.tick_interval_ms),
    ));

    let dispatcher = Arc::new(engine::Dispatcher::new(registry, history, deliverer, Arc::clone(&queue)));
    queue
        .set_processor(Arc::new(engine::DispatcherProcessor(Arc::clone(&dispatcher))))
        .await;

    info!(
        max_concurrent = config.queue.max_concurrent,
        tick_interval_ms = config.queue.tick_interval_ms,
        "Starting delivery queue"
    );
    queue.start();

    tokio::signal::ctrl_c().await.expect("failed to install CTRL+C signal handler");
    info!("Received shutdown signal");

    queue.stop();
    info!("webhookd shutdown complete");

    Ok(())
}
