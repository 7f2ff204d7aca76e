use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use cardpool::http;
use cardpool::service::AllocationService;
use cardpool::store::PoolStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let metrics_port: Option<u16> = std::env::var("CARDPOOL_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok());
    cardpool::observability::init(metrics_port);

    let port = std::env::var("CARDPOOL_PORT").unwrap_or_else(|_| "5000".into());
    let bind = std::env::var("CARDPOOL_BIND").unwrap_or_else(|_| "0.0.0.0".into());
    let data_dir = std::env::var("CARDPOOL_DATA_DIR").unwrap_or_else(|_| "./data".into());
    let compact_threshold: u64 = std::env::var("CARDPOOL_COMPACT_THRESHOLD")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1000);

    // Ensure data directory exists
    std::fs::create_dir_all(&data_dir)?;
    let wal_path = PathBuf::from(&data_dir).join("cardpool.wal");

    let store = Arc::new(PoolStore::open(&wal_path)?);

    let compactor_store = store.clone();
    tokio::spawn(async move {
        cardpool::compactor::run_compactor(compactor_store, compact_threshold).await;
    });

    let service = Arc::new(AllocationService::new(store.clone()));
    let app = http::router(service);

    let addr = format!("{bind}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!("cardpool listening on {addr}");
    info!("  data_dir: {data_dir}");
    info!("  pools: {}", store.pool_count());
    info!("  compact_threshold: {compact_threshold}");
    info!(
        "  metrics: {}",
        metrics_port.map_or("disabled".to_string(), |p| format!(
            "http://0.0.0.0:{p}/metrics"
        ))
    );

    // Stop accepting on SIGTERM/ctrl-c; axum drains in-flight requests.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("cardpool stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
    info!("shutdown signal received");
}
