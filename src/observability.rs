use std::net::SocketAddr;

// ── RED metrics (request-driven) ────────────────────────────────

/// Counter: total API requests handled. Labels: op, status.
pub const REQUESTS_TOTAL: &str = "cardpool_requests_total";

/// Histogram: request latency in seconds. Labels: op.
pub const REQUEST_DURATION_SECONDS: &str = "cardpool_request_duration_seconds";

/// Counter: ranges committed in full.
pub const BOOKINGS_COMMITTED_TOTAL: &str = "cardpool_bookings_committed_total";

/// Counter: commits that came back partial or empty (lost a race).
pub const BOOKING_CONFLICTS_TOTAL: &str = "cardpool_booking_conflicts_total";

// ── USE metrics (resource utilization) ──────────────────────────

/// Gauge: number of city pools in the store.
pub const POOLS_ACTIVE: &str = "cardpool_pools_active";

/// Histogram: WAL group-commit flush duration in seconds.
pub const WAL_FLUSH_DURATION_SECONDS: &str = "cardpool_wal_flush_duration_seconds";

/// Histogram: WAL group-commit batch size (events per flush).
pub const WAL_FLUSH_BATCH_SIZE: &str = "cardpool_wal_flush_batch_size";

/// Install Prometheus metrics exporter on the given port. No-op if port is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
