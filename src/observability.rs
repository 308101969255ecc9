use std::net::SocketAddr;

/// Counter: successfully committed reservations.
pub const RESERVATION_CREATE_TOTAL: &str = "motorpool_reservation_create_total";

/// Counter: creation requests that ended in rejection. Labels: reason.
pub const RESERVATION_CREATE_FAILED_TOTAL: &str = "motorpool_reservation_create_failed_total";

/// Counter: admission rejections from the rate-limit layers. Labels: layer.
pub const RATE_LIMIT_REJECTED_TOTAL: &str = "motorpool_rate_limit_rejected_total";

/// Gauge: circuit breaker state (0=CLOSED, 1=OPEN, 2=HALF_OPEN).
pub const CIRCUIT_BREAKER_STATE: &str = "motorpool_circuit_breaker_state";

/// Gauge: live slot semaphores in the local permit registry.
pub const LOCAL_SLOT_SEMAPHORES: &str = "motorpool_local_slot_semaphores";

/// Install the Prometheus metrics exporter on the given port. No-op if port
/// is None.
pub fn init(port: Option<u16>) {
    let Some(port) = port else { return };
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .expect("failed to install Prometheus metrics exporter");
    tracing::info!("metrics endpoint: http://0.0.0.0:{port}/metrics");
}
