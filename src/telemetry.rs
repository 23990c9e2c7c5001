use tracing_subscriber::EnvFilter;

/// `RUST_LOG` wins over `default_filter` when set.
pub fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .init();
}

#[cfg(feature = "metrics-exporter")]
pub fn init_metrics(addr: std::net::SocketAddr) -> anyhow::Result<()> {
    use anyhow::Context;
    use metrics_exporter_prometheus::PrometheusBuilder;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("installing prometheus exporter")?;

    tracing::info!(%addr, "Prometheus exporter listening on /metrics");
    metrics::gauge!("scanner_up").set(1.0);
    Ok(())
}

// Without the exporter the metrics macros record into the no-op recorder.
#[cfg(not(feature = "metrics-exporter"))]
pub fn init_metrics(addr: std::net::SocketAddr) -> anyhow::Result<()> {
    tracing::debug!(%addr, "Built without metrics-exporter, metrics are not exported");
    Ok(())
}
