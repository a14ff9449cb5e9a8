use std::sync::OnceLock;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus exporter and register all market metrics.
/// Safe to call more than once; later calls return the first handle.
pub fn init_metrics() -> PrometheusHandle {
    HANDLE
        .get_or_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Global metrics recorder already set, using a detached one");
                    PrometheusBuilder::new().build_recorder().handle()
                });

            // Pre-register so they appear before the first increment.
            counter!("events_activated_total").absolute(0);
            counter!("purchases_total").absolute(0);
            counter!("market_crashes_total").absolute(0);
            counter!("stock_decays_total").absolute(0);

            gauge!("market_open").set(0.0);

            handle
        })
        .clone()
}
