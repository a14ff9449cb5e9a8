use std::sync::Arc;

use tokio::time::{interval, Duration};

use crate::engine::Market;

/// Periodically run the no-purchase decay over every in-stock item, so idle
/// stocks lose value even when nobody is viewing the listing.
pub async fn run_decay_sweeper(market: Arc<Market>, interval_secs: u64) {
    let mut ticker = interval(Duration::from_secs(interval_secs.max(1)));

    loop {
        ticker.tick().await;

        match market.activations().is_open().await {
            Ok(true) => {}
            Ok(false) => {
                tracing::debug!("Decay sweeper: market closed");
                continue;
            }
            Err(e) => {
                tracing::error!(error = %e, "Decay sweeper: failed to read session");
                continue;
            }
        }

        match market.decay().sweep().await {
            Ok(outcomes) => {
                let recorded = outcomes.iter().filter(|o| o.outcome.is_recorded()).count();
                tracing::debug!(checked = outcomes.len(), recorded, "Decay sweep complete");
            }
            Err(e) => tracing::error!(error = %e, "Decay sweep failed"),
        }
    }
}
