use std::sync::Arc;

use fandango::api::router::create_router;
use fandango::config::AppConfig;
use fandango::db::{self, MemoryStore, PgStore, Store};
use fandango::engine::{Market, SystemClock};
use fandango::services::decay_sweeper::run_decay_sweeper;
use fandango::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;
    init_tracing(config.log_json);

    let addr = config.addr();

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let pool = db::init_pool(url, config.db_max_connections).await?;
            db::run_migrations(&pool).await?;
            tracing::info!("Database connected, migrations applied");
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, market state is held in memory and lost on exit");
            Arc::new(MemoryStore::new())
        }
    };

    if config.api_token.is_none() {
        tracing::warn!("API_TOKEN not set, admin routes are unauthenticated");
    }

    let market = Arc::new(Market::with_seed(store, Arc::new(SystemClock), config.rng_seed));

    if config.decay_sweep_interval_secs > 0 {
        let sweeper_market = market.clone();
        let interval_secs = config.decay_sweep_interval_secs;
        tokio::spawn(async move {
            run_decay_sweeper(sweeper_market, interval_secs).await;
        });
        tracing::info!(interval_secs, "Decay sweeper spawned");
    } else {
        tracing::info!("Decay sweeper disabled (DECAY_SWEEP_INTERVAL_SECS=0)");
    }

    let state = AppState {
        market,
        config,
        metrics_handle: fandango::metrics::init_metrics(),
    };
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {addr}");
    axum::serve(listener, router).await?;

    Ok(())
}

fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }
}
