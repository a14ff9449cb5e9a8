pub mod activation;
pub mod catalog;
pub mod clock;
pub mod crash;
pub mod decay;
pub mod events;
pub mod locks;
pub mod price;
pub mod purchase;
pub mod settings;

use std::sync::{Arc, Mutex};

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::db::Store;
use crate::errors::EngineResult;
use crate::models::StockSummary;

pub use activation::ActivationManager;
pub use catalog::Catalog;
pub use clock::{Clock, ManualClock, SystemClock};
pub use crash::MarketCrash;
pub use decay::NoPurchaseDecay;
pub use events::{EventRoll, EventScheduler};
pub use price::{PriceEngine, PriceOutcome, StockOutcome};
pub use purchase::{PurchaseDesk, PurchaseReceipt};
pub use settings::{MarketRules, SettingsProvider};

/// Random source shared by every component that draws numbers.
pub type SharedRng = Arc<Mutex<StdRng>>;

/// All market components wired against one store, clock and random source.
pub struct Market {
    store: Arc<dyn Store>,
    settings: Arc<SettingsProvider>,
    activations: Arc<ActivationManager>,
    prices: Arc<PriceEngine>,
    events: Arc<EventScheduler>,
    decay: Arc<NoPurchaseDecay>,
    crash: Arc<MarketCrash>,
    purchases: Arc<PurchaseDesk>,
    catalog: Arc<Catalog>,
}

impl Market {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>, rng: StdRng) -> Self {
        let rng: SharedRng = Arc::new(Mutex::new(rng));

        let settings = Arc::new(SettingsProvider::new(store.clone()));
        let activations = Arc::new(ActivationManager::new(store.clone(), clock.clone()));
        let prices = Arc::new(PriceEngine::new(
            store.clone(),
            clock.clone(),
            settings.clone(),
            activations.clone(),
            rng.clone(),
        ));
        let events = Arc::new(EventScheduler::new(
            store.clone(),
            clock.clone(),
            settings.clone(),
            activations.clone(),
            prices.clone(),
            rng,
        ));
        let decay = Arc::new(NoPurchaseDecay::new(
            store.clone(),
            clock.clone(),
            settings.clone(),
            prices.clone(),
        ));
        let crash = Arc::new(MarketCrash::new(
            store.clone(),
            clock.clone(),
            settings.clone(),
            activations.clone(),
            prices.clone(),
        ));
        let purchases = Arc::new(PurchaseDesk::new(
            store.clone(),
            clock.clone(),
            settings.clone(),
            prices.clone(),
        ));
        let catalog = Arc::new(Catalog::new(store.clone(), clock));

        Self {
            store,
            settings,
            activations,
            prices,
            events,
            decay,
            crash,
            purchases,
            catalog,
        }
    }

    /// Seeded from `seed` when given, from OS entropy otherwise.
    pub fn with_seed(store: Arc<dyn Store>, clock: Arc<dyn Clock>, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::new(store, clock, rng)
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    pub fn settings(&self) -> &SettingsProvider {
        &self.settings
    }

    pub fn activations(&self) -> &ActivationManager {
        &self.activations
    }

    pub fn prices(&self) -> &PriceEngine {
        &self.prices
    }

    pub fn events(&self) -> &EventScheduler {
        &self.events
    }

    pub fn decay(&self) -> &NoPurchaseDecay {
        &self.decay
    }

    pub fn crash(&self) -> &MarketCrash {
        &self.crash
    }

    pub fn purchases(&self) -> &PurchaseDesk {
        &self.purchases
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Every stock with its prices. Idle stocks are decayed first so the
    /// listing reflects the penalty.
    pub async fn list_stocks(&self) -> EngineResult<Vec<StockSummary>> {
        let decayed = self.decay.sweep().await?;
        let recorded = decayed.iter().filter(|o| o.outcome.is_recorded()).count();
        if recorded > 0 {
            tracing::debug!(recorded, "Decay applied before stock listing");
        }

        let mut summaries = Vec::new();
        for stock in self.store.list_stocks().await? {
            summaries.push(self.catalog.summarize(stock).await?);
        }
        Ok(summaries)
    }

    pub async fn stock_summary(&self, code: &str) -> EngineResult<StockSummary> {
        let stock = self.catalog.get_stock(code).await?;
        self.catalog.summarize(stock).await
    }
}
