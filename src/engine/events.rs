use std::collections::HashSet;
use std::sync::Arc;

use chrono::Duration;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tokio::sync::Mutex as AsyncMutex;
use uuid::Uuid;

use super::activation::ActivationManager;
use super::clock::Clock;
use super::price::{reason, PriceDecision, PriceEngine, StockOutcome};
use super::settings::SettingsProvider;
use super::SharedRng;
use crate::db::Store;
use crate::errors::{EngineError, EngineResult};
use crate::models::{Event, EventActivation, MarketActivation, NewPriceChange};

/// A freshly activated event and the shock it dealt to each affected stock.
#[derive(Debug, Clone, Serialize)]
pub struct EventRoll {
    pub event: Event,
    pub activation: EventActivation,
    pub outcomes: Vec<StockOutcome>,
}

/// Rotates news events through a session. Each event is used at most once
/// per session and only the latest unexpired activation is current.
pub struct EventScheduler {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    settings: Arc<SettingsProvider>,
    activations: Arc<ActivationManager>,
    prices: Arc<PriceEngine>,
    rng: SharedRng,
    roll_lock: AsyncMutex<()>,
}

impl EventScheduler {
    pub fn new(
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        settings: Arc<SettingsProvider>,
        activations: Arc<ActivationManager>,
        prices: Arc<PriceEngine>,
        rng: SharedRng,
    ) -> Self {
        Self {
            store,
            clock,
            settings,
            activations,
            prices,
            rng,
            roll_lock: AsyncMutex::new(()),
        }
    }

    /// The event currently on the ticker, rolling a new one when the last
    /// has expired. `None` when the market is closed or the session has used
    /// every event.
    pub async fn current_event(&self) -> EngineResult<Option<Event>> {
        let Some(session) = self.activations.current().await? else {
            return Ok(None);
        };

        let _guard = self.roll_lock.lock().await;

        if let Some(active) = self
            .store
            .get_unconsumed_event_activation(session.id, self.clock.now())
            .await?
        {
            if let Some(event) = self.store.get_event(active.event_id).await? {
                return Ok(Some(event));
            }
            tracing::warn!(event_id = %active.event_id, "Active event no longer exists, rolling a new one");
        }

        let roll = self.roll_locked(&session).await?;
        Ok(roll.map(|roll| roll.event))
    }

    /// Activate a random unused event for `session` and apply its shock.
    pub async fn roll_new_event(&self, session: &MarketActivation) -> EngineResult<Option<EventRoll>> {
        let _guard = self.roll_lock.lock().await;
        self.roll_locked(session).await
    }

    async fn roll_locked(&self, session: &MarketActivation) -> EngineResult<Option<EventRoll>> {
        // The session must still be the open one
        match self.activations.current().await? {
            Some(current) if current.id == session.id => {}
            _ => {
                tracing::debug!(session_id = %session.id, "Session not open, event roll skipped");
                return Ok(None);
            }
        }

        let used: HashSet<Uuid> = self
            .store
            .list_activated_events(session.id)
            .await?
            .into_iter()
            .map(|event| event.id)
            .collect();

        let candidates: Vec<Event> = self
            .store
            .list_events()
            .await?
            .into_iter()
            .filter(|event| !used.contains(&event.id))
            .collect();

        if candidates.is_empty() {
            tracing::info!(session_id = %session.id, used = used.len(), "Event pool exhausted for session");
            return Ok(None);
        }

        let rules = self.settings.rules().await?;
        let (min_minutes, max_minutes) = rules.news_duration_range();

        let (event, minutes) = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            let Some(event) = candidates.choose(&mut *rng).cloned() else {
                return Ok(None);
            };
            (event, rng.gen_range(min_minutes..=max_minutes))
        };

        let now = self.clock.now();
        let ends_at = Duration::try_minutes(minutes)
            .and_then(|d| now.checked_add_signed(d))
            .ok_or_else(|| EngineError::InvalidArgument(format!("news duration of {minutes} minutes is out of range")))?;

        let affected = self.store.get_stocks_for_tags(&event.tags).await?;
        let _guards = self.prices.lock_stocks(&affected).await;

        let mut decisions = Vec::with_capacity(affected.len());
        for code in affected {
            let decision = self
                .prices
                .plan_change_locked(&code, event.change_min, event.change_max, reason::NEW_EVENT, &rules)
                .await?;
            decisions.push((code, decision));
        }

        let shocks: Vec<NewPriceChange> = decisions
            .iter()
            .filter_map(|(code, decision)| match decision {
                PriceDecision::Accept(planned) => Some(planned.to_new(code, reason::NEW_EVENT)),
                PriceDecision::Skip(_) => None,
            })
            .collect();

        // Activation and shocks are stored together
        let (activation, stored) = self
            .store
            .activate_event(session.id, event.id, now, ends_at, &shocks)
            .await?;

        tracing::info!(
            session_id = %session.id,
            event_id = %event.id,
            title = %event.title,
            minutes,
            shocked = stored.len(),
            "News event activated"
        );
        metrics::counter!("events_activated_total").increment(1);

        let mut stored = stored.into_iter();
        let mut outcomes = Vec::with_capacity(decisions.len());
        for (code, decision) in decisions {
            let outcome = match decision {
                PriceDecision::Skip(outcome) => outcome,
                PriceDecision::Accept(planned) => {
                    let change = stored.next().ok_or_else(|| {
                        EngineError::Store(anyhow::anyhow!("event shock for {code} was not stored"))
                    })?;
                    self.prices.recorded(reason::NEW_EVENT, &planned, change)
                }
            };
            outcomes.push(StockOutcome {
                stock_code: code,
                outcome,
            });
        }

        Ok(Some(EventRoll {
            event,
            activation,
            outcomes,
        }))
    }
}
