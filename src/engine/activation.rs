use std::sync::Arc;

use chrono::Duration;
use tokio::sync::Mutex as AsyncMutex;

use super::clock::Clock;
use crate::db::Store;
use crate::errors::{EngineError, EngineResult};
use crate::models::MarketActivation;

/// Longest close countdown accepted, in minutes.
pub const MAX_CLOSE_MINUTES: i64 = i32::MAX as i64;

fn record_gauge(open: bool) {
    metrics::gauge!("market_open").set(if open { 1.0 } else { 0.0 });
}

/// Opens, resumes and schedules the end of trading sessions.
pub struct ActivationManager {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    session_lock: AsyncMutex<()>,
}

impl ActivationManager {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            session_lock: AsyncMutex::new(()),
        }
    }

    /// The open session, if any. Also refreshes the `market_open` gauge, so
    /// a countdown that ran out is reflected on the next read.
    pub async fn current(&self) -> EngineResult<Option<MarketActivation>> {
        let session = self.store.get_open_session(self.clock.now()).await?;
        record_gauge(session.is_some());
        Ok(session)
    }

    pub async fn is_open(&self) -> EngineResult<bool> {
        Ok(self.current().await?.is_some())
    }

    /// Open the market. An already-open session is returned as is; a closing
    /// one has its countdown cancelled. Only a closed market gets a new row.
    pub async fn open(&self) -> EngineResult<MarketActivation> {
        let _guard = self.session_lock.lock().await;
        let now = self.clock.now();

        let session = match self.store.get_open_session(now).await? {
            Some(session) if session.is_closing_at(now) => {
                let session = self.store.extend_session(session.id, None).await?;
                tracing::info!(session_id = %session.id, "Market close cancelled, session resumed");
                session
            }
            Some(session) => session,
            None => {
                let session = self.store.create_session(now).await?;
                tracing::info!(session_id = %session.id, "Market opened");
                session
            }
        };

        record_gauge(true);
        Ok(session)
    }

    /// Schedule the current session to end `ends_in_minutes` from now.
    /// Calling again just moves the end time.
    pub async fn close(&self, ends_in_minutes: i64) -> EngineResult<MarketActivation> {
        if !(0..=MAX_CLOSE_MINUTES).contains(&ends_in_minutes) {
            return Err(EngineError::InvalidArgument(format!(
                "ends_in must be between 0 and {MAX_CLOSE_MINUTES} minutes (got {ends_in_minutes})"
            )));
        }

        let _guard = self.session_lock.lock().await;
        let now = self.clock.now();

        let session = self
            .store
            .get_open_session(now)
            .await?
            .ok_or(EngineError::MarketClosed)?;

        let ends_at = Duration::try_minutes(ends_in_minutes)
            .and_then(|d| now.checked_add_signed(d))
            .ok_or_else(|| {
                EngineError::InvalidArgument(format!("ends_in of {ends_in_minutes} minutes is out of range"))
            })?;
        let session = self.store.extend_session(session.id, Some(ends_at)).await?;

        tracing::info!(
            session_id = %session.id,
            ends_at = %ends_at,
            "Market closing scheduled"
        );
        record_gauge(session.is_open_at(now));

        Ok(session)
    }
}
