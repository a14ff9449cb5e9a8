use chrono::{DateTime, Utc};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::price_repo;
use crate::models::{EventActivation, MarketActivation, NewPriceChange, PriceChange};

/// The earliest-started session that has not ended yet.
pub async fn get_current_activation(
    pool: &PgPool,
    now: DateTime<Utc>,
) -> anyhow::Result<Option<MarketActivation>> {
    let session = sqlx::query_as::<_, MarketActivation>(
        r#"
        SELECT * FROM market_activations
        WHERE ends_at IS NULL OR ends_at > $1
        ORDER BY started_at ASC
        LIMIT 1
        "#,
    )
    .bind(now)
    .fetch_optional(pool)
    .await?;

    Ok(session)
}

pub async fn create_activation(pool: &PgPool, started_at: DateTime<Utc>) -> anyhow::Result<MarketActivation> {
    let session = sqlx::query_as::<_, MarketActivation>(
        "INSERT INTO market_activations (started_at, ends_at) VALUES ($1, NULL) RETURNING *",
    )
    .bind(started_at)
    .fetch_one(pool)
    .await?;

    Ok(session)
}

/// Set (or clear) the end time of a session.
pub async fn update_activation_end(
    pool: &PgPool,
    session_id: Uuid,
    ends_at: Option<DateTime<Utc>>,
) -> anyhow::Result<MarketActivation> {
    let session = sqlx::query_as::<_, MarketActivation>(
        "UPDATE market_activations SET ends_at = $2 WHERE id = $1 RETURNING *",
    )
    .bind(session_id)
    .bind(ends_at)
    .fetch_one(pool)
    .await?;

    Ok(session)
}

/// The event activation of a session that has not expired yet, newest first.
pub async fn get_active_event_activation(
    pool: &PgPool,
    session_id: Uuid,
    now: DateTime<Utc>,
) -> anyhow::Result<Option<EventActivation>> {
    let activation = sqlx::query_as::<_, EventActivation>(
        r#"
        SELECT * FROM event_activations
        WHERE market_activation_id = $1 AND ends_at > $2
        ORDER BY started_at DESC
        LIMIT 1
        "#,
    )
    .bind(session_id)
    .bind(now)
    .fetch_optional(pool)
    .await?;

    Ok(activation)
}

/// Bind an event to a session. The (session, event) pair is unique.
pub async fn create_event_activation<'e>(
    executor: impl PgExecutor<'e>,
    session_id: Uuid,
    event_id: Uuid,
    started_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
) -> anyhow::Result<EventActivation> {
    let activation = sqlx::query_as::<_, EventActivation>(
        r#"
        INSERT INTO event_activations (market_activation_id, event_id, started_at, ends_at)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(session_id)
    .bind(event_id)
    .bind(started_at)
    .bind(ends_at)
    .fetch_one(executor)
    .await?;

    Ok(activation)
}

/// Activate an event and write the price shocks it causes in one transaction.
pub async fn activate_event(
    pool: &PgPool,
    session_id: Uuid,
    event_id: Uuid,
    started_at: DateTime<Utc>,
    ends_at: DateTime<Utc>,
    shocks: &[NewPriceChange],
) -> anyhow::Result<(EventActivation, Vec<PriceChange>)> {
    let mut tx = pool.begin().await?;

    let activation = create_event_activation(&mut *tx, session_id, event_id, started_at, ends_at).await?;

    let mut stored = Vec::with_capacity(shocks.len());
    for shock in shocks {
        stored.push(
            price_repo::insert_price_change(&mut *tx, &shock.stock_code, shock.new_price, &shock.reason, started_at)
                .await?,
        );
    }

    tx.commit().await?;
    Ok((activation, stored))
}
