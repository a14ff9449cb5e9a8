use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgExecutor, PgPool};

use crate::models::{NewPriceChange, PriceChange};

/// The chronologically first price point: the stock's immutable anchor.
pub async fn get_initial_price(pool: &PgPool, code: &str) -> anyhow::Result<Option<PriceChange>> {
    let change = sqlx::query_as::<_, PriceChange>(
        "SELECT * FROM price_changes WHERE stock_code = $1 ORDER BY changed_at ASC, id ASC LIMIT 1",
    )
    .bind(code)
    .fetch_optional(pool)
    .await?;

    Ok(change)
}

/// The chronologically last price point.
pub async fn get_current_price(pool: &PgPool, code: &str) -> anyhow::Result<Option<PriceChange>> {
    let change = sqlx::query_as::<_, PriceChange>(
        "SELECT * FROM price_changes WHERE stock_code = $1 ORDER BY changed_at DESC, id DESC LIMIT 1",
    )
    .bind(code)
    .fetch_optional(pool)
    .await?;

    Ok(change)
}

/// Append a new price point. Rows are never updated in place.
pub async fn insert_price_change<'e>(
    executor: impl PgExecutor<'e>,
    code: &str,
    price: Decimal,
    reason: &str,
    changed_at: DateTime<Utc>,
) -> anyhow::Result<PriceChange> {
    let change = sqlx::query_as::<_, PriceChange>(
        r#"
        INSERT INTO price_changes (stock_code, new_price, reason, changed_at)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(code)
    .bind(price)
    .bind(reason)
    .bind(changed_at)
    .fetch_one(executor)
    .await?;

    Ok(change)
}

/// Append several price points together; either all of them are stored or none.
pub async fn insert_price_changes(
    pool: &PgPool,
    changes: &[NewPriceChange],
    changed_at: DateTime<Utc>,
) -> anyhow::Result<Vec<PriceChange>> {
    let mut tx = pool.begin().await?;

    let mut stored = Vec::with_capacity(changes.len());
    for change in changes {
        stored.push(
            insert_price_change(&mut *tx, &change.stock_code, change.new_price, &change.reason, changed_at)
                .await?,
        );
    }

    tx.commit().await?;
    Ok(stored)
}

/// Full price history for a stock, oldest first.
pub async fn get_price_history(pool: &PgPool, code: &str) -> anyhow::Result<Vec<PriceChange>> {
    let changes = sqlx::query_as::<_, PriceChange>(
        "SELECT * FROM price_changes WHERE stock_code = $1 ORDER BY changed_at ASC, id ASC",
    )
    .bind(code)
    .fetch_all(pool)
    .await?;

    Ok(changes)
}
