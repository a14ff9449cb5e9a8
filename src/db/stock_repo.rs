use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use super::price_repo;
use crate::models::{NewPriceChange, PriceChange, Stock};

const STOCK_SELECT: &str = r#"
    SELECT s.code, s.name, s.in_stock, s.created_at,
           COALESCE(
               ARRAY_AGG(t.name::TEXT ORDER BY t.name) FILTER (WHERE t.name IS NOT NULL),
               '{}'::TEXT[]
           ) AS tags
    FROM stocks s
    LEFT JOIN stock_tags st ON st.stock_code = s.code
    LEFT JOIN tags t ON t.id = st.tag_id
"#;

/// Return the id of a tag, creating it on first use.
pub async fn ensure_tag(tx: &mut Transaction<'_, Postgres>, name: &str) -> anyhow::Result<i64> {
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO tags (name)
        VALUES ($1)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(name)
    .fetch_one(&mut **tx)
    .await?;

    Ok(row.0)
}

/// Get all stocks, oldest first.
pub async fn get_stocks(pool: &PgPool) -> anyhow::Result<Vec<Stock>> {
    let sql = format!("{STOCK_SELECT} GROUP BY s.code ORDER BY s.created_at, s.code");
    let stocks = sqlx::query_as::<_, Stock>(&sql).fetch_all(pool).await?;

    Ok(stocks)
}

/// Fetch a stock by its code.
pub async fn get_stock_by_code(pool: &PgPool, code: &str) -> anyhow::Result<Option<Stock>> {
    let sql = format!("{STOCK_SELECT} WHERE s.code = $1 GROUP BY s.code");
    let stock = sqlx::query_as::<_, Stock>(&sql)
        .bind(code)
        .fetch_optional(pool)
        .await?;

    Ok(stock)
}

/// Insert a stock, link its tags and record its first price point in one
/// transaction, so a stock never exists without price history.
pub async fn create_stock(
    pool: &PgPool,
    code: &str,
    name: &str,
    tags: &[String],
    initial: &NewPriceChange,
    created_at: DateTime<Utc>,
) -> anyhow::Result<(Stock, PriceChange)> {
    let mut tx = pool.begin().await?;

    sqlx::query("INSERT INTO stocks (code, name, in_stock, created_at) VALUES ($1, $2, true, $3)")
        .bind(code)
        .bind(name)
        .bind(created_at)
        .execute(&mut *tx)
        .await?;

    for tag in tags {
        let tag_id = ensure_tag(&mut tx, tag).await?;
        sqlx::query(
            "INSERT INTO stock_tags (stock_code, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(code)
        .bind(tag_id)
        .execute(&mut *tx)
        .await?;
    }

    let change =
        price_repo::insert_price_change(&mut *tx, code, initial.new_price, &initial.reason, created_at)
            .await?;

    tx.commit().await?;

    let stock = get_stock_by_code(pool, code)
        .await?
        .ok_or_else(|| anyhow::anyhow!("stock {code} vanished after insert"))?;
    Ok((stock, change))
}

/// Toggle whether a stock is offered for sale.
pub async fn update_in_stock(pool: &PgPool, code: &str, in_stock: bool) -> anyhow::Result<Option<Stock>> {
    let result = sqlx::query("UPDATE stocks SET in_stock = $2 WHERE code = $1")
        .bind(code)
        .bind(in_stock)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    get_stock_by_code(pool, code).await
}

/// Delete a stock; price history, purchases and tag links cascade.
pub async fn delete_stock(pool: &PgPool, code: &str) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM stocks WHERE code = $1")
        .bind(code)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Codes of every stock sharing at least one of the given tag names.
pub async fn get_stocks_for_tags(pool: &PgPool, tags: &[String]) -> anyhow::Result<BTreeSet<String>> {
    if tags.is_empty() {
        return Ok(BTreeSet::new());
    }

    let rows: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT DISTINCT st.stock_code
        FROM stock_tags st
        JOIN tags t ON t.id = st.tag_id
        WHERE t.name = ANY($1)
        "#,
    )
    .bind(tags)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|(code,)| code).collect())
}
