use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgExecutor, PgPool};

use super::price_repo;
use crate::models::{Account, NewAccount, NewPriceChange, Purchase, PurchaseRecord};

pub async fn create_account(pool: &PgPool, account: &NewAccount) -> anyhow::Result<Account> {
    let account = sqlx::query_as::<_, Account>(
        "INSERT INTO accounts (card_number, name, balance) VALUES ($1, $2, $3) RETURNING *",
    )
    .bind(account.card_number)
    .bind(&account.name)
    .bind(account.balance)
    .fetch_one(pool)
    .await?;

    Ok(account)
}

pub async fn get_account_by_card_number(pool: &PgPool, card_number: i64) -> anyhow::Result<Option<Account>> {
    let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE card_number = $1")
        .bind(card_number)
        .fetch_optional(pool)
        .await?;

    Ok(account)
}

pub async fn get_accounts(pool: &PgPool) -> anyhow::Result<Vec<Account>> {
    let accounts = sqlx::query_as::<_, Account>("SELECT * FROM accounts ORDER BY card_number")
        .fetch_all(pool)
        .await?;

    Ok(accounts)
}

pub async fn delete_account(pool: &PgPool, card_number: i64) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM accounts WHERE card_number = $1")
        .bind(card_number)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Subtract from the balance in a single statement so concurrent debits never lose updates.
pub async fn debit_account<'e>(
    executor: impl PgExecutor<'e>,
    card_number: i64,
    amount: Decimal,
) -> anyhow::Result<Account> {
    let account = sqlx::query_as::<_, Account>(
        "UPDATE accounts SET balance = balance - $2 WHERE card_number = $1 RETURNING *",
    )
    .bind(card_number)
    .bind(amount)
    .fetch_optional(executor)
    .await?
    .ok_or_else(|| anyhow::anyhow!("account {card_number} not found"))?;

    Ok(account)
}

pub async fn create_purchase<'e>(
    executor: impl PgExecutor<'e>,
    code: &str,
    card_number: i64,
    price: Decimal,
    purchased_at: DateTime<Utc>,
) -> anyhow::Result<Purchase> {
    let purchase = sqlx::query_as::<_, Purchase>(
        r#"
        INSERT INTO purchases (stock_code, card_number, purchase_price, purchased_at)
        VALUES ($1, $2, $3, $4)
        RETURNING *
        "#,
    )
    .bind(code)
    .bind(card_number)
    .bind(price)
    .bind(purchased_at)
    .fetch_one(executor)
    .await?;

    Ok(purchase)
}

/// Record the sale, debit the buyer and store the follow-up price point in one
/// transaction.
pub async fn record_purchase(
    pool: &PgPool,
    code: &str,
    card_number: i64,
    price: Decimal,
    purchased_at: DateTime<Utc>,
    next_price: Option<&NewPriceChange>,
) -> anyhow::Result<PurchaseRecord> {
    let mut tx = pool.begin().await?;

    let purchase = create_purchase(&mut *tx, code, card_number, price, purchased_at).await?;
    let account = debit_account(&mut *tx, card_number, price).await?;
    let price_change = match next_price {
        Some(next) => Some(
            price_repo::insert_price_change(&mut *tx, &next.stock_code, next.new_price, &next.reason, purchased_at)
                .await?,
        ),
        None => None,
    };

    tx.commit().await?;

    Ok(PurchaseRecord {
        purchase,
        account,
        price_change,
    })
}

pub async fn get_latest_purchase_at(pool: &PgPool, code: &str) -> anyhow::Result<Option<DateTime<Utc>>> {
    let row: (Option<DateTime<Utc>>,) =
        sqlx::query_as("SELECT MAX(purchased_at) FROM purchases WHERE stock_code = $1")
            .bind(code)
            .fetch_one(pool)
            .await?;

    Ok(row.0)
}

pub async fn get_purchases(pool: &PgPool) -> anyhow::Result<Vec<Purchase>> {
    let purchases = sqlx::query_as::<_, Purchase>("SELECT * FROM purchases ORDER BY purchased_at DESC, id DESC")
        .fetch_all(pool)
        .await?;

    Ok(purchases)
}
