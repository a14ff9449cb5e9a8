use std::collections::HashMap;

use sqlx::PgPool;

use crate::models::SettingKey;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SettingRow {
    pub key: String,
    pub value: i64,
}

pub async fn get_setting(pool: &PgPool, key: SettingKey) -> anyhow::Result<Option<i64>> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT value FROM settings WHERE key = $1")
        .bind(key.as_str())
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|(value,)| value))
}

/// All stored overrides. Rows with unrecognized keys are skipped.
pub async fn get_all_settings(pool: &PgPool) -> anyhow::Result<HashMap<SettingKey, i64>> {
    let rows = sqlx::query_as::<_, SettingRow>("SELECT key, value FROM settings ORDER BY key")
        .fetch_all(pool)
        .await?;

    let mut settings = HashMap::with_capacity(rows.len());
    for row in rows {
        match SettingKey::from_name(&row.key) {
            Some(key) => {
                settings.insert(key, row.value);
            }
            None => tracing::warn!(key = %row.key, "Ignoring unknown setting row"),
        }
    }

    Ok(settings)
}

pub async fn upsert_setting(pool: &PgPool, key: SettingKey, value: i64) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO settings (key, value, updated_at)
        VALUES ($1, $2, NOW())
        ON CONFLICT (key) DO UPDATE SET value = $2, updated_at = NOW()
        "#,
    )
    .bind(key.as_str())
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn delete_setting(pool: &PgPool, key: SettingKey) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM settings WHERE key = $1")
        .bind(key.as_str())
        .execute(pool)
        .await?;

    Ok(())
}
