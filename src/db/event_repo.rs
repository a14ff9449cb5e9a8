use sqlx::PgPool;
use uuid::Uuid;

use crate::db::stock_repo::ensure_tag;
use crate::models::{Event, NewEvent};

const EVENT_SELECT: &str = r#"
    SELECT e.id, e.title, e.body, e.breaking, e.video_url, e.change_min, e.change_max,
           COALESCE(
               ARRAY_AGG(t.name::TEXT ORDER BY t.name) FILTER (WHERE t.name IS NOT NULL),
               '{}'::TEXT[]
           ) AS tags
    FROM events e
    LEFT JOIN event_tags et ON et.event_id = e.id
    LEFT JOIN tags t ON t.id = et.tag_id
"#;

pub async fn get_events(pool: &PgPool) -> anyhow::Result<Vec<Event>> {
    let sql = format!("{EVENT_SELECT} GROUP BY e.id ORDER BY e.title, e.id");
    let events = sqlx::query_as::<_, Event>(&sql).fetch_all(pool).await?;

    Ok(events)
}

pub async fn get_event(pool: &PgPool, event_id: Uuid) -> anyhow::Result<Option<Event>> {
    let sql = format!("{EVENT_SELECT} WHERE e.id = $1 GROUP BY e.id");
    let event = sqlx::query_as::<_, Event>(&sql)
        .bind(event_id)
        .fetch_optional(pool)
        .await?;

    Ok(event)
}

/// Events already activated during the given session.
pub async fn get_activated_events(pool: &PgPool, session_id: Uuid) -> anyhow::Result<Vec<Event>> {
    let sql = format!(
        r#"{EVENT_SELECT}
        WHERE e.id IN (
            SELECT event_id FROM event_activations WHERE market_activation_id = $1
        )
        GROUP BY e.id"#
    );
    let events = sqlx::query_as::<_, Event>(&sql)
        .bind(session_id)
        .fetch_all(pool)
        .await?;

    Ok(events)
}

/// Insert an event and link its tags in one transaction.
pub async fn create_event(pool: &PgPool, event: &NewEvent) -> anyhow::Result<Event> {
    let mut tx = pool.begin().await?;

    let (event_id,): (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO events (title, body, breaking, video_url, change_min, change_max)
        VALUES ($1, $2, $3, $4, $5, $6)
        RETURNING id
        "#,
    )
    .bind(&event.title)
    .bind(&event.body)
    .bind(event.breaking)
    .bind(&event.video_url)
    .bind(event.change_min)
    .bind(event.change_max)
    .fetch_one(&mut *tx)
    .await?;

    for tag in &event.tags {
        let tag_id = ensure_tag(&mut tx, tag).await?;
        sqlx::query("INSERT INTO event_tags (event_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(event_id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;

    get_event(pool, event_id)
        .await?
        .ok_or_else(|| anyhow::anyhow!("event {event_id} vanished after insert"))
}

/// Delete an event; its tag links and activations cascade.
pub async fn delete_event(pool: &PgPool, event_id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query("DELETE FROM events WHERE id = $1")
        .bind(event_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
