//! Chat message repository.
//!
//! Messages are immutable: insert, windowed history reads, and the
//! administrative purge are the entire surface. History queries lean on the
//! `(room_id, created_at)` compound index.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use studyhall_common::models::message::ChatMessage;
use uuid::Uuid;

/// Persist a new message. Timestamps are server-assigned.
pub async fn create_message(
    pool: &PgPool,
    id: Uuid,
    room_id: &str,
    user_name: &str,
    text: &str,
) -> Result<ChatMessage, sqlx::Error> {
    sqlx::query_as::<_, ChatMessage>(
        r#"
        INSERT INTO messages (id, room_id, user_name, text, created_at, updated_at)
        VALUES ($1, $2, $3, $4, NOW(), NOW())
        RETURNING *
        "#,
    )
    .bind(id)
    .bind(room_id)
    .bind(user_name)
    .bind(text)
    .fetch_one(pool)
    .await
}

/// History replay for a joiner: messages in `room_id` newer than `since`,
/// oldest → newest.
pub async fn list_recent_messages(
    pool: &PgPool,
    room_id: &str,
    since: DateTime<Utc>,
) -> Result<Vec<ChatMessage>, sqlx::Error> {
    sqlx::query_as::<_, ChatMessage>(
        r#"
        SELECT * FROM messages
        WHERE room_id = $1 AND created_at >= $2
        ORDER BY created_at ASC
        "#,
    )
    .bind(room_id)
    .bind(since)
    .fetch_all(pool)
    .await
}

/// Administrative purge: delete ALL messages, every room. Destructive and
/// irreversible, no selective filter. Returns the number of rows deleted.
pub async fn purge_all_messages(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM messages").execute(pool).await?;
    Ok(result.rows_affected())
}

/// Count all stored messages (health/stats).
pub async fn count_messages(pool: &PgPool) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages")
        .fetch_one(pool)
        .await?;
    Ok(row.0)
}
