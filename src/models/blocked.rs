//! Blocked message audit model

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct BlockedMessage {
    pub id: i64,
    pub sender: String,
    pub recipient: Option<String>,
    pub score: f64,
    pub layers: Option<serde_json::Value>,
    pub blocked_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBlockedMessage {
    pub sender: String,
    pub recipient: Option<String>,
    pub score: f64,
    pub layers: serde_json::Value,
}

impl BlockedMessage {
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        data: &NewBlockedMessage,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO blocked_messages (sender, recipient, score, layers) VALUES ($1, $2, $3, $4)"
        )
        .bind(&data.sender)
        .bind(&data.recipient)
        .bind(data.score)
        .bind(&data.layers)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Most recent first
    pub async fn list_by_sender<'e, E: PgExecutor<'e>>(
        executor: E,
        sender: &str,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, BlockedMessage>(
            r#"
            SELECT id, sender, recipient, score, layers, blocked_at
            FROM blocked_messages
            WHERE sender = $1
            ORDER BY blocked_at DESC, id DESC
            LIMIT $2
            "#
        )
        .bind(sender)
        .bind(limit)
        .fetch_all(executor)
        .await
    }

    pub async fn count_all<'e, E: PgExecutor<'e>>(executor: E) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM blocked_messages")
            .fetch_one(executor)
            .await
    }
}
