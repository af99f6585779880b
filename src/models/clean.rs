//! Clean message audit model

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CleanMessage {
    pub id: i64,
    pub sender: Option<String>,
    pub recipient: Option<String>,
    pub score: f64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewCleanMessage {
    pub sender: String,
    pub recipient: Option<String>,
    pub score: f64,
}

impl CleanMessage {
    pub async fn create<'e, E: PgExecutor<'e>>(
        executor: E,
        data: &NewCleanMessage,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO clean_messages (sender, recipient, score) VALUES ($1, $2, $3)")
            .bind(&data.sender)
            .bind(&data.recipient)
            .bind(data.score)
            .execute(executor)
            .await?;
        Ok(())
    }
}
