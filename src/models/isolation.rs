//! Isolation log model

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use chrono::{DateTime, Utc};

/// Status recorded on an isolation log row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IsolationStatus {
    Isolated,
    Released,
}

impl IsolationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IsolationStatus::Isolated => "ISOLATED",
            IsolationStatus::Released => "RELEASED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct IsolationLogEntry {
    pub id: i64,
    pub agent_name: String,
    pub isolated_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl IsolationLogEntry {
    pub fn is_isolated(&self) -> bool {
        self.status == IsolationStatus::Isolated.as_str()
    }

    pub async fn append<'e, E: PgExecutor<'e>>(
        executor: E,
        agent_name: &str,
        reason: Option<&str>,
        status: IsolationStatus,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO isolation_log (agent_name, reason, status) VALUES ($1, $2, $3)"
        )
        .bind(agent_name)
        .bind(reason)
        .bind(status.as_str())
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Latest row per agent, kept only where that row is ISOLATED
    pub async fn list_active<'e, E: PgExecutor<'e>>(executor: E) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, IsolationLogEntry>(
            r#"
            SELECT id, agent_name, isolated_at, reason, status, created_at FROM (
                SELECT DISTINCT ON (agent_name) *
                FROM isolation_log
                ORDER BY agent_name, isolated_at DESC, id DESC
            ) latest
            WHERE status = 'ISOLATED'
            "#
        )
        .fetch_all(executor)
        .await
    }

    pub async fn find_latest<'e, E: PgExecutor<'e>>(
        executor: E,
        agent_name: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, IsolationLogEntry>(
            r#"
            SELECT id, agent_name, isolated_at, reason, status, created_at
            FROM isolation_log
            WHERE agent_name = $1
            ORDER BY isolated_at DESC, id DESC
            LIMIT 1
            "#
        )
        .bind(agent_name)
        .fetch_optional(executor)
        .await
    }

    pub async fn count_unique_agents<'e, E: PgExecutor<'e>>(executor: E) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(DISTINCT agent_name) FROM isolation_log")
            .fetch_one(executor)
            .await
    }
}
