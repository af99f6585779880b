//! Agent baseline model

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use chrono::{DateTime, Utc};

/// Persisted behavioral baseline. `centroid` is a JSON array of floats.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AgentBaselineRow {
    pub agent_name: String,
    pub centroid: Option<String>,
    pub samples: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AgentBaselineRow {
    pub async fn upsert<'e, E: PgExecutor<'e>>(
        executor: E,
        agent_name: &str,
        centroid: &str,
        samples: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO agent_baselines (agent_name, centroid, samples)
            VALUES ($1, $2, $3)
            ON CONFLICT (agent_name) DO UPDATE SET
                centroid = EXCLUDED.centroid,
                samples = EXCLUDED.samples,
                updated_at = NOW()
            "#
        )
        .bind(agent_name)
        .bind(centroid)
        .bind(samples)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn list_all<'e, E: PgExecutor<'e>>(executor: E) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, AgentBaselineRow>(
            "SELECT agent_name, centroid, samples, created_at, updated_at FROM agent_baselines"
        )
        .fetch_all(executor)
        .await
    }
}
