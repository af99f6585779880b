//! PostgreSQL-backed store

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};

use super::{PersistenceStore, StoreResult, UnitOfWork};
use crate::db;
use crate::models::{
    AgentBaselineRow, BlockedMessage, CleanMessage, IsolationLogEntry, IsolationStatus,
    NewBlockedMessage, NewCleanMessage,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect and apply the schema
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let pool = db::create_pool(database_url).await?;

        tracing::info!("Running database migrations...");
        db::run_migrations(&pool).await?;

        Ok(Self { pool })
    }
}

#[async_trait]
impl PersistenceStore for PgStore {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn append_isolation(
        &self,
        agent_name: &str,
        reason: Option<&str>,
        status: IsolationStatus,
    ) -> StoreResult<()> {
        IsolationLogEntry::append(&self.pool, agent_name, reason, status).await?;
        Ok(())
    }

    async fn active_isolations(&self) -> StoreResult<Vec<IsolationLogEntry>> {
        Ok(IsolationLogEntry::list_active(&self.pool).await?)
    }

    async fn latest_isolation(&self, agent_name: &str) -> StoreResult<Option<IsolationLogEntry>> {
        Ok(IsolationLogEntry::find_latest(&self.pool, agent_name).await?)
    }

    async fn append_blocked(&self, record: &NewBlockedMessage) -> StoreResult<()> {
        BlockedMessage::create(&self.pool, record).await?;
        Ok(())
    }

    async fn recent_blocked(&self, sender: &str, limit: i64) -> StoreResult<Vec<BlockedMessage>> {
        Ok(BlockedMessage::list_by_sender(&self.pool, sender, limit).await?)
    }

    async fn append_clean(&self, record: &NewCleanMessage) -> StoreResult<()> {
        CleanMessage::create(&self.pool, record).await?;
        Ok(())
    }

    async fn count_blocked(&self) -> StoreResult<i64> {
        Ok(BlockedMessage::count_all(&self.pool).await?)
    }

    async fn count_unique_isolated(&self) -> StoreResult<i64> {
        Ok(IsolationLogEntry::count_unique_agents(&self.pool).await?)
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// Unit of work over a single PostgreSQL transaction
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn upsert_baseline(&mut self, agent_name: &str, centroid: &str, samples: i64) -> StoreResult<()> {
        AgentBaselineRow::upsert(&mut *self.tx, agent_name, centroid, samples).await?;
        Ok(())
    }

    async fn load_baselines(&mut self) -> StoreResult<Vec<AgentBaselineRow>> {
        Ok(AgentBaselineRow::list_all(&mut *self.tx).await?)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
