//! Persistence abstraction
//!
//! The detection core never talks to a database directly. Everything durable
//! goes through `PersistenceStore`, and baseline writes go through a
//! `UnitOfWork` so callers control when they commit.

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::Config;
use crate::models::{
    AgentBaselineRow, BlockedMessage, IsolationLogEntry, IsolationStatus, NewBlockedMessage,
    NewCleanMessage,
};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend refused or could not serve the request
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Durable record sets backing the isolation registry and the detector
#[async_trait]
pub trait PersistenceStore: Send + Sync {
    /// Backend name (e.g., "postgres", "memory")
    fn name(&self) -> &str;

    /// Open a transactional unit of work
    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>>;

    async fn append_isolation(
        &self,
        agent_name: &str,
        reason: Option<&str>,
        status: IsolationStatus,
    ) -> StoreResult<()>;

    /// Agents whose latest isolation log entry is ISOLATED
    async fn active_isolations(&self) -> StoreResult<Vec<IsolationLogEntry>>;

    /// Most recent isolation log entry for an agent, any status
    async fn latest_isolation(&self, agent_name: &str) -> StoreResult<Option<IsolationLogEntry>>;

    async fn append_blocked(&self, record: &NewBlockedMessage) -> StoreResult<()>;

    /// Blocked messages sent by `sender`, newest first
    async fn recent_blocked(&self, sender: &str, limit: i64) -> StoreResult<Vec<BlockedMessage>>;

    async fn append_clean(&self, record: &NewCleanMessage) -> StoreResult<()>;

    async fn count_blocked(&self) -> StoreResult<i64>;

    async fn count_unique_isolated(&self) -> StoreResult<i64>;

    /// Health check
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    /// Release backend resources
    async fn close(&self) {}
}

/// Transactional scope for baseline reads and writes
///
/// Dropping a unit of work without calling `commit` discards its writes.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Update the agent's row if present, insert it otherwise
    async fn upsert_baseline(&mut self, agent_name: &str, centroid: &str, samples: i64) -> StoreResult<()>;

    async fn load_baselines(&mut self) -> StoreResult<Vec<AgentBaselineRow>>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}

/// Open the store selected by `config.database_url`
pub async fn connect(config: &Config) -> StoreResult<Arc<dyn PersistenceStore>> {
    if config.uses_memory_store() {
        tracing::warn!("Using in-memory store; audit trail will not survive a restart");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let store = PgStore::connect(&config.database_url).await?;
    Ok(Arc::new(store))
}
