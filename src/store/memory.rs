//! In-memory store
//!
//! Used for development (`DATABASE_URL=memory://`) and tests. Failure
//! injection switches let tests drive the compensation paths.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::{PersistenceStore, StoreError, StoreResult, UnitOfWork};
use crate::models::{
    AgentBaselineRow, BlockedMessage, CleanMessage, IsolationLogEntry, IsolationStatus,
    NewBlockedMessage, NewCleanMessage,
};

#[derive(Default)]
struct Tables {
    next_id: i64,
    isolation_log: Vec<IsolationLogEntry>,
    blocked_messages: Vec<BlockedMessage>,
    clean_messages: Vec<CleanMessage>,
    agent_baselines: HashMap<String, AgentBaselineRow>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn latest_isolation(&self, agent_name: &str) -> Option<&IsolationLogEntry> {
        self.isolation_log
            .iter()
            .filter(|e| e.agent_name == agent_name)
            .max_by_key(|e| (e.isolated_at, e.id))
    }
}

#[derive(Default)]
struct Shared {
    tables: Mutex<Tables>,
    fail_writes: AtomicBool,
    fail_reads: AtomicBool,
}

impl Shared {
    fn check_write(&self) -> StoreResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("writes disabled".to_string()));
        }
        Ok(())
    }

    fn check_read(&self) -> StoreResult<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("reads disabled".to_string()));
        }
        Ok(())
    }
}

/// Volatile `PersistenceStore` implementation
#[derive(Clone, Default)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.shared.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent read fail
    pub fn set_fail_reads(&self, fail: bool) {
        self.shared.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Full isolation log in insertion order
    pub fn isolation_log(&self) -> Vec<IsolationLogEntry> {
        self.shared.tables.lock().isolation_log.clone()
    }

    pub fn clean_messages(&self) -> Vec<CleanMessage> {
        self.shared.tables.lock().clean_messages.clone()
    }

    pub fn baseline_row(&self, agent_name: &str) -> Option<AgentBaselineRow> {
        self.shared.tables.lock().agent_baselines.get(agent_name).cloned()
    }

    /// Seed a baseline row as-is, bypassing any validation
    pub fn insert_raw_baseline(&self, agent_name: &str, centroid: Option<&str>, samples: i64) {
        let now = Utc::now();
        self.shared.tables.lock().agent_baselines.insert(
            agent_name.to_string(),
            AgentBaselineRow {
                agent_name: agent_name.to_string(),
                centroid: centroid.map(str::to_string),
                samples,
                created_at: now,
                updated_at: now,
            },
        );
    }
}

#[async_trait]
impl PersistenceStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn begin(&self) -> StoreResult<Box<dyn UnitOfWork>> {
        self.shared.check_read()?;
        Ok(Box::new(MemoryUnitOfWork {
            shared: Arc::clone(&self.shared),
            staged: Vec::new(),
        }))
    }

    async fn append_isolation(
        &self,
        agent_name: &str,
        reason: Option<&str>,
        status: IsolationStatus,
    ) -> StoreResult<()> {
        self.shared.check_write()?;
        let mut tables = self.shared.tables.lock();
        let id = tables.next_id();
        let now = Utc::now();
        tables.isolation_log.push(IsolationLogEntry {
            id,
            agent_name: agent_name.to_string(),
            isolated_at: now,
            reason: reason.map(str::to_string),
            status: status.as_str().to_string(),
            created_at: now,
        });
        Ok(())
    }

    async fn active_isolations(&self) -> StoreResult<Vec<IsolationLogEntry>> {
        self.shared.check_read()?;
        let tables = self.shared.tables.lock();
        let agents: HashSet<&str> = tables
            .isolation_log
            .iter()
            .map(|e| e.agent_name.as_str())
            .collect();

        Ok(agents
            .into_iter()
            .filter_map(|agent| tables.latest_isolation(agent))
            .filter(|e| e.is_isolated())
            .cloned()
            .collect())
    }

    async fn latest_isolation(&self, agent_name: &str) -> StoreResult<Option<IsolationLogEntry>> {
        self.shared.check_read()?;
        Ok(self.shared.tables.lock().latest_isolation(agent_name).cloned())
    }

    async fn append_blocked(&self, record: &NewBlockedMessage) -> StoreResult<()> {
        self.shared.check_write()?;
        let mut tables = self.shared.tables.lock();
        let id = tables.next_id();
        tables.blocked_messages.push(BlockedMessage {
            id,
            sender: record.sender.clone(),
            recipient: record.recipient.clone(),
            score: record.score,
            layers: Some(record.layers.clone()),
            blocked_at: Utc::now(),
        });
        Ok(())
    }

    async fn recent_blocked(&self, sender: &str, limit: i64) -> StoreResult<Vec<BlockedMessage>> {
        self.shared.check_read()?;
        let tables = self.shared.tables.lock();
        let mut rows: Vec<BlockedMessage> = tables
            .blocked_messages
            .iter()
            .filter(|m| m.sender == sender)
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.blocked_at, b.id).cmp(&(a.blocked_at, a.id)));
        rows.truncate(limit.max(0) as usize);
        Ok(rows)
    }

    async fn append_clean(&self, record: &NewCleanMessage) -> StoreResult<()> {
        self.shared.check_write()?;
        let mut tables = self.shared.tables.lock();
        let id = tables.next_id();
        tables.clean_messages.push(CleanMessage {
            id,
            sender: Some(record.sender.clone()),
            recipient: record.recipient.clone(),
            score: record.score,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn count_blocked(&self) -> StoreResult<i64> {
        self.shared.check_read()?;
        Ok(self.shared.tables.lock().blocked_messages.len() as i64)
    }

    async fn count_unique_isolated(&self) -> StoreResult<i64> {
        self.shared.check_read()?;
        let tables = self.shared.tables.lock();
        let unique: HashSet<&str> = tables
            .isolation_log
            .iter()
            .map(|e| e.agent_name.as_str())
            .collect();
        Ok(unique.len() as i64)
    }

    async fn ping(&self) -> StoreResult<()> {
        self.shared.check_read()
    }
}

struct StagedBaseline {
    agent_name: String,
    centroid: String,
    samples: i64,
}

/// Buffers baseline writes until commit
pub struct MemoryUnitOfWork {
    shared: Arc<Shared>,
    staged: Vec<StagedBaseline>,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn upsert_baseline(&mut self, agent_name: &str, centroid: &str, samples: i64) -> StoreResult<()> {
        self.shared.check_write()?;
        self.staged.push(StagedBaseline {
            agent_name: agent_name.to_string(),
            centroid: centroid.to_string(),
            samples,
        });
        Ok(())
    }

    async fn load_baselines(&mut self) -> StoreResult<Vec<AgentBaselineRow>> {
        self.shared.check_read()?;
        Ok(self.shared.tables.lock().agent_baselines.values().cloned().collect())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryUnitOfWork { shared, staged } = *self;
        shared.check_write()?;
        let mut tables = shared.tables.lock();
        let now = Utc::now();

        for staged in staged {
            // Update if the row exists, otherwise insert
            if let Some(row) = tables.agent_baselines.get_mut(&staged.agent_name) {
                row.centroid = Some(staged.centroid);
                row.samples = staged.samples;
                row.updated_at = now;
                continue;
            }

            tables.agent_baselines.insert(
                staged.agent_name.clone(),
                AgentBaselineRow {
                    agent_name: staged.agent_name,
                    centroid: Some(staged.centroid),
                    samples: staged.samples,
                    created_at: now,
                    updated_at: now,
                },
            );
        }
        Ok(())
    }
}
