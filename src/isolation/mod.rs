//! Isolation registry
//!
//! Owns the authoritative "is this agent isolated" state. Reads are served
//! from an in-memory cache behind a single lock; every change is also
//! appended to the durable isolation log. Store calls never run while the
//! lock is held.

pub mod saga;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::error::FenceError;
use crate::models::{
    BlockedMessage, IsolationLogEntry, IsolationStatus, NewBlockedMessage, NewCleanMessage,
};
use crate::store::PersistenceStore;

pub use saga::TentativeChange;

/// Default number of blocked messages returned by forensics
pub const DEFAULT_FORENSICS_LIMIT: i64 = 50;

/// Cached state of one isolated agent
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IsolationState {
    pub isolated_at: DateTime<Utc>,
    /// Blocks since isolation; not persisted, resets on restart
    pub messages_blocked: u64,
}

impl IsolationState {
    pub fn new() -> Self {
        Self {
            isolated_at: Utc::now(),
            messages_blocked: 0,
        }
    }
}

impl Default for IsolationState {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IsolationStats {
    pub total_isolated_active: usize,
    pub isolated_agents: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_blocks_all_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_unique_agents_isolated: Option<i64>,
    pub cache_compensations: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Forensics {
    pub agent: String,
    pub blocked_messages: Vec<BlockedMessage>,
    pub isolation_event: Option<IsolationLogEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

pub struct IsolationRegistry {
    store: Arc<dyn PersistenceStore>,
    isolated: Mutex<HashMap<String, IsolationState>>,
    compensations: AtomicU64,
}

impl IsolationRegistry {
    /// Build the registry and hydrate it from the durable log
    pub async fn new(store: Arc<dyn PersistenceStore>) -> Result<Self, FenceError> {
        let active = store.active_isolations().await?;

        let cache: HashMap<String, IsolationState> = active
            .into_iter()
            .map(|entry| {
                let state = IsolationState {
                    isolated_at: entry.isolated_at,
                    messages_blocked: 0,
                };
                (entry.agent_name, state)
            })
            .collect();

        tracing::info!("Isolation registry ready ({} isolated agents loaded)", cache.len());

        Ok(Self {
            store,
            isolated: Mutex::new(cache),
            compensations: AtomicU64::new(0),
        })
    }

    pub fn is_isolated(&self, agent_name: &str) -> bool {
        self.isolated.lock().contains_key(agent_name)
    }

    pub fn state(&self, agent_name: &str) -> Option<IsolationState> {
        self.isolated.lock().get(agent_name).cloned()
    }

    /// Currently isolated agents, sorted by name
    pub fn isolated_agents(&self) -> Vec<String> {
        let mut agents: Vec<String> = self.isolated.lock().keys().cloned().collect();
        agents.sort();
        agents
    }

    /// Number of cache changes undone after a failed durable write
    pub fn compensations(&self) -> u64 {
        self.compensations.load(Ordering::Relaxed)
    }

    // ========================================================================
    // ENFORCEMENT
    // ========================================================================

    pub async fn isolate(&self, agent_name: &str, reason: &str) -> Result<(), FenceError> {
        let change = TentativeChange::insert(&mut self.isolated.lock(), agent_name)
            .ok_or_else(|| FenceError::AlreadyIsolated(agent_name.to_string()))?;

        match self
            .store
            .append_isolation(agent_name, Some(reason), IsolationStatus::Isolated)
            .await
        {
            Ok(()) => {
                change.commit();
                tracing::warn!("Agent isolated: {} - {}", agent_name, reason);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to persist isolation for {}: {}", agent_name, e);
                self.compensate(change);
                Err(e.into())
            }
        }
    }

    pub async fn release(&self, agent_name: &str) -> Result<(), FenceError> {
        let change = TentativeChange::remove(&mut self.isolated.lock(), agent_name)
            .ok_or_else(|| FenceError::NotIsolated(agent_name.to_string()))?;

        match self
            .store
            .append_isolation(agent_name, None, IsolationStatus::Released)
            .await
        {
            Ok(()) => {
                change.commit();
                tracing::info!("Agent released: {}", agent_name);
                Ok(())
            }
            Err(e) => {
                tracing::error!("Failed to persist release for {}: {}", agent_name, e);
                self.compensate(change);
                Err(e.into())
            }
        }
    }

    fn compensate(&self, change: TentativeChange) {
        let agent = change.agent().to_string();
        let undone = change.compensate(&mut self.isolated.lock());
        self.compensations.fetch_add(1, Ordering::Relaxed);

        if undone {
            tracing::warn!(agent = %agent, "Isolation cache change rolled back");
        } else {
            tracing::warn!(agent = %agent, "Isolation cache changed concurrently; nothing rolled back");
        }
    }

    // ========================================================================
    // AUDIT
    // ========================================================================

    /// Record a blocked message. Returns whether the audit row was written.
    pub async fn block_message(
        &self,
        sender: &str,
        recipient: Option<&str>,
        score: f64,
        layers: serde_json::Value,
    ) -> bool {
        if let Some(state) = self.isolated.lock().get_mut(sender) {
            state.messages_blocked += 1;
        }

        let record = NewBlockedMessage {
            sender: sender.to_string(),
            recipient: recipient.map(str::to_string),
            score,
            layers,
        };

        match self.store.append_blocked(&record).await {
            Ok(()) => {
                tracing::warn!("Message blocked from {} (score: {:.1})", sender, score);
                true
            }
            Err(e) => {
                tracing::error!("Failed to record blocked message from {}: {}", sender, e);
                false
            }
        }
    }

    /// Best-effort audit of a message that was let through
    pub async fn record_clean_message(&self, sender: &str, recipient: Option<&str>, score: f64) {
        let record = NewCleanMessage {
            sender: sender.to_string(),
            recipient: recipient.map(str::to_string),
            score,
        };

        if let Err(e) = self.store.append_clean(&record).await {
            tracing::debug!("Clean message audit skipped for {}: {}", sender, e);
        }
    }

    // ========================================================================
    // QUERIES
    // ========================================================================

    pub async fn get_stats(&self) -> IsolationStats {
        let isolated_agents = self.isolated_agents();
        let compensations = self.compensations();

        let totals = async {
            let blocks = self.store.count_blocked().await?;
            let unique = self.store.count_unique_isolated().await?;
            Ok::<_, crate::store::StoreError>((blocks, unique))
        }
        .await;

        match totals {
            Ok((blocks, unique)) => IsolationStats {
                total_isolated_active: isolated_agents.len(),
                isolated_agents,
                total_blocks_all_time: Some(blocks),
                total_unique_agents_isolated: Some(unique),
                cache_compensations: compensations,
                error: None,
            },
            Err(e) => {
                tracing::error!("Stats query failed: {}", e);
                IsolationStats {
                    total_isolated_active: isolated_agents.len(),
                    isolated_agents,
                    total_blocks_all_time: None,
                    total_unique_agents_isolated: None,
                    cache_compensations: compensations,
                    error: Some("stats_query_failed".to_string()),
                }
            }
        }
    }

    pub async fn get_forensics(&self, agent_name: &str, limit: i64) -> Forensics {
        let history = async {
            let blocked = self.store.recent_blocked(agent_name, limit).await?;
            let event = self.store.latest_isolation(agent_name).await?;
            Ok::<_, crate::store::StoreError>((blocked, event))
        }
        .await;

        match history {
            Ok((blocked_messages, isolation_event)) => Forensics {
                agent: agent_name.to_string(),
                blocked_messages,
                isolation_event,
                error: None,
            },
            Err(e) => {
                tracing::error!("Forensics query failed for {}: {}", agent_name, e);
                Forensics {
                    agent: agent_name.to_string(),
                    blocked_messages: Vec::new(),
                    isolation_event: None,
                    error: Some("forensics_query_failed".to_string()),
                }
            }
        }
    }
}
