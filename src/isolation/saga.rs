//! Tentative cache changes for isolate/release
//!
//! Both operations mutate the cache first, then write the durable log. A
//! `TentativeChange` holds what was done to the cache so a failed write can
//! undo exactly that and nothing else.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use super::IsolationState;

#[derive(Debug)]
pub enum TentativeChange {
    /// `isolate` inserted a fresh entry
    Inserted {
        agent: String,
        isolated_at: DateTime<Utc>,
    },
    /// `release` removed this entry
    Removed { agent: String, prior: IsolationState },
}

impl TentativeChange {
    /// Insert a fresh entry unless the agent is already present
    pub fn insert(cache: &mut HashMap<String, IsolationState>, agent: &str) -> Option<Self> {
        if cache.contains_key(agent) {
            return None;
        }

        let state = IsolationState::new();
        let isolated_at = state.isolated_at;
        cache.insert(agent.to_string(), state);

        Some(Self::Inserted {
            agent: agent.to_string(),
            isolated_at,
        })
    }

    /// Remove the agent's entry, keeping it for compensation
    pub fn remove(cache: &mut HashMap<String, IsolationState>, agent: &str) -> Option<Self> {
        cache.remove(agent).map(|prior| Self::Removed {
            agent: agent.to_string(),
            prior,
        })
    }

    pub fn agent(&self) -> &str {
        match self {
            Self::Inserted { agent, .. } | Self::Removed { agent, .. } => agent,
        }
    }

    /// The durable write succeeded; the cache change stands
    pub fn commit(self) {
        tracing::trace!(agent = %self.agent(), "Isolation change committed");
    }

    /// The durable write failed; undo the cache change
    ///
    /// Returns false when a concurrent call already changed the entry and
    /// there was nothing left to undo.
    pub fn compensate(self, cache: &mut HashMap<String, IsolationState>) -> bool {
        match self {
            Self::Inserted { agent, isolated_at } => {
                // Only remove the entry this change created
                let ours = cache
                    .get(&agent)
                    .is_some_and(|state| state.isolated_at == isolated_at);
                if ours {
                    cache.remove(&agent);
                }
                ours
            }
            Self::Removed { agent, prior } => {
                let mut restored = false;
                cache.entry(agent).or_insert_with(|| {
                    restored = true;
                    prior
                });
                restored
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_is_not_reentrant() {
        let mut cache = HashMap::new();
        assert!(TentativeChange::insert(&mut cache, "a").is_some());
        assert!(TentativeChange::insert(&mut cache, "a").is_none());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_compensate_insert_removes_own_entry() {
        let mut cache = HashMap::new();
        let change = TentativeChange::insert(&mut cache, "a").unwrap();
        assert!(change.compensate(&mut cache));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_compensate_insert_leaves_foreign_entry() {
        let mut cache = HashMap::new();
        let change = TentativeChange::insert(&mut cache, "a").unwrap();

        // released and re-isolated by someone else in the meantime
        cache.remove("a");
        let mut other = IsolationState::new();
        other.isolated_at = other.isolated_at + chrono::Duration::seconds(5);
        cache.insert("a".to_string(), other.clone());

        assert!(!change.compensate(&mut cache));
        assert_eq!(cache.get("a"), Some(&other));
    }

    #[test]
    fn test_compensate_remove_restores_prior_state() {
        let mut cache = HashMap::new();
        let mut state = IsolationState::new();
        state.messages_blocked = 4;
        cache.insert("a".to_string(), state.clone());

        let change = TentativeChange::remove(&mut cache, "a").unwrap();
        assert!(cache.is_empty());
        assert!(change.compensate(&mut cache));
        assert_eq!(cache.get("a"), Some(&state));
    }
}
