//! Decision engine
//!
//! Per message: fast isolation check, score, apply the threshold policy,
//! then audit and enforce through the isolation registry. Holds no state of
//! its own.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::Config;
use crate::detector::{BaselineUpdate, ContaminationDetector, LayerScores};
use crate::isolation::{Forensics, IsolationRegistry, IsolationStats};
use crate::store::PersistenceStore;

/// Score reported for messages from an isolated sender
pub const ISOLATED_SCORE: f64 = 100.0;

/// One inter-agent message; never persisted as such
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub sender: String,
    pub recipient: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThresholdPolicy {
    /// Scores below this pass
    pub safe: f64,
    /// Scores at or above this are blocked
    pub block: f64,
    pub isolation_enabled: bool,
}

impl ThresholdPolicy {
    /// A safe threshold above the block threshold is lowered to it
    pub fn from_config(config: &Config) -> Self {
        let block = config.block_threshold();
        let mut safe = config.safe_threshold;
        if safe > block {
            tracing::warn!(
                "Safe threshold {:.1} exceeds block threshold {:.1}; using {:.1}",
                safe,
                block,
                block
            );
            safe = block;
        }

        Self {
            safe,
            block,
            isolation_enabled: config.isolation_enabled,
        }
    }

    pub fn decide(&self, score: f64) -> Decision {
        if score < self.safe {
            Decision::Pass
        } else if score < self.block {
            Decision::Escalate
        } else {
            Decision::Block
        }
    }
}

impl Default for ThresholdPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Pass,
    Escalate,
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Passed,
    Escalated,
    Blocked,
    BlockedAndIsolated,
}

impl Action {
    pub fn allowed(&self) -> bool {
        matches!(self, Action::Passed | Action::Escalated)
    }
}

/// Layer breakdown returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LayerReport {
    /// Fast path: the detector never ran
    Isolation { isolation: bool },
    Scored(LayerScores),
}

#[derive(Debug, Clone, Serialize)]
pub struct InterceptOutcome {
    pub allowed: bool,
    pub action: Action,
    pub reason: String,
    pub score: f64,
    pub layers: LayerReport,
    /// Name of the sender when this message got it isolated
    pub agent_isolated: Option<String>,
    pub flagged: bool,
}

pub struct Interceptor {
    detector: Arc<ContaminationDetector>,
    isolation: Arc<IsolationRegistry>,
    store: Arc<dyn PersistenceStore>,
    policy: ThresholdPolicy,
}

impl Interceptor {
    pub fn new(
        detector: Arc<ContaminationDetector>,
        isolation: Arc<IsolationRegistry>,
        store: Arc<dyn PersistenceStore>,
        policy: ThresholdPolicy,
    ) -> Self {
        tracing::info!(
            "Interceptor ready (safe<{:.1}, block>={:.1}, isolation={})",
            policy.safe,
            policy.block,
            policy.isolation_enabled
        );

        Self {
            detector,
            isolation,
            store,
            policy,
        }
    }

    pub async fn intercept(&self, message: &Message) -> InterceptOutcome {
        let sender = message.sender.as_str();
        let recipient = message.recipient.as_deref();

        if self.isolation.is_isolated(sender) {
            let layers = LayerReport::Isolation { isolation: true };
            self.isolation
                .block_message(sender, recipient, ISOLATED_SCORE, layers_json(&layers))
                .await;
            tracing::warn!("Fast block for isolated agent: {}", sender);

            return InterceptOutcome {
                allowed: false,
                action: Action::Blocked,
                reason: "Sender is isolated".to_string(),
                score: ISOLATED_SCORE,
                layers,
                agent_isolated: None,
                flagged: false,
            };
        }

        let scores = self.detector.analyze(sender, &message.content);
        let score = scores.total;
        let decision = self.policy.decide(score);
        tracing::info!("Decision for {}: {:?} (score={:.1})", sender, decision, score);

        match decision {
            Decision::Pass => {
                self.isolation.record_clean_message(sender, recipient, score).await;
                InterceptOutcome {
                    allowed: true,
                    action: Action::Passed,
                    reason: "Message within safe parameters".to_string(),
                    score,
                    layers: LayerReport::Scored(scores),
                    agent_isolated: None,
                    flagged: false,
                }
            }
            Decision::Escalate => {
                self.isolation.record_clean_message(sender, recipient, score).await;
                InterceptOutcome {
                    allowed: true,
                    action: Action::Escalated,
                    reason: "Message flagged for review".to_string(),
                    score,
                    layers: LayerReport::Scored(scores),
                    agent_isolated: None,
                    flagged: true,
                }
            }
            Decision::Block => self.block(sender, recipient, scores).await,
        }
    }

    async fn block(&self, sender: &str, recipient: Option<&str>, scores: LayerScores) -> InterceptOutcome {
        let score = scores.total;
        let layers = LayerReport::Scored(scores);
        self.isolation
            .block_message(sender, recipient, score, layers_json(&layers))
            .await;

        let mut isolated = false;
        if self.policy.isolation_enabled {
            let reason = format!("High contamination score: {:.1} points", score);
            match self.isolation.isolate(sender, &reason).await {
                Ok(()) => isolated = true,
                Err(e) => tracing::warn!("Isolation of {} not applied: {}", sender, e),
            }
        }

        let (action, reason) = if isolated {
            (
                Action::BlockedAndIsolated,
                format!("Contamination {:.1} points detected - IMMEDIATE ISOLATION", score),
            )
        } else {
            (
                Action::Blocked,
                format!("Contamination {:.1} points detected - BLOCKED", score),
            )
        };

        InterceptOutcome {
            allowed: false,
            action,
            reason,
            score,
            layers,
            agent_isolated: isolated.then(|| sender.to_string()),
            flagged: false,
        }
    }

    /// Learn from a known-good message, persisting when the store allows it
    pub async fn update_agent_baseline(&self, agent_name: &str, content: &str) -> BaselineUpdate {
        let mut uow = match self.store.begin().await {
            Ok(uow) => uow,
            Err(e) => {
                tracing::debug!("Baseline persistence unavailable, updating memory only: {}", e);
                return self.detector.update_baseline(agent_name, content, None).await;
            }
        };

        let result = self
            .detector
            .update_baseline(agent_name, content, Some(uow.as_mut()))
            .await;

        if !result.persisted {
            return result;
        }

        match uow.commit().await {
            Ok(()) => result,
            Err(e) => {
                tracing::error!("Baseline commit failed for {}: {}", agent_name, e);
                BaselineUpdate::memory_only()
            }
        }
    }

    pub async fn get_isolation_summary(&self) -> IsolationStats {
        self.isolation.get_stats().await
    }

    pub async fn get_forensics(&self, agent_name: &str, limit: i64) -> Forensics {
        self.isolation.get_forensics(agent_name, limit).await
    }
}

fn layers_json(layers: &LayerReport) -> serde_json::Value {
    serde_json::to_value(layers).unwrap_or(serde_json::Value::Null)
}
