//! Contamination detector
//!
//! Scores a message from 0 to 100 as the sum of five independent layers:
//!
//! | Layer | Cap | Signal |
//! |---|---|---|
//! | signature | 25 | known injection phrases, fuzzy near misses |
//! | semantic | 40 | cosine distance from the sender's baseline centroid |
//! | statistical | 15 | exfiltration keyword density, character entropy |
//! | risk keywords | 10 | high-risk phrases, URLs and addresses |
//! | adversarial | 10 | encoding vocabulary, obfuscation runs |
//!
//! The detector also owns the per-agent baselines the semantic layer
//! compares against.

pub mod baseline;
pub mod layers;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::Config;
use crate::embedding::{EmbeddingError, EmbeddingProvider};
use crate::error::FenceError;
use crate::store::UnitOfWork;

pub use baseline::{AgentBaseline, BaselineUpdate};

/// Per-layer breakdown of a contamination score
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct LayerScores {
    pub signature_detection: f64,
    pub semantic_anomaly: f64,
    pub statistical_analysis: f64,
    pub risk_keywords: f64,
    pub adversarial_detection: f64,
    pub total: f64,
}

impl LayerScores {
    pub fn new(
        signature_detection: f64,
        semantic_anomaly: f64,
        statistical_analysis: f64,
        risk_keywords: f64,
        adversarial_detection: f64,
    ) -> Self {
        Self {
            signature_detection,
            semantic_anomaly,
            statistical_analysis,
            risk_keywords,
            adversarial_detection,
            total: signature_detection
                + semantic_anomaly
                + statistical_analysis
                + risk_keywords
                + adversarial_detection,
        }
    }
}

pub struct ContaminationDetector {
    embedder: Arc<dyn EmbeddingProvider>,
    alpha: f32,
    baselines: RwLock<HashMap<String, AgentBaseline>>,
}

impl ContaminationDetector {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, alpha: f32) -> Self {
        tracing::info!(
            model = embedder.model_id(),
            dimension = embedder.dimension(),
            "Detector ready"
        );

        Self {
            embedder,
            alpha,
            baselines: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(embedder: Arc<dyn EmbeddingProvider>, config: &Config) -> Self {
        Self::new(embedder, config.baseline_alpha)
    }

    /// Score a message. Reads the sender's baseline but never changes it.
    pub fn analyze(&self, agent_name: &str, content: &str) -> LayerScores {
        let scores = LayerScores::new(
            layers::signature_score(content),
            self.semantic_score(agent_name, content),
            layers::statistical_score(content),
            layers::risk_keyword_score(content),
            layers::adversarial_score(content),
        );

        tracing::info!("Analysis complete - {}: {:.1} points", agent_name, scores.total);
        scores
    }

    /// Layer 2. Agents without a baseline score 0.
    fn semantic_score(&self, agent_name: &str, content: &str) -> f64 {
        if !self.baselines.read().contains_key(agent_name) {
            return 0.0;
        }

        match self.baseline_distance(agent_name, content) {
            Ok(Some(distance)) => layers::semantic_band(distance),
            Ok(None) => 0.0,
            Err(e) => {
                tracing::warn!(agent = %agent_name, error = %e, "Semantic anomaly detection error");
                0.0
            }
        }
    }

    fn baseline_distance(&self, agent_name: &str, content: &str) -> Result<Option<f64>, EmbeddingError> {
        let embedding = self.embedder.encode(content)?;

        let baselines = self.baselines.read();
        match baselines.get(agent_name) {
            Some(baseline) => layers::cosine_distance(&embedding, &baseline.centroid).map(Some),
            None => Ok(None),
        }
    }

    /// Fold `content` into the agent's baseline, then persist it through `uow` if given
    ///
    /// The in-memory update is never rolled back when the durable write fails.
    pub async fn update_baseline(
        &self,
        agent_name: &str,
        content: &str,
        uow: Option<&mut dyn UnitOfWork>,
    ) -> BaselineUpdate {
        let record = match self.apply_baseline(agent_name, content) {
            Ok(record) => record,
            Err(e) => {
                tracing::error!(agent = %agent_name, error = %e, "Error updating baseline");
                return BaselineUpdate::rejected();
            }
        };

        tracing::info!("Baseline updated for {} (samples={})", agent_name, record.samples);

        let Some(uow) = uow else {
            return BaselineUpdate::memory_only();
        };

        match persist_baseline(uow, agent_name, &record).await {
            Ok(()) => BaselineUpdate {
                applied: true,
                persisted: true,
            },
            Err(e) => {
                tracing::error!(agent = %agent_name, error = %e, "Baseline persistence failed");
                BaselineUpdate::memory_only()
            }
        }
    }

    fn apply_baseline(&self, agent_name: &str, content: &str) -> Result<AgentBaseline, FenceError> {
        let embedding = self.embedder.encode(content)?;
        if embedding.len() != self.embedder.dimension() {
            return Err(EmbeddingError::Dimension {
                expected: self.embedder.dimension(),
                actual: embedding.len(),
            }
            .into());
        }

        // Read-modify-write under one write guard so same-agent updates serialize
        let mut baselines = self.baselines.write();
        let updated = match baselines.get(agent_name) {
            Some(existing) => existing.blend(&embedding, self.alpha)?,
            None => AgentBaseline::first(embedding),
        };
        baselines.insert(agent_name.to_string(), updated.clone());

        Ok(updated)
    }

    /// Hydrate baselines from the store. Malformed rows are skipped.
    pub async fn load_baselines_from_store(&self, uow: &mut dyn UnitOfWork) -> Result<usize, FenceError> {
        let rows = uow.load_baselines().await?;
        let dimension = self.embedder.dimension();

        let mut loaded = 0;
        for row in &rows {
            match AgentBaseline::from_row(row, dimension) {
                Ok(baseline) => {
                    self.baselines.write().insert(row.agent_name.clone(), baseline);
                    loaded += 1;
                }
                Err(e) => tracing::warn!("Skipping baseline row: {}", e),
            }
        }

        tracing::info!("Loaded {} baselines from store ({} rows)", loaded, rows.len());
        Ok(loaded)
    }

    pub fn get_baseline(&self, agent_name: &str) -> Option<Vec<f32>> {
        self.baselines.read().get(agent_name).map(|b| b.centroid.clone())
    }

    pub fn baseline(&self, agent_name: &str) -> Option<AgentBaseline> {
        self.baselines.read().get(agent_name).cloned()
    }

    pub fn baseline_count(&self) -> usize {
        self.baselines.read().len()
    }
}

async fn persist_baseline(
    uow: &mut dyn UnitOfWork,
    agent_name: &str,
    record: &AgentBaseline,
) -> Result<(), FenceError> {
    let centroid = record.centroid_json().map_err(crate::store::StoreError::from)?;
    uow.upsert_baseline(agent_name, &centroid, record.samples as i64).await?;
    Ok(())
}
