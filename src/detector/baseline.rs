//! Per-agent behavioral baselines

use serde::{Deserialize, Serialize};

use crate::embedding::EmbeddingError;
use crate::error::FenceError;
use crate::models::AgentBaselineRow;

/// Running centroid of an agent's message embeddings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentBaseline {
    pub centroid: Vec<f32>,
    pub samples: u64,
}

impl AgentBaseline {
    pub fn first(embedding: Vec<f32>) -> Self {
        Self {
            centroid: embedding,
            samples: 1,
        }
    }

    /// `alpha * centroid + (1 - alpha) * embedding`, one more sample
    pub fn blend(&self, embedding: &[f32], alpha: f32) -> Result<Self, EmbeddingError> {
        if embedding.len() != self.centroid.len() {
            return Err(EmbeddingError::Dimension {
                expected: self.centroid.len(),
                actual: embedding.len(),
            });
        }

        let centroid = self
            .centroid
            .iter()
            .zip(embedding)
            .map(|(old, new)| alpha * old + (1.0 - alpha) * new)
            .collect();

        Ok(Self {
            centroid,
            samples: self.samples + 1,
        })
    }

    pub fn centroid_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(&self.centroid)
    }

    /// Decode a persisted row, rejecting anything that cannot be scored against
    pub fn from_row(row: &AgentBaselineRow, dimension: usize) -> Result<Self, FenceError> {
        let load_error = |reason: String| FenceError::Load {
            agent: row.agent_name.clone(),
            reason,
        };

        let text = row
            .centroid
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| load_error("empty centroid".to_string()))?;

        let centroid: Vec<f32> =
            serde_json::from_str(text).map_err(|e| load_error(e.to_string()))?;

        if centroid.len() != dimension {
            return Err(load_error(format!(
                "centroid has {} dimensions, expected {}",
                centroid.len(),
                dimension
            )));
        }

        Ok(Self {
            centroid,
            samples: row.samples.max(0) as u64,
        })
    }
}

/// Outcome of a baseline update
///
/// The in-memory baseline is what scoring reads, so `applied` can be true
/// while `persisted` is false.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BaselineUpdate {
    pub applied: bool,
    pub persisted: bool,
}

impl BaselineUpdate {
    pub fn rejected() -> Self {
        Self::default()
    }

    pub fn memory_only() -> Self {
        Self {
            applied: true,
            persisted: false,
        }
    }
}
