//! Text embedding
//!
//! The detector consumes embeddings through `EmbeddingProvider` and never
//! cares which backend produced them. `HashingEmbedder` is the built-in
//! backend: a deterministic feature-hashing encoder that needs no model
//! weights, which keeps the service self-contained.

use sha2::{Digest, Sha256};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    Dimension { expected: usize, actual: usize },

    #[error("embedding backend error: {0}")]
    Backend(String),
}

/// Text -> fixed-dimension vector
pub trait EmbeddingProvider: Send + Sync {
    fn encode(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    fn dimension(&self) -> usize;

    fn model_id(&self) -> &str;
}

/// Weight of an in-word character trigram relative to a whole word
const TRIGRAM_WEIGHT: f32 = 0.5;

/// Feature-hashing encoder over words and character trigrams
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    model_id: String,
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(model_id: impl Into<String>, dimension: usize) -> Self {
        Self {
            model_id: model_id.into(),
            dimension: dimension.max(1),
        }
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let digest = Sha256::digest(feature.as_bytes());
        let mut bucket = [0u8; 8];
        bucket.copy_from_slice(&digest[..8]);
        let index = (u64::from_le_bytes(bucket) % self.dimension as u64) as usize;
        let sign = if digest[8] & 1 == 0 { 1.0 } else { -1.0 };
        vector[index] += sign * weight;
    }
}

impl EmbeddingProvider for HashingEmbedder {
    fn encode(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vector = vec![0.0f32; self.dimension];
        let lower = text.to_lowercase();

        for word in lower.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            self.add_feature(&mut vector, word, 1.0);

            let chars: Vec<char> = word.chars().collect();
            for gram in chars.windows(3) {
                let gram: String = gram.iter().collect();
                self.add_feature(&mut vector, &format!("#{}", gram), TRIGRAM_WEIGHT);
            }
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }

        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
