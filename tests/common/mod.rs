//! Shared test fixtures

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use neurofence::embedding::{EmbeddingError, EmbeddingProvider};
use neurofence::store::{MemoryStore, PersistenceStore};
use neurofence::{Config, Fence};

/// Texts containing `marker` map to `[0, 1]`, everything else to `[1, 0]`
pub struct MarkerEmbedder {
    marker: String,
}

impl MarkerEmbedder {
    pub fn new(marker: &str) -> Self {
        Self {
            marker: marker.to_string(),
        }
    }
}

impl EmbeddingProvider for MarkerEmbedder {
    fn encode(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.contains(&self.marker) {
            Ok(vec![0.0, 1.0])
        } else {
            Ok(vec![1.0, 0.0])
        }
    }

    fn dimension(&self) -> usize {
        2
    }

    fn model_id(&self) -> &str {
        "marker"
    }
}

/// Wraps another embedder and counts `encode` calls
pub struct CountingEmbedder<E> {
    inner: E,
    calls: AtomicUsize,
}

impl<E> CountingEmbedder<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<E: EmbeddingProvider> EmbeddingProvider for CountingEmbedder<E> {
    fn encode(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.encode(text)
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

pub struct FailingEmbedder;

impl EmbeddingProvider for FailingEmbedder {
    fn encode(&self, _text: &str) -> Result<Vec<f32>, EmbeddingError> {
        Err(EmbeddingError::Backend("unavailable".to_string()))
    }

    fn dimension(&self) -> usize {
        2
    }

    fn model_id(&self) -> &str {
        "failing"
    }
}

pub fn test_config() -> Config {
    Config {
        database_url: "memory://".to_string(),
        ..Config::default()
    }
}

pub async fn fence_with(store: &MemoryStore, embedder: Arc<dyn EmbeddingProvider>) -> Fence {
    let store: Arc<dyn PersistenceStore> = Arc::new(store.clone());
    Fence::initialize(&test_config(), store, embedder)
        .await
        .expect("fence initializes against the memory store")
}
