//! Component bootstrap

use std::sync::Arc;

use crate::config::Config;
use crate::detector::ContaminationDetector;
use crate::embedding::EmbeddingProvider;
use crate::error::FenceError;
use crate::interceptor::{Interceptor, ThresholdPolicy};
use crate::isolation::IsolationRegistry;
use crate::store::PersistenceStore;

/// The wired detection pipeline
pub struct Fence {
    pub store: Arc<dyn PersistenceStore>,
    pub detector: Arc<ContaminationDetector>,
    pub isolation: Arc<IsolationRegistry>,
    pub interceptor: Interceptor,
}

impl Fence {
    /// Build every component against `store`
    ///
    /// Fails only if the isolation registry cannot hydrate. A baseline load
    /// failure is logged and the detector starts empty.
    pub async fn initialize(
        config: &Config,
        store: Arc<dyn PersistenceStore>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, FenceError> {
        let detector = Arc::new(ContaminationDetector::from_config(embedder, config));

        match store.begin().await {
            Ok(mut uow) => {
                if let Err(e) = detector.load_baselines_from_store(uow.as_mut()).await {
                    tracing::warn!("Baseline load failed, starting with empty baselines: {}", e);
                }
            }
            Err(e) => tracing::warn!("Baseline load skipped: {}", e),
        }

        let isolation = Arc::new(IsolationRegistry::new(Arc::clone(&store)).await?);

        let interceptor = Interceptor::new(
            Arc::clone(&detector),
            Arc::clone(&isolation),
            Arc::clone(&store),
            ThresholdPolicy::from_config(config),
        );

        tracing::info!("NeuroFence initialized (store: {})", store.name());

        Ok(Self {
            store,
            detector,
            isolation,
            interceptor,
        })
    }
}
