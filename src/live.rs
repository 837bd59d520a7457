use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::{
    config::ServiceConfig,
    error::Result,
    service::QueryService,
};

/// A [`QueryService`] that can be replaced while serving.
///
/// Callers take a [`snapshot`](LiveService::snapshot) and use it for the
/// whole request. [`reload`](LiveService::reload) builds a complete new
/// service off to the side and publishes it with one atomic store, so a
/// request never sees a half-updated knowledge base or index.
pub struct LiveService {
    current: ArcSwap<QueryService>,
    config: ServiceConfig,
}

impl LiveService {
    pub fn new(service: QueryService, config: ServiceConfig) -> Self {
        Self {
            current: ArcSwap::from_pointee(service),
            config,
        }
    }

    /// The service currently in effect.
    pub fn snapshot(&self) -> Arc<QueryService> {
        self.current.load_full()
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    /// Reload the corpus from the configured path, keeping the loaded model
    /// and observer. On failure the current service stays in place.
    ///
    /// Returns the number of entries now being served.
    pub fn reload(&self) -> Result<usize> {
        let current = self.snapshot();
        let next = QueryService::from_config(
            &self.config,
            current.embedder().clone(),
            current.observer().clone(),
        )
        .inspect_err(|e| {
            tracing::error!(error = %e, "reload failed, keeping current corpus");
        })?;

        let entries = next.knowledge_base().len();
        self.current.store(Arc::new(next));
        tracing::info!(entries, "knowledge base reloaded");

        Ok(entries)
    }
}

impl std::fmt::Debug for LiveService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveService")
            .field("current", &self.snapshot())
            .field("config", &self.config)
            .finish()
    }
}
