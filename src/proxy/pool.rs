// src/proxy/pool.rs
use super::backend::Backend;
use crate::config::BackendConfig;
use std::sync::Arc;
use tokio::sync::RwLock;
use url::Url;

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("invalid backend address: {0}")]
    InvalidAddress(String),
}

/// Ordered registry of backends.
///
/// The ordering is load-bearing: the round-robin cursor indexes into it, so
/// removal must not reshuffle the survivors. All structural access goes
/// through one lock; writers are exclusive, snapshots see a consistent list.
#[derive(Clone)]
pub struct BackendPool {
    backends: Arc<RwLock<Vec<Arc<Backend>>>>,
}

impl BackendPool {
    pub fn new(configs: Vec<BackendConfig>) -> Self {
        let backends = configs
            .into_iter()
            .map(|config| Arc::new(Backend::new(config.url)))
            .collect();

        Self {
            backends: Arc::new(RwLock::new(backends)),
        }
    }

    /// Parse and append a new backend at the end of the sequence.
    ///
    /// Duplicate addresses are accepted as separate entries; each occupies
    /// its own round-robin slot.
    pub async fn register(&self, address: &str) -> Result<Arc<Backend>, PoolError> {
        let url = Url::parse(address)
            .map_err(|e| PoolError::InvalidAddress(format!("{}: {}", address, e)))?;

        let backend = Arc::new(Backend::new(url));

        let mut backends = self.backends.write().await;
        if backends.iter().any(|b| b.url == backend.url) {
            tracing::warn!("Backend {} already registered, adding duplicate entry", backend.id);
        }
        backends.push(backend.clone());

        tracing::info!("Backend {} registered", backend.id);
        Ok(backend)
    }

    /// Remove the first backend whose normalized URL matches `address`.
    ///
    /// Returns false when nothing matched; an unparseable address can never
    /// match and is reported the same way. Removal is stable.
    pub async fn unregister(&self, address: &str) -> bool {
        let url = match Url::parse(address) {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Unregister request with unparseable address {}: {}", address, e);
                return false;
            }
        };

        let mut backends = self.backends.write().await;
        match backends.iter().position(|b| b.url == url) {
            Some(index) => {
                let removed = backends.remove(index);
                tracing::info!("Backend {} unregistered", removed.id);
                true
            }
            None => {
                tracing::warn!("Backend {} not found, nothing to unregister", address);
                false
            }
        }
    }

    /// Point-in-time copy of the registry under a single lock acquisition.
    pub async fn snapshot(&self) -> Vec<Arc<Backend>> {
        self.backends.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.backends.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.backends.read().await.is_empty()
    }

    pub async fn healthy_count(&self) -> usize {
        self.backends
            .read()
            .await
            .iter()
            .filter(|b| b.is_healthy())
            .count()
    }
}
