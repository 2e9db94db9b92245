// src/proxy/backend.rs
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::RwLock;
use url::Url;

/// A single upstream backend server.
///
/// The health flag is single-writer (the health checker) and many-reader
/// (every request path), so it lives in a sequentially consistent atomic
/// rather than behind the pool lock.
#[derive(Debug)]
pub struct Backend {
    pub id: String,
    pub url: Url,

    // Runtime state
    healthy: AtomicBool,
    total_requests: AtomicU64,
    failed_requests: AtomicU64,
    last_health_check: RwLock<Option<DateTime<Utc>>>,
}

impl Backend {
    pub fn new(url: Url) -> Self {
        let id = format!(
            "{}:{}",
            url.host_str().unwrap_or("unknown"),
            url.port_or_known_default().unwrap_or(80)
        );

        Self {
            id,
            url,
            // New backends are immediately eligible for selection; the first
            // probe cycle corrects the flag if they are not actually up.
            healthy: AtomicBool::new(true),
            total_requests: AtomicU64::new(0),
            failed_requests: AtomicU64::new(0),
            last_health_check: RwLock::new(None),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }

    pub async fn update_health(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);

        let mut last_check = self.last_health_check.write().await;
        *last_check = Some(Utc::now());
    }

    pub async fn last_health_check(&self) -> Option<DateTime<Utc>> {
        *self.last_health_check.read().await
    }

    pub fn record_request(&self, success: bool) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.failed_requests.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn get_metrics(&self) -> BackendMetrics {
        BackendMetrics {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            failed_requests: self.failed_requests.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug)]
pub struct BackendMetrics {
    pub total_requests: u64,
    pub failed_requests: u64,
}
