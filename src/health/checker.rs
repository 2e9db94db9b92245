// src/health/checker.rs
use crate::config::HealthCheckConfig;
use crate::metrics::MetricsCollector;
use crate::proxy::{Backend, BackendPool};
use reqwest::Client;
use std::sync::Arc;
use tokio::time::{interval, sleep, timeout};
use tracing::{debug, error, info, warn};

pub struct HealthChecker {
    config: HealthCheckConfig,
    pool: Arc<BackendPool>,
    client: Client,
    metrics: Option<Arc<MetricsCollector>>,
    shutdown_tx: tokio::sync::watch::Sender<bool>,
    shutdown_rx: tokio::sync::watch::Receiver<bool>,
}

#[derive(Debug)]
pub struct HealthCheckResult {
    pub backend_id: String,
    pub healthy: bool,
    pub attempts: u32,
    pub slow_responses: u32,
    pub error: Option<String>,
}

impl HealthChecker {
    pub fn new(
        config: HealthCheckConfig,
        pool: Arc<BackendPool>,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Self {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .expect("Failed to create HTTP client");

        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

        Self {
            config,
            pool,
            client,
            metrics,
            shutdown_tx,
            shutdown_rx,
        }
    }

    /// Probe loop. Runs until `shutdown()` is called; the shutdown signal is
    /// consumed cooperatively between cycles.
    pub async fn start(self: Arc<Self>) {
        let mut interval = interval(self.config.interval());
        let mut shutdown_rx = self.shutdown_rx.clone();

        info!(
            "Starting health checker with interval: {:?}",
            self.config.interval()
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.clone().check_all_backends().await;
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Health checker shutting down");
                        break;
                    }
                }
            }
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    async fn check_all_backends(self: Arc<Self>) {
        let backends = self.pool.snapshot().await;
        let mut tasks = Vec::new();

        for backend in backends {
            let checker = self.clone();
            tasks.push(tokio::spawn(async move {
                checker.probe_backend(&backend).await
            }));
        }

        let results = futures::future::join_all(tasks).await;

        let mut healthy_count = 0;
        let mut unhealthy_count = 0;

        for result in results {
            match result {
                Ok(check_result) => {
                    if check_result.healthy {
                        healthy_count += 1;
                        debug!("Backend {} is healthy", check_result.backend_id);
                    } else {
                        unhealthy_count += 1;
                        warn!(
                            "Backend {} is unhealthy: {:?}",
                            check_result.backend_id, check_result.error
                        );
                    }
                }
                Err(e) => {
                    error!("Health check task join error: {}", e);
                    unhealthy_count += 1;
                }
            }
        }

        if let Some(metrics) = &self.metrics {
            let healthy = self.pool.healthy_count().await;
            let total = self.pool.len().await;
            metrics.update_backend_counts(healthy, total);
        }

        info!(
            "Health check complete: {} healthy, {} unhealthy",
            healthy_count, unhealthy_count
        );
    }

    /// Evaluate one backend and write the verdict to its health flag.
    ///
    /// Up to `max_retries` attempts against the probe path, each bounded by
    /// the probe timeout. An attempt only counts as a success when a success
    /// status arrives within the timeout; an attempt that runs past the
    /// timeout counts as slow. The final verdict requires a qualifying
    /// success AND fewer slow attempts than the retry budget, so an eventual
    /// success behind consistently slow attempts still lands unhealthy.
    pub async fn probe_backend(&self, backend: &Arc<Backend>) -> HealthCheckResult {
        let probe_timeout = self.config.timeout();

        let url = match backend.url.join(&self.config.path) {
            Ok(url) => url,
            Err(e) => {
                // Cannot build a probe URL for this record; treat as a failed probe.
                backend.update_health(false).await;
                return HealthCheckResult {
                    backend_id: backend.id.clone(),
                    healthy: false,
                    attempts: 0,
                    slow_responses: 0,
                    error: Some(format!("invalid probe URL: {}", e)),
                };
            }
        };

        let mut healthy = false;
        let mut slow_responses = 0;
        let mut attempts = 0;
        let mut last_error = None;

        for attempt in 1..=self.config.max_retries {
            attempts = attempt;
            let start = std::time::Instant::now();
            let result = timeout(probe_timeout, self.client.get(url.clone()).send()).await;
            let elapsed = start.elapsed();

            match result {
                Ok(Ok(response)) => {
                    let status = response.status();
                    if status.is_success() && elapsed <= probe_timeout {
                        healthy = true;
                        break;
                    }
                    if elapsed > probe_timeout {
                        slow_responses += 1;
                    }
                    if !status.is_success() {
                        last_error = Some(format!("HTTP {}", status));
                    } else {
                        last_error = Some("success arrived after deadline".to_string());
                    }
                }
                Ok(Err(e)) => {
                    if elapsed >= probe_timeout {
                        slow_responses += 1;
                    }
                    last_error = Some(e.to_string());
                }
                Err(_) => {
                    slow_responses += 1;
                    last_error = Some("probe timed out".to_string());
                }
            }

            if attempt < self.config.max_retries {
                sleep(self.config.retry_delay()).await;
            }
        }

        let verdict = healthy && slow_responses < self.config.max_retries;
        backend.update_health(verdict).await;

        if let Some(metrics) = &self.metrics {
            metrics.update_backend_health(&backend.id, verdict);
        }

        HealthCheckResult {
            backend_id: backend.id.clone(),
            healthy: verdict,
            attempts,
            slow_responses,
            error: if verdict { None } else { last_error },
        }
    }
}
