// src/proxy/proxy.rs
use crate::load_balancer::LoadBalancer;
use crate::metrics::MetricsCollector;
use crate::proxy::BackendPool;
use hyper::client::HttpConnector;
use hyper::{Body, Request, Response, Uri};
use hyper_tls::HttpsConnector;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("No healthy backends available")]
    NoHealthyBackends,

    #[error("Invalid forwarding target: {0}")]
    InvalidTarget(String),

    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl From<ProxyError> for Response<Body> {
    fn from(err: ProxyError) -> Self {
        let (status, message) = match err {
            ProxyError::NoHealthyBackends => (503, "No healthy backends available"),
            ProxyError::InvalidTarget(_) => (502, "Bad gateway"),
            ProxyError::Upstream(_) => (502, "Bad gateway"),
        };

        Response::builder()
            .status(status)
            .header("Content-Type", "text/plain")
            .body(Body::from(message))
            .expect("static error response")
    }
}

/// Forwards each inbound request to one selected backend.
///
/// A single attempt per request: a forwarding failure after selection goes
/// back to the caller as a gateway error, never retried against another
/// backend.
pub struct Proxy {
    pool: Arc<BackendPool>,
    balancer: Arc<dyn LoadBalancer>,
    client: hyper::Client<HttpsConnector<HttpConnector>>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl Proxy {
    pub fn new(
        pool: Arc<BackendPool>,
        balancer: Arc<dyn LoadBalancer>,
        metrics: Option<Arc<MetricsCollector>>,
    ) -> Self {
        let client = hyper::Client::builder().build(HttpsConnector::new());

        Self {
            pool,
            balancer,
            client,
            metrics,
        }
    }

    pub fn pool(&self) -> Arc<BackendPool> {
        self.pool.clone()
    }

    pub async fn handle(&self, mut req: Request<Body>) -> Result<Response<Body>, ProxyError> {
        let backends = self.pool.snapshot().await;
        let backend = self
            .balancer
            .select_backend(&backends)
            .await
            .ok_or(ProxyError::NoHealthyBackends)?;

        let request_id = Uuid::new_v4();
        let method = req.method().clone();

        let target = Self::target_uri(&backend.url, req.uri())?;
        debug!(%request_id, %method, backend = %backend.id, %target, "Forwarding request");
        *req.uri_mut() = target;

        let start = Instant::now();
        match self.client.request(req).await {
            Ok(response) => {
                backend.record_request(response.status().is_success());
                if let Some(metrics) = &self.metrics {
                    metrics.record_request(
                        method.as_str(),
                        response.status().as_u16(),
                        &backend.id,
                        start.elapsed(),
                    );
                }
                Ok(response)
            }
            Err(e) => {
                backend.record_request(false);
                if let Some(metrics) = &self.metrics {
                    metrics.record_request(method.as_str(), 502, &backend.id, start.elapsed());
                }
                warn!(%request_id, backend = %backend.id, error = %e, "Forwarding failed");
                Err(ProxyError::Upstream(e.to_string()))
            }
        }
    }

    /// Graft the inbound path and query onto the backend's base URL.
    fn target_uri(base: &url::Url, inbound: &Uri) -> Result<Uri, ProxyError> {
        let path_and_query = inbound
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");

        let mut target = base.clone();
        target.set_path("");
        target.set_query(None);

        format!("{}{}", target.as_str().trim_end_matches('/'), path_and_query)
            .parse()
            .map_err(|e: hyper::http::uri::InvalidUri| ProxyError::InvalidTarget(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_mapping_matches_surface() {
        let resp: Response<Body> = ProxyError::NoHealthyBackends.into();
        assert_eq!(resp.status(), 503);

        let resp: Response<Body> = ProxyError::Upstream("connection refused".into()).into();
        assert_eq!(resp.status(), 502);
    }

    #[test]
    fn target_uri_keeps_path_and_query() {
        let base = url::Url::parse("http://localhost:3000").unwrap();
        let inbound: Uri = "http://lb.local/api/v1/users?page=2".parse().unwrap();

        let target = Proxy::target_uri(&base, &inbound).unwrap();
        assert_eq!(target.to_string(), "http://localhost:3000/api/v1/users?page=2");
    }

    #[test]
    fn target_uri_defaults_to_root() {
        let base = url::Url::parse("http://localhost:3000").unwrap();
        let inbound: Uri = "http://lb.local".parse().unwrap();

        let target = Proxy::target_uri(&base, &inbound).unwrap();
        assert_eq!(target.to_string(), "http://localhost:3000/");
    }
}
