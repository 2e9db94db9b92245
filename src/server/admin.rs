// src/server/admin.rs
use crate::proxy::{BackendPool, PoolError};
use hyper::{Body, Request, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Deserialize)]
struct BackendAddressRequest {
    url: String,
}

fn plain(status: StatusCode, body: &'static str) -> Response<Body> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain")
        .body(Body::from(body))
        .expect("static admin response")
}

async fn decode_body(req: Request<Body>) -> Option<BackendAddressRequest> {
    let bytes = hyper::body::to_bytes(req.into_body()).await.ok()?;
    serde_json::from_slice(&bytes).ok()
}

/// POST /register — add a backend to the pool.
pub async fn register(req: Request<Body>, pool: Arc<BackendPool>) -> Response<Body> {
    let body = match decode_body(req).await {
        Some(body) => body,
        None => return plain(StatusCode::BAD_REQUEST, "Invalid Request"),
    };

    match pool.register(&body.url).await {
        Ok(_) => plain(StatusCode::OK, "OK"),
        Err(PoolError::InvalidAddress(e)) => {
            warn!("Register rejected: {}", e);
            plain(StatusCode::BAD_REQUEST, "Invalid Request")
        }
    }
}

/// POST /unregister — remove a backend from the pool.
///
/// Responds 200 whether or not the address was registered; a miss is only
/// logged by the pool.
pub async fn unregister(req: Request<Body>, pool: Arc<BackendPool>) -> Response<Body> {
    let body = match decode_body(req).await {
        Some(body) => body,
        None => return plain(StatusCode::BAD_REQUEST, "Invalid Request"),
    };

    pool.unregister(&body.url).await;
    plain(StatusCode::OK, "OK")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool() -> Arc<BackendPool> {
        Arc::new(BackendPool::new(Vec::new()))
    }

    fn post(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/register")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn register_accepts_valid_backend() {
        let pool = pool();
        let resp = register(post(r#"{"url": "http://localhost:3000"}"#), pool.clone()).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(pool.len().await, 1);
    }

    #[tokio::test]
    async fn register_rejects_undecodable_body() {
        let pool = pool();
        let resp = register(post("not json"), pool.clone()).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(pool.is_empty().await);
    }

    #[tokio::test]
    async fn register_rejects_malformed_url() {
        let pool = pool();
        let resp = register(post(r#"{"url": "::nope::"}"#), pool.clone()).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert!(pool.is_empty().await);
    }

    #[tokio::test]
    async fn unregister_is_ok_even_when_absent() {
        let pool = pool();
        let resp = unregister(post(r#"{"url": "http://localhost:9999"}"#), pool).await;

        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn unregister_removes_registered_backend() {
        let pool = pool();
        pool.register("http://localhost:3000").await.unwrap();

        let resp = unregister(post(r#"{"url": "http://localhost:3000"}"#), pool.clone()).await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert!(pool.is_empty().await);
    }
}
