// tests/proxy_tests.rs
use hyper::{Body, Request, Response, StatusCode};
use request_router::load_balancer::RoundRobinBalancer;
use request_router::proxy::{BackendPool, Proxy, ProxyError};
use std::sync::Arc;

fn proxy_over(pool: Arc<BackendPool>) -> Proxy {
    Proxy::new(pool, Arc::new(RoundRobinBalancer::new()), None)
}

fn get(path: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(path)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn empty_pool_reports_no_healthy_backends() {
    let proxy = proxy_over(Arc::new(BackendPool::new(Vec::new())));

    let err = proxy.handle(get("/")).await.unwrap_err();
    assert!(matches!(err, ProxyError::NoHealthyBackends));

    let resp: Response<Body> = err.into();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn all_unhealthy_pool_reports_no_healthy_backends() {
    let pool = Arc::new(BackendPool::new(Vec::new()));
    pool.register("http://localhost:3000").await.unwrap();
    pool.snapshot().await[0].update_health(false).await;

    let proxy = proxy_over(pool);

    let err = proxy.handle(get("/")).await.unwrap_err();
    assert!(matches!(err, ProxyError::NoHealthyBackends));
}

#[tokio::test]
async fn request_is_forwarded_unchanged() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/items?page=2")
        .match_header("x-caller", "integration-test")
        .with_status(200)
        .with_body("from backend")
        .create_async()
        .await;

    let pool = Arc::new(BackendPool::new(Vec::new()));
    pool.register(&server.url()).await.unwrap();
    let proxy = proxy_over(pool);

    let req = Request::builder()
        .method("GET")
        .uri("/api/items?page=2")
        .header("x-caller", "integration-test")
        .body(Body::empty())
        .unwrap();

    let resp = proxy.handle(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = hyper::body::to_bytes(resp.into_body()).await.unwrap();
    assert_eq!(&body[..], b"from backend");
    mock.assert_async().await;
}

#[tokio::test]
async fn forwarding_failure_is_not_retried_elsewhere() {
    // One dead backend, one live one; the dead backend's turn must surface
    // as an upstream error rather than falling through to the live backend.
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/")
        .with_status(200)
        .expect(0)
        .create_async()
        .await;

    let dead_addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let pool = Arc::new(BackendPool::new(Vec::new()));
    // Counter at 0 inspects index 1 first: put the dead backend there.
    pool.register(&server.url()).await.unwrap();
    pool.register(&format!("http://{}", dead_addr)).await.unwrap();
    let proxy = proxy_over(pool);

    let err = proxy.handle(get("/")).await.unwrap_err();
    assert!(matches!(err, ProxyError::Upstream(_)));

    let resp: Response<Body> = err.into();
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    mock.assert_async().await;
}

#[tokio::test]
async fn unhealthy_backend_receives_no_traffic() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/")
        .with_status(200)
        .expect_at_least(10)
        .create_async()
        .await;

    let dead_addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    let pool = Arc::new(BackendPool::new(Vec::new()));
    pool.register(&server.url()).await.unwrap();
    pool.register(&format!("http://{}", dead_addr)).await.unwrap();
    pool.snapshot().await[1].update_health(false).await;

    let proxy = proxy_over(pool);
    for _ in 0..10 {
        let resp = proxy.handle(get("/")).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }
    mock.assert_async().await;
}
