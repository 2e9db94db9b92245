//! src/bin/ping_backend.rs
//! Minimal backend for manual testing of the load balancer.
//! Run: cargo run --bin ping_backend -- <port> [--unhealthy]

use hyper::{
    service::{make_service_fn, service_fn},
    Body, Request, Response, Server, StatusCode,
};
use std::{
    convert::Infallible,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
};

#[derive(Clone)]
struct BackendState {
    port: u16,
    req_counter: Arc<AtomicU64>,
    healthy_flag: Arc<AtomicBool>,
}

async fn handle(
    req: Request<Body>,
    state: BackendState,
) -> Result<Response<Body>, Infallible> {
    let path = req.uri().path().to_owned();

    // /ping is the liveness probe path
    if path == "/ping" {
        if state.healthy_flag.load(Ordering::SeqCst) {
            return Ok(Response::new(Body::from("OK")));
        } else {
            return Ok(Response::builder()
                .status(StatusCode::SERVICE_UNAVAILABLE)
                .body(Body::from("Unhealthy"))
                .unwrap());
        }
    }

    let n = state.req_counter.fetch_add(1, Ordering::SeqCst) + 1;
    let body = format!(
        r#"{{"port":{},"req":{},"path":"{}"}}"#,
        state.port, n, path
    );

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header("Content-Type", "application/json")
        .body(Body::from(body))
        .unwrap())
}

#[tokio::main]
async fn main() {
    let mut args = std::env::args().skip(1);
    let port: u16 = args
        .next()
        .and_then(|p| p.parse().ok())
        .unwrap_or(3000);
    let unhealthy = args.any(|a| a == "--unhealthy");

    let state = BackendState {
        port,
        req_counter: Arc::new(AtomicU64::new(0)),
        healthy_flag: Arc::new(AtomicBool::new(!unhealthy)),
    };

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let make_svc = make_service_fn(move |_| {
        let state = state.clone();
        async move {
            Ok::<_, Infallible>(service_fn(move |req| handle(req, state.clone())))
        }
    });

    println!("Backend listening on {} (healthy: {})", addr, !unhealthy);
    if let Err(e) = Server::bind(&addr).serve(make_svc).await {
        eprintln!("Backend error: {}", e);
    }
}
