// src/main.rs
use anyhow::Result;
use hyper::{Body, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

mod config;
mod health;
mod load_balancer;
mod metrics;
mod proxy;
mod server;

use crate::{
    health::HealthChecker,
    load_balancer::RoundRobinBalancer,
    metrics::MetricsRegistry,
    proxy::{BackendPool, Proxy},
    server::{handler::RequestHandler, ServerBuilder},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("request_router=debug".parse()?)
                .add_directive("hyper=info".parse()?),
        )
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());

    info!("Loading configuration from: {}", config_path);
    let config = config::load_config(&config_path).await?;

    // Initialize metrics
    let metrics_registry = MetricsRegistry::new()?;
    let collector = if config.metrics.enabled {
        Some(metrics_registry.collector())
    } else {
        None
    };

    // Create backend pool from the initial address list
    let pool = Arc::new(BackendPool::new(config.backends.clone()));

    // Create proxy with the round-robin balancer
    let balancer = Arc::new(RoundRobinBalancer::new());
    let proxy = Arc::new(Proxy::new(pool.clone(), balancer, collector.clone()));

    // Start health checker
    let checker = Arc::new(HealthChecker::new(
        config.health_check.clone(),
        pool,
        collector,
    ));
    let checker_task = tokio::spawn(checker.clone().start());

    // Start metrics server if enabled
    if config.metrics.enabled {
        let metrics_addr: SocketAddr = ([0, 0, 0, 0], config.metrics.port).into();
        start_metrics_server(metrics_addr, metrics_registry, config.metrics.path.clone())?;
    }

    // Create request handler
    let handler = RequestHandler::new(proxy);

    // Start main server
    let addr: SocketAddr = config.server.listen_addr.parse()?;
    info!("Starting load balancer on {}", addr);

    let serve = ServerBuilder::new(addr).with_handler(handler).serve();

    tokio::select! {
        result = serve => result?,
        _ = shutdown_signal() => {
            checker.shutdown();
            let _ = checker_task.await;
            info!("Exiting gracefully");
        }
    }

    Ok(())
}

fn start_metrics_server(
    addr: SocketAddr,
    registry: MetricsRegistry,
    path: String,
) -> Result<()> {
    let registry = Arc::new(registry);
    let metrics_path = Arc::new(path);
    let service_path = metrics_path.clone();

    let make_service = hyper::service::make_service_fn(move |_| {
        let registry = registry.clone();
        let path = service_path.clone();

        async move {
            Ok::<_, Infallible>(hyper::service::service_fn(move |req: Request<Body>| {
                let registry = registry.clone();
                let path = path.clone();

                async move {
                    if req.uri().path() == path.as_str() {
                        let metrics = registry.gather();
                        Ok::<_, Infallible>(
                            Response::builder()
                                .status(StatusCode::OK)
                                .header("Content-Type", "text/plain; version=0.0.4")
                                .body(Body::from(metrics))
                                .expect("metrics response"),
                        )
                    } else {
                        Ok::<_, Infallible>(
                            Response::builder()
                                .status(StatusCode::NOT_FOUND)
                                .body(Body::from("Not Found"))
                                .expect("metrics response"),
                        )
                    }
                }
            }))
        }
    });

    let server = Server::bind(&addr).serve(make_service);

    info!(
        "Metrics server listening on http://{}{}",
        addr,
        metrics_path.as_str()
    );

    tokio::spawn(async move {
        if let Err(e) = server.await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(())
}

// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
