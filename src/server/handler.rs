// src/server/handler.rs
use hyper::{Body, Method, Request, Response, StatusCode};
use std::convert::Infallible;
use std::sync::Arc;
use tower::Service;

use crate::proxy::Proxy;
use crate::server::admin;

/// Routes admin endpoints, forwards everything else through the proxy.
#[derive(Clone)]
pub struct RequestHandler {
    proxy: Arc<Proxy>,
}

impl RequestHandler {
    pub fn new(proxy: Arc<Proxy>) -> Self {
        Self { proxy }
    }

    async fn route(proxy: Arc<Proxy>, req: Request<Body>) -> Response<Body> {
        match (req.method(), req.uri().path()) {
            (&Method::POST, "/register") => admin::register(req, proxy.pool()).await,
            (&Method::POST, "/unregister") => admin::unregister(req, proxy.pool()).await,
            (_, "/register") | (_, "/unregister") => Response::builder()
                .status(StatusCode::METHOD_NOT_ALLOWED)
                .body(Body::from("Method Not Allowed"))
                .expect("static response"),
            _ => match proxy.handle(req).await {
                Ok(response) => response,
                Err(e) => e.into(),
            },
        }
    }
}

impl Service<Request<Body>> for RequestHandler {
    type Response = Response<Body>;
    type Error = Infallible;
    type Future = futures::future::BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(
        &mut self,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let proxy = self.proxy.clone();
        Box::pin(async move { Ok(Self::route(proxy, req).await) })
    }
}
