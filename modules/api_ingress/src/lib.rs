//! HTTP host: merges collection routers, applies the shared middleware stack and serves
//! until cancelled.

use anyhow::{Context, Result};
use axum::{middleware::from_fn, routing::get, Router};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
};

mod config;
pub mod request_id;
mod web;

pub use config::ApiIngressConfig;

pub struct ApiIngress {
    config: ApiIngressConfig,
    routes: Router,
}

impl ApiIngress {
    pub fn new(config: ApiIngressConfig) -> Self {
        Self {
            config,
            routes: Router::new(),
        }
    }

    /// Add a collection router; its paths must not clash with already mounted ones.
    pub fn mount(mut self, router: Router) -> Self {
        self.routes = self.routes.merge(router);
        self
    }

    pub fn config(&self) -> &ApiIngressConfig {
        &self.config
    }

    /// The mounted routes plus `/health`, wrapped in the middleware stack.
    pub fn build_router(&self) -> Router {
        tracing::debug!(cors = self.config.cors_enabled, "building router");
        let mut router = self
            .routes
            .clone()
            .route("/health", get(web::health_check))
            .fallback(web::not_found);

        // Each `layer` call wraps the previous ones, so layers go innermost first.
        // Request order: SetRequestId -> PropagateRequestId -> Trace -> push_req_id
        //   -> CatchPanic -> Timeout -> CORS -> BodyLimit -> handler
        router = router.layer(RequestBodyLimitLayer::new(self.config.body_limit_bytes));

        if self.config.cors_enabled {
            router = router.layer(CorsLayer::permissive());
        }

        if self.config.timeout_sec > 0 {
            router = router.layer(TimeoutLayer::new(Duration::from_secs(
                self.config.timeout_sec,
            )));
        }

        router = router.layer(CatchPanicLayer::custom(odata_http::catch_panic));
        router = router.layer(from_fn(request_id::push_req_id_to_extensions));
        router = router.layer(request_id::create_trace_layer());

        let x_request_id = request_id::header();
        router = router.layer(PropagateRequestIdLayer::new(x_request_id.clone()));
        router.layer(SetRequestIdLayer::new(x_request_id, request_id::MakeReqId))
    }

    /// Bind `bind_addr` and serve until `cancel` fires.
    pub async fn serve(self, cancel: CancellationToken) -> Result<()> {
        let addr: SocketAddr = self
            .config
            .bind_addr
            .parse()
            .with_context(|| format!("Invalid bind address '{}'", self.config.bind_addr))?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("Failed to bind {addr}"))?;
        self.serve_on(listener, cancel).await
    }

    /// Serve on an already bound listener until `cancel` fires; in-flight requests finish first.
    pub async fn serve_on(self, listener: TcpListener, cancel: CancellationToken) -> Result<()> {
        let router = self.build_router();
        let local = listener.local_addr()?;
        tracing::info!("HTTP server bound on {}", local);

        let shutdown = async move {
            cancel.cancelled().await;
            tracing::info!("HTTP server shutting down gracefully (cancellation)");
        };

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .context("HTTP server failed")
    }
}
