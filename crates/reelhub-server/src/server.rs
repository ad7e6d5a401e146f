use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, middleware, routing::get};
use reelhub_storage::{DynStore, InMemoryStore};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::{
    cache::{self, CacheBackend, ResponseCache},
    config::AppConfig,
    handlers,
    middleware::{self as app_middleware, RequestId},
};

/// Shared application state, built once by [`ServerBuilder`].
#[derive(Clone)]
pub struct AppState {
    pub store: DynStore,
    pub cache: ResponseCache,
}

impl AppState {
    pub fn new(store: DynStore, cache: ResponseCache) -> Self {
        Self { store, cache }
    }
}

pub struct ReelhubServer {
    addr: SocketAddr,
    app: Router,
}

pub fn build_app(state: AppState, cfg: &AppConfig) -> Router {
    let body_limit = cfg.server.body_limit_bytes;

    // Entity routes. Cache middlewares see paths relative to the API prefix.
    let api = Router::new()
        .merge(handlers::movies::routes())
        .merge(handlers::directors::routes())
        .route_layer(middleware::from_fn_with_state(
            state.cache.clone(),
            cache::invalidate_on_write,
        ))
        .route_layer(middleware::from_fn_with_state(
            state.cache.clone(),
            cache::cache_responses,
        ))
        .route_layer(middleware::from_fn(app_middleware::content_negotiation));

    Router::new()
        // Health and info endpoints
        .route("/", get(handlers::root))
        .route("/healthz", get(handlers::healthz))
        .route("/readyz", get(handlers::readyz))
        .route("/metrics", get(handlers::metrics))
        .nest(&cfg.server.api_prefix, api)
        .fallback(handlers::not_found)
        .with_state(state)
        // Middleware stack (outermost last: request id -> trace -> compression/cors -> metrics -> body limit)
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(app_middleware::track_metrics))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    use tracing::field::Empty;
                    let req_id = req
                        .extensions()
                        .get::<RequestId>()
                        .and_then(|id| id.0.to_str().ok())
                        .unwrap_or("")
                        .to_string();
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri(),
                        http.status_code = Empty,
                        request_id = %req_id
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(middleware::from_fn(app_middleware::request_id))
}

pub struct ServerBuilder {
    addr: SocketAddr,
    config: AppConfig,
    store: Option<DynStore>,
    cache_backend: Option<CacheBackend>,
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerBuilder {
    pub fn new() -> Self {
        let cfg = AppConfig::default();
        Self {
            addr: cfg.addr(),
            config: cfg,
            store: None,
            cache_backend: None,
        }
    }

    pub fn with_addr(mut self, addr: SocketAddr) -> Self {
        self.addr = addr;
        self
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.addr = cfg.addr();
        self.config = cfg;
        self
    }

    /// Use this document store instead of a fresh in-memory one.
    pub fn with_store(mut self, store: DynStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Use this cache backend instead of connecting per `redis` config.
    pub fn with_cache_backend(mut self, backend: CacheBackend) -> Self {
        self.cache_backend = Some(backend);
        self
    }

    /// Assembles the application state from the configuration.
    pub async fn build_state(&mut self) -> AppState {
        let store = self
            .store
            .take()
            .unwrap_or_else(|| Arc::new(InMemoryStore::new()));
        let backend = match self.cache_backend.take() {
            Some(backend) => backend,
            None => {
                crate::create_cache_backend(&self.config.redis, &self.config.cache.namespace).await
            }
        };
        if backend
            .spawn_cleanup(self.config.cache.cleanup_interval())
            .is_some()
        {
            tracing::debug!(
                interval_secs = self.config.cache.cleanup_interval_secs,
                "local cache cleanup task started"
            );
        }
        tracing::info!(
            storage = store.backend_name(),
            cache.mode = backend.stats().mode,
            cache.enabled = self.config.cache.enabled,
            "application state ready"
        );
        AppState::new(store, ResponseCache::new(backend, &self.config.cache))
    }

    pub async fn build(mut self) -> anyhow::Result<ReelhubServer> {
        self.config.validate().map_err(anyhow::Error::msg)?;
        let state = self.build_state().await;
        let app = build_app(state, &self.config);

        Ok(ReelhubServer {
            addr: self.addr,
            app,
        })
    }
}

impl ReelhubServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
