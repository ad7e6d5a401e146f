pub mod cache;
pub mod config;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod observability;
pub mod server;

pub use cache::{CacheBackend, CachedEntry, ResponseCache};
pub use config::{AppConfig, CacheConfig, LoggingConfig, RedisConfig, ServerConfig};
pub use entity::EntityType;
pub use error::ApiError;
pub use observability::init_tracing;
pub use server::{AppState, ReelhubServer, ServerBuilder, build_app};

/// Create a cache backend based on configuration.
///
/// ## Cache Modes
///
/// - **Redis disabled**: Returns local-only cache (DashMap)
/// - **Redis enabled**: Attempts to connect to Redis, falls back to local on failure
///
/// ## Graceful Degradation
///
/// If Redis connection fails, the system automatically falls back to local-only mode.
/// This allows the server to start and run even if Redis is unavailable.
pub async fn create_cache_backend(config: &RedisConfig, namespace: &str) -> CacheBackend {
    if !config.enabled {
        tracing::info!("Redis disabled, using local cache only");
        return CacheBackend::new_local(namespace);
    }

    tracing::info!(url = %config.url, "Connecting to Redis");

    // Create Redis pool configuration
    let mut redis_config = deadpool_redis::Config::from_url(&config.url);
    let mut pool_config = deadpool_redis::PoolConfig::new(config.pool_size);
    pool_config.timeouts.wait = Some(config.timeout());
    pool_config.timeouts.create = Some(config.timeout());
    pool_config.timeouts.recycle = Some(config.timeout());
    redis_config.pool = Some(pool_config);

    // Create pool
    let pool = match redis_config.create_pool(Some(deadpool_redis::Runtime::Tokio1)) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to create Redis pool. Falling back to local cache."
            );
            return CacheBackend::new_local(namespace);
        }
    };

    // Test connection
    match pool.get().await {
        Ok(_) => {
            tracing::info!("Connected to Redis");
            CacheBackend::new_redis(pool, namespace, config.timeout())
        }
        Err(e) => {
            tracing::warn!(
                error = %e,
                "Failed to connect to Redis. Falling back to local cache."
            );
            CacheBackend::new_local(namespace)
        }
    }
}
