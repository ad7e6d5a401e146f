use serde::{Deserialize, Serialize};
use std::{net::SocketAddr, time::Duration};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Redis configuration
    #[serde(default)]
    pub redis: RedisConfig,
    /// Response cache configuration
    #[serde(default)]
    pub cache: CacheConfig,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        // Server validations
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if !self.server.api_prefix.starts_with('/') || self.server.api_prefix.ends_with('/') {
            return Err("server.api_prefix must start with '/' and must not end with '/'".into());
        }
        if self.server.body_limit_bytes == 0 {
            return Err("server.body_limit_bytes must be > 0".into());
        }
        // Logging validation
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        // Redis validation
        if self.redis.enabled {
            if !self.redis.url.starts_with("redis://") && !self.redis.url.starts_with("rediss://")
            {
                return Err("redis.url must start with redis:// or rediss://".into());
            }
            if self.redis.pool_size == 0 {
                return Err("redis.pool_size must be > 0".into());
            }
            if self.redis.timeout_ms == 0 {
                return Err("redis.timeout_ms must be > 0".into());
            }
        }
        // Cache validation
        if self.cache.ttl_secs == 0 {
            return Err("cache.ttl_secs must be > 0".into());
        }
        if self.cache.marker_ttl_secs < self.cache.ttl_secs {
            return Err("cache.marker_ttl_secs must be >= cache.ttl_secs".into());
        }
        if self.cache.namespace.is_empty() || self.cache.namespace.contains(['*', '?', '[']) {
            return Err("cache.namespace must be non-empty and free of glob characters".into());
        }
        if self.cache.max_body_bytes == 0 {
            return Err("cache.max_body_bytes must be > 0".into());
        }
        if self.cache.cleanup_interval_secs == 0 {
            return Err("cache.cleanup_interval_secs must be > 0".into());
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Path prefix of the entity routes, e.g. `/api` serves `/api/movies`.
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    3000
}
fn default_api_prefix() -> String {
    "/api".into()
}
fn default_body_limit() -> usize {
    1024 * 1024
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            api_prefix: default_api_prefix(),
            body_limit_bytes: default_body_limit(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}
fn default_log_level() -> String {
    "info".into()
}
impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Redis configuration for the shared response cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Enable Redis (gracefully degrades to an in-process cache without it)
    #[serde(default = "default_redis_enabled")]
    pub enabled: bool,

    /// Redis connection URL (e.g., "redis://localhost:6379")
    #[serde(default = "default_redis_url")]
    pub url: String,

    /// Connection pool size
    #[serde(default = "default_redis_pool_size")]
    pub pool_size: usize,

    /// Connection and per-command timeout in milliseconds
    #[serde(default = "default_redis_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_redis_enabled() -> bool {
    false
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_pool_size() -> usize {
    10
}

fn default_redis_timeout_ms() -> u64 {
    500
}

impl RedisConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: default_redis_enabled(),
            url: default_redis_url(),
            pool_size: default_redis_pool_size(),
            timeout_ms: default_redis_timeout_ms(),
        }
    }
}

/// Response cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Serve and populate cached list responses
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,

    /// Lifetime of a cached list response in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,

    /// Prefix prepended to every key the cache writes
    #[serde(default = "default_cache_namespace")]
    pub namespace: String,

    /// Send `Cache-Control: no-store` on responses produced by the live path
    #[serde(default = "default_no_store_on_miss")]
    pub no_store_on_miss: bool,

    /// Responses larger than this are served but not cached
    #[serde(default = "default_cache_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Lifetime of entity update markers in seconds (must cover `ttl_secs`)
    #[serde(default = "default_marker_ttl_secs")]
    pub marker_ttl_secs: u64,

    /// How often expired entries are swept from the in-process cache
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_ttl_secs() -> u64 {
    3600 // 1 hour
}

fn default_cache_namespace() -> String {
    "cache:".into()
}

fn default_no_store_on_miss() -> bool {
    true
}

fn default_cache_max_body_bytes() -> usize {
    2 * 1024 * 1024
}

fn default_marker_ttl_secs() -> u64 {
    86_400
}

fn default_cleanup_interval_secs() -> u64 {
    60
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn marker_ttl(&self) -> Duration {
        Duration::from_secs(self.marker_ttl_secs)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            ttl_secs: default_cache_ttl_secs(),
            namespace: default_cache_namespace(),
            no_store_on_miss: default_no_store_on_miss(),
            max_body_bytes: default_cache_max_body_bytes(),
            marker_ttl_secs: default_marker_ttl_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let pathbuf = PathBuf::from(path.unwrap_or("reelhub.toml"));
        if pathbuf.exists() {
            builder = builder.add_source(File::from(pathbuf));
        }
        // Environment variable overrides, e.g., REELHUB__SERVER__PORT=9090
        builder = builder.add_source(
            Environment::with_prefix("REELHUB")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let cfg = AppConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.cache.namespace, "cache:");
        assert_eq!(cfg.server.api_prefix, "/api");
        assert_eq!(cfg.addr().port(), 3000);
    }

    #[test]
    fn rejects_marker_ttl_shorter_than_entry_ttl() {
        let mut cfg = AppConfig::default();
        cfg.cache.ttl_secs = 600;
        cfg.cache.marker_ttl_secs = 60;
        let err = cfg.validate().unwrap_err();
        assert!(err.contains("marker_ttl_secs"));
    }

    #[test]
    fn rejects_zero_cleanup_interval() {
        let mut cfg = AppConfig::default();
        cfg.cache.cleanup_interval_secs = 0;
        let err = cfg.validate().unwrap_err();
        assert!(err.contains("cleanup_interval_secs"));
    }

    #[test]
    fn rejects_glob_in_namespace() {
        let mut cfg = AppConfig::default();
        cfg.cache.namespace = "cache*".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_bad_prefix_and_level() {
        let mut cfg = AppConfig::default();
        cfg.server.api_prefix = "api/".into();
        assert!(cfg.validate().is_err());

        let mut cfg = AppConfig::default();
        cfg.logging.level = "loud".into();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn redis_settings_only_checked_when_enabled() {
        let mut cfg = AppConfig::default();
        cfg.redis.url = "http://nope".into();
        assert!(cfg.validate().is_ok());
        cfg.redis.enabled = true;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn parses_toml_sections() {
        let raw = r#"
            [server]
            port = 8081

            [redis]
            enabled = true
            url = "redis://cache:6379"

            [cache]
            ttl_secs = 120
            no_store_on_miss = false
        "#;
        let cfg: AppConfig = toml_like(raw);
        assert_eq!(cfg.server.port, 8081);
        assert!(cfg.redis.enabled);
        assert_eq!(cfg.cache.ttl(), Duration::from_secs(120));
        assert!(!cfg.cache.no_store_on_miss);
        assert_eq!(cfg.cache.namespace, "cache:");
        assert!(cfg.validate().is_ok());
    }

    fn toml_like(raw: &str) -> AppConfig {
        config::Config::builder()
            .add_source(config::File::from_str(raw, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }
}
