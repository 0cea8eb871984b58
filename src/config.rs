//! Runtime configuration read from environment variables.
//!
//! The binary calls `dotenv` first, so a `.env` file in the working
//! directory feeds the same variables.

use crate::error::{Error, Result};
use crate::key::Endpoint;
use crate::pagination::PageRequest;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Which store holds cached responses.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CacheBackendKind {
    #[default]
    Memory,
    Redis,
}

impl FromStr for CacheBackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "inmemory" => Ok(CacheBackendKind::Memory),
            "redis" => Ok(CacheBackendKind::Redis),
            other => Err(Error::ConfigError(format!(
                "CACHE_BACKEND must be `memory` or `redis`, got `{}`",
                other
            ))),
        }
    }
}

impl fmt::Display for CacheBackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheBackendKind::Memory => write!(f, "memory"),
            CacheBackendKind::Redis => write!(f, "redis"),
        }
    }
}

/// Lifetime of each cached endpoint family.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheTtls {
    pub product_list: Duration,
    pub product: Duration,
    pub user: Duration,
    pub customer_users: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        let page = PageRequest::default();
        CacheTtls {
            product_list: Endpoint::ProductList { page }.default_ttl(),
            product: Endpoint::ProductDetail { id: 0 }.default_ttl(),
            user: Endpoint::UserDetail {
                id: 0,
                customer_id: None,
            }
            .default_ttl(),
            customer_users: Endpoint::CustomerUsers {
                customer_id: 0,
                page,
            }
            .default_ttl(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    /// Prefix of every absolute link in response bodies.
    pub public_base_url: String,
    pub cache_enabled: bool,
    pub cache_backend: CacheBackendKind,
    pub redis_url: String,
    /// PostgreSQL store when set, in-memory store otherwise.
    pub database_url: Option<String>,
    pub seed_fixtures: bool,
    pub ttls: CacheTtls,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            public_base_url: "http://127.0.0.1:8080".to_string(),
            cache_enabled: true,
            cache_backend: CacheBackendKind::Memory,
            redis_url: "redis://127.0.0.1:6379/0".to_string(),
            database_url: None,
            seed_fixtures: true,
            ttls: CacheTtls::default(),
        }
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::ConfigError(format!(
            "{} must be a boolean, got `{}`",
            name, value
        ))),
    }
}

fn parse_number<T: FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::ConfigError(format!("{} is invalid (`{}`): {}", name, value, e)))
}

fn parse_ttl(name: &str, value: &str) -> Result<Duration> {
    let secs: u64 = parse_number(name, value)?;
    if secs == 0 {
        return Err(Error::ConfigError(format!("{} must be at least 1 second", name)));
    }
    Ok(Duration::from_secs(secs))
}

impl AppConfig {
    /// Read the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from any variable source; unset and empty
    /// variables take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` naming the first invalid variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = AppConfig::default();
        let ttl_defaults = CacheTtls::default();

        let host = get("SERVER_HOST").unwrap_or(defaults.host);
        let port = match get("SERVER_PORT") {
            Some(v) => parse_number("SERVER_PORT", &v)?,
            None => defaults.port,
        };
        let public_base_url = get("PUBLIC_BASE_URL")
            .unwrap_or_else(|| format!("http://{}:{}", host, port))
            .trim_end_matches('/')
            .to_string();

        let ttl = |name: &str, default: Duration| -> Result<Duration> {
            match get(name) {
                Some(v) => parse_ttl(name, &v),
                None => Ok(default),
            }
        };

        Ok(AppConfig {
            cache_enabled: match get("CACHE_ENABLED") {
                Some(v) => parse_bool("CACHE_ENABLED", &v)?,
                None => defaults.cache_enabled,
            },
            cache_backend: match get("CACHE_BACKEND") {
                Some(v) => v.parse()?,
                None => defaults.cache_backend,
            },
            redis_url: get("REDIS_URL").unwrap_or(defaults.redis_url),
            database_url: get("DATABASE_URL"),
            seed_fixtures: match get("SEED_FIXTURES") {
                Some(v) => parse_bool("SEED_FIXTURES", &v)?,
                None => defaults.seed_fixtures,
            },
            ttls: CacheTtls {
                product_list: ttl("CACHE_TTL_PRODUCT_LIST", ttl_defaults.product_list)?,
                product: ttl("CACHE_TTL_PRODUCT", ttl_defaults.product)?,
                user: ttl("CACHE_TTL_USER", ttl_defaults.user)?,
                customer_users: ttl("CACHE_TTL_CUSTOMER_USERS", ttl_defaults.customer_users)?,
            },
            host,
            port,
            public_base_url,
        })
    }

    /// `host:port` for the listener.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
