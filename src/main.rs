#[macro_use]
extern crate log;

use catalog_api::auth::{Argon2Hasher, Authenticator};
use catalog_api::backend::InMemoryBackend;
use catalog_api::config::{AppConfig, CacheBackendKind};
use catalog_api::fixtures::{self, Fixtures, FIXTURE_PASSWORD};
use catalog_api::http::links::LinkBuilder;
use catalog_api::http::{router, AppState};
use catalog_api::repository::{InMemoryStore, Store};
use catalog_api::{CacheBackend, CacheStrategy, Result};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run().await {
        error!("catalog-api stopped: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = AppConfig::from_env()?;
    let authenticator = Authenticator::new(Argon2Hasher::new());
    info!(
        "Starting catalog-api {} (cache: {}, {})",
        catalog_api::VERSION,
        config.cache_backend,
        CacheStrategy::for_enabled(config.cache_enabled)
    );

    match config.database_url.clone() {
        #[cfg(feature = "postgres")]
        Some(url) => {
            let store = catalog_api::postgres::PgStore::connect(&url).await?;
            if config.seed_fixtures {
                if store.is_empty().await? {
                    load_fixtures(&store, &authenticator).await?;
                } else {
                    info!("Database already populated, fixtures skipped");
                }
            }
            with_backend(config, store, authenticator).await
        }
        #[cfg(not(feature = "postgres"))]
        Some(_) => Err(catalog_api::Error::NotImplemented(
            "DATABASE_URL is set but the `postgres` feature is not enabled".to_string(),
        )),
        None => {
            let store = InMemoryStore::new();
            if config.seed_fixtures {
                load_fixtures(&store, &authenticator).await?;
            } else {
                warn!("In-memory store without fixtures: no account can authenticate");
            }
            with_backend(config, store, authenticator).await
        }
    }
}

async fn load_fixtures<S: Store>(store: &S, authenticator: &Authenticator) -> Result<()> {
    let hash = authenticator
        .hash_password(FIXTURE_PASSWORD.to_string())
        .await?;
    fixtures::seed(store, Fixtures::generate(hash)).await?;
    Ok(())
}

async fn with_backend<S: Store>(
    config: AppConfig,
    store: S,
    authenticator: Authenticator,
) -> Result<()> {
    match config.cache_backend {
        CacheBackendKind::Memory => {
            serve(config, store, InMemoryBackend::new(), authenticator).await
        }
        #[cfg(feature = "redis")]
        CacheBackendKind::Redis => {
            let backend =
                catalog_api::backend::RedisBackend::from_connection_string(&config.redis_url)
                    .await?;
            serve(config, store, backend, authenticator).await
        }
        #[cfg(not(feature = "redis"))]
        CacheBackendKind::Redis => Err(catalog_api::Error::NotImplemented(
            "CACHE_BACKEND=redis requires the `redis` feature".to_string(),
        )),
    }
}

async fn serve<S: Store, B: CacheBackend>(
    config: AppConfig,
    store: S,
    backend: B,
    authenticator: Authenticator,
) -> Result<()> {
    let state = AppState::new(
        store,
        backend,
        CacheStrategy::for_enabled(config.cache_enabled),
        authenticator,
        LinkBuilder::new(config.public_base_url.as_str()),
        config.ttls,
    );

    let listener = tokio::net::TcpListener::bind(config.bind_address()).await?;
    info!(
        "✓ Listening on {} (links under {})",
        config.bind_address(),
        config.public_base_url
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("✓ Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received, draining connections"),
        Err(e) => {
            error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
