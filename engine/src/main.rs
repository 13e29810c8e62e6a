//! RateQuorum Rate Daemon
//!
//! Keeps the monitored crypto pairs aggregated on a schedule, audits them
//! for staleness, and sweeps expired cache entries. The fiat resolver is
//! wired against the same cache and history and consumed in-process by the
//! payment services.

use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ratequorum_engine::{EngineConfig, EngineMetrics, FiatRateResolver, RateAggregator};
use ratequorum_providers::{
    BinanceProvider, CoinGeckoFiatProvider, CoinGeckoProvider, CoinbaseProvider, FiatRateProvider,
    OpenExchangeRatesProvider, RateProvider,
};
use ratequorum_store::{
    CacheStore, MemoryCacheStore, MemoryRateHistoryStore, PgRateHistoryStore, RateHistoryStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting RateQuorum rate daemon");

    // Load configuration
    let config = EngineConfig::from_env();
    if let Err(e) = config.validate() {
        error!(error = %e, "Invalid configuration");
        return Err(anyhow::anyhow!("Configuration error: {}", e));
    }

    let providers: Vec<Arc<dyn RateProvider>> = vec![
        Arc::new(CoinbaseProvider::new()),
        Arc::new(BinanceProvider::new()),
        Arc::new(CoinGeckoProvider::new()),
    ];

    let mut fiat_providers: Vec<Arc<dyn FiatRateProvider>> = Vec::new();
    if let Some(app_id) = config.open_exchange_rates_app_id.clone() {
        fiat_providers.push(Arc::new(OpenExchangeRatesProvider::new(app_id)));
    } else {
        info!("OPEN_EXCHANGE_RATES_APP_ID not set, skipping that provider");
    }
    fiat_providers.push(Arc::new(CoinGeckoFiatProvider::new()));

    let cache = Arc::new(MemoryCacheStore::new());

    let history: Arc<dyn RateHistoryStore> = match &config.database_url {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect(url)
                .await?;
            let store = PgRateHistoryStore::new(pool);
            store.ensure_schema().await?;
            info!("Using Postgres rate history");
            Arc::new(store)
        }
        None => {
            info!("DATABASE_URL not set, using in-memory rate history");
            Arc::new(MemoryRateHistoryStore::new())
        }
    };

    let metrics = Arc::new(EngineMetrics::new());

    let aggregator = Arc::new(RateAggregator::new(
        providers,
        cache.clone() as Arc<dyn CacheStore>,
        history.clone(),
        config.aggregator.clone(),
        metrics.clone(),
    ));

    let resolver = FiatRateResolver::new(
        fiat_providers,
        cache.clone() as Arc<dyn CacheStore>,
        history,
        config.fiat.clone(),
        metrics,
    );
    let currencies: Vec<String> = resolver
        .supported_currencies()
        .iter()
        .map(ToString::to_string)
        .collect();
    info!(currencies = ?currencies, "Fiat resolver ready");

    // Warm the cache before the loops take over
    aggregator.refresh_monitored_pairs().await;

    let refresh = tokio::spawn(Arc::clone(&aggregator).run_refresh_loop());
    let audit = tokio::spawn(Arc::clone(&aggregator).run_staleness_audit_loop());

    let sweeper = {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(60)).await;
                cache.evict_expired();
            }
        })
    };

    let pairs: Vec<String> = config
        .aggregator
        .monitored_pairs
        .iter()
        .map(ToString::to_string)
        .collect();
    info!(pairs = ?pairs, "Rate daemon running");

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    refresh.abort();
    audit.abort();
    sweeper.abort();

    info!("Rate daemon shutdown complete");
    Ok(())
}
