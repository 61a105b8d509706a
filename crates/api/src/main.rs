//! API server entry point.

use std::sync::Arc;

use api::config::Config;
use carriers::{CarrierClient, UpsClient, UpsConfig, UspsClient, UspsConfig};
use fulfillment::{HttpPlatformNotifier, InMemoryNotifier, PlatformNotifier};
use store::{InMemoryStore, PostgresStore, WarehouseStore};
use tokio::signal;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

#[tokio::main]
async fn main() {
    // 1. Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();

    // 2. Install Prometheus metrics recorder
    let prometheus_builder = metrics_exporter_prometheus::PrometheusBuilder::new();
    let metrics_handle = prometheus_builder
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Store: Postgres when DATABASE_URL is set, in-memory otherwise
    let store: Arc<dyn WarehouseStore> = match &config.database_url {
        Some(url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(10)
                .connect(url)
                .await
                .expect("failed to connect to database");
            let store = PostgresStore::new(pool);
            store.migrate().await.expect("failed to run migrations");
            tracing::info!("using Postgres store");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store");
            Arc::new(InMemoryStore::new())
        }
    };

    // 4. Carrier clients; missing credentials leave a client
    //    unconfigured rather than absent
    let ups = UpsClient::new(UpsConfig::from_env(config.ship_from.clone()));
    let usps = UspsClient::new(UspsConfig::from_env(config.ship_from.clone()));
    for (name, configured) in [("UPS", ups.is_configured()), ("USPS", usps.is_configured())] {
        tracing::info!(carrier = name, configured, "carrier client ready");
    }
    let carrier_list: Vec<Arc<dyn CarrierClient>> = vec![Arc::new(ups), Arc::new(usps)];

    // 5. Upstream platform notifier
    let notifier: Arc<dyn PlatformNotifier> = match (
        &config.platform_base_url,
        &config.platform_access_token,
    ) {
        (Some(base_url), Some(token)) => {
            Arc::new(HttpPlatformNotifier::new(base_url.clone(), token.clone()))
        }
        _ => {
            tracing::warn!("platform credentials not set; fulfillment notifications are dropped");
            Arc::new(InMemoryNotifier::new())
        }
    };

    if config.webhook_secret.is_empty() {
        tracing::warn!("WEBHOOK_SECRET not set; order-sync webhooks will be rejected");
    }

    // 6. Build the application
    let state = api::create_state(
        store,
        carrier_list,
        notifier,
        config.public_base_url.clone(),
        config.webhook_secret.clone(),
    );
    let app = api::create_app(state, metrics_handle);

    // 7. Start server
    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    tracing::info!("server shut down gracefully");
}
