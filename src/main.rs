use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use better_contacts::clock::SystemClock;
use better_contacts::config::Config;
use better_contacts::db::Database;
use better_contacts::handlers::AppState;
use better_contacts::queue_cache::QueueCache;
use better_contacts::routes;

/// Main entry point for the application.
///
/// Initializes logging, configuration, the database pool (running pending
/// migrations) and the queue cache, then starts the Axum server with CORS,
/// body-size and rate limiting layers.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "better_contacts=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    // Initialize database connection pool
    let db = Database::new(&config.database_url).await?;
    tracing::info!("Database connection pool established");

    let queue_cache = QueueCache::new(
        Duration::from_secs(config.queue_cache_ttl_secs),
        config.queue_cache_capacity,
    );
    tracing::info!(
        "Queue cache initialized ({}s TTL, {} capacity)",
        config.queue_cache_ttl_secs,
        config.queue_cache_capacity
    );

    // Build application state
    let app_state = Arc::new(AppState {
        db: db.pool.clone(),
        config: config.clone(),
        queue_cache,
        clock: Arc::new(SystemClock),
    });

    // Configure rate limiter per client IP
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(config.rate_limit_per_second)
            .burst_size(config.rate_limit_burst)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limit configuration"))?,
    );

    let protected_routes = routes::api_routes().layer(ServiceBuilder::new().layer(GovernorLayer {
        config: governor_conf,
    }));

    // Health check bypasses rate limiting
    let app = routes::app(app_state, protected_routes);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
