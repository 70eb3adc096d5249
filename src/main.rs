use axum::Router;
use std::sync::Arc;
use stock_sim::config::Config;
use stock_sim::services::{AnalyticsStore, DayClock, PriceSeriesStore, SqliteStore, TradingService};
use stock_sim::{api, AppState};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "stock_sim=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Arc::new(Config::from_env());
    info!("Starting stock-sim server on {}:{}", config.host, config.port);

    // Price series replayed by the day clock
    let prices = Arc::new(PriceSeriesStore::load(&config.price_data_path)?);

    // Ledger database
    let store = Arc::new(SqliteStore::new(&config.database_path)?);
    store.seed_products(prices.listings(), &config.game)?;

    let analytics = AnalyticsStore::in_memory(config.game.assets_history_window);

    let trading_service = Arc::new(TradingService::new(
        store.clone(),
        prices.clone(),
        analytics.clone(),
        config.game.clone(),
    ));
    let clock = Arc::new(DayClock::new(store, prices, analytics));

    // Create application state
    let state = AppState {
        trading_service,
        clock,
    };

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Build the router
    let app = Router::new()
        .merge(api::router())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start the server
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("stock-sim server listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
