use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use renewables_api::{
    api::routes::create_router,
    cache::{spawn_purge_loop, Cache},
    config::Config,
    countries::RestCountriesClient,
    dataset,
    dispatcher::HttpNotifier,
    index::LetterIndex,
    registry::MemoryRegistry,
    AppState, STARTED_AT,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();
    once_cell::sync::Lazy::force(&STARTED_AT);

    // Load configuration
    let config = Config::load()?;
    let server_addr = config.server_addr;

    // The service cannot answer anything without the dataset
    let rows = dataset::load(&config.dataset_path)?;
    let index = LetterIndex::build(rows);
    if !index.is_available() {
        warn!(path = %config.dataset_path.display(), "dataset has no rows, every lookup will be empty");
    }

    let cache = Cache::in_memory();
    spawn_purge_loop(cache.clone(), config.cache_ttl, config.purge_interval);

    let notifier = Arc::new(HttpNotifier::new(config.http_timeout)?);
    let countries = Arc::new(RestCountriesClient::new(&config.countries_api_url, config.http_timeout)?);

    // Create application state
    let app_state = AppState::new(
        config,
        index,
        cache,
        Arc::new(MemoryRegistry::new()),
        notifier,
        countries,
    );

    // Build the router with routes
    let app = create_router(app_state);

    // Create the listener
    let listener = TcpListener::bind(server_addr).await?;

    // Start the server
    info!("Listening on {}", server_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
