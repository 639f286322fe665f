use std::sync::Arc;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use harvest_exchange::config::AppConfig;
use harvest_exchange::engine::persistence::{JsonlSink, NullSink, PersistenceSink};
use harvest_exchange::{engine, transport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let app_config = AppConfig::load()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(app_config.server.log_filter.clone()));
    Registry::default()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(bind_address = %app_config.server.bind_address, "starting harvest-exchange");

    let sink: Arc<dyn PersistenceSink> = match std::env::var("HARVEST_PERSISTENCE_PATH") {
        Ok(path) => JsonlSink::spawn(path.into()),
        Err(_) => Arc::new(NullSink),
    };

    let engine_handle = engine::spawn(app_config.game.clone(), sink);
    let app = transport::build_router(engine_handle);

    let listener = tokio::net::TcpListener::bind(&app_config.server.bind_address).await?;
    tracing::info!(bind_address = %app_config.server.bind_address, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
