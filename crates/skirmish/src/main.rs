use skirmish::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), SkirmishError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env()?;
    let catalog = if config.maps_dir.is_dir() {
        InMemoryCatalog::from_json_dir(&config.maps_dir)?
    } else {
        tracing::warn!(dir = %config.maps_dir.display(), "maps directory missing, serving no maps");
        InMemoryCatalog::new()
    };
    tracing::info!(maps = catalog.len(), seed = ?config.seed, "map catalog loaded");

    let server = SkirmishServer::builder().config(&config).build(catalog).await?;
    server.run().await
}
