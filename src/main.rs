//! Casebox API Server Binary

use casebox::{
    api::{init_tracing, ApiServer, AppState, Providers},
    Catalog, ConfigLoader, OptimizedStorage,
};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "casebox")]
#[command(about = "Casebox case-opening backend", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<String>,

    /// Override server.host
    #[arg(long)]
    host: Option<String>,

    /// Override server.port
    #[arg(long)]
    port: Option<u16>,

    /// Override storage.data_directory
    #[arg(long)]
    data_dir: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Non-fatal: variables may come from the environment directly
    dotenvy::dotenv().ok();

    let mut loader = ConfigLoader::new();
    if let Some(ref path) = args.config {
        loader = loader.with_path(path);
    }
    let mut config = loader.load()?;

    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(dir) = args.data_dir {
        config.storage.data_directory = dir;
    }

    init_tracing(&config.logging.filter);

    if let Err(e) = config.validate() {
        error!(error = %e, "❌ Invalid configuration");
        return Err(e.into());
    }

    if config.steam.api_key.is_none() {
        warn!("⚠️  STEAM_API_KEY is not set; every login will use a placeholder profile");
    }
    if config.payments.crypto_bot_token.is_empty() {
        warn!("⚠️  CRYPTO_BOT_TOKEN is not set; invoice creation will fail");
    }

    info!("📂 Opening database: {}", config.storage.data_directory);
    let storage = OptimizedStorage::new_with_config(&config.storage)?;

    let catalog = Catalog::from_config(config.catalog.path.as_deref())?;
    info!("📦 Loaded catalog v{} with {} cases", catalog.version, catalog.cases().len());

    let providers = Providers::from_config(&config)?;
    let state = Arc::new(AppState::new(&config, storage, catalog, providers)?);

    ApiServer::new(config.server.clone(), state).run().await
}
