mod cli;

use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::cli::{Cli, Commands};
use deskcal_booking::{BookingService, BookingStore, Location, MemoryStore, SqliteStore};
use deskcal_core::{Config, ConfigLoader, ConfigValidator, DeskcalError, StoreBackend};
use deskcal_gateway::{GatewayServer, MethodHandlers, PresenceHub};

#[tokio::main]
async fn main() -> Result<(), DeskcalError> {
    let cli = Cli::parse();

    let dev = matches!(cli.command, Some(Commands::Serve { dev: true, .. }));
    init_tracing(dev);

    match cli.command {
        Some(Commands::ConfigSample { output }) => {
            let path = output.unwrap_or_else(|| std::path::PathBuf::from("./deskcal.sample.yaml"));
            Config::sample().save(&path)?;
            println!("Sample config written to {}", path.display());
        }
        Some(Commands::CheckConfig) => {
            let config = ConfigLoader::load(cli.config_path.as_deref())?;
            ConfigValidator::validate(&config)?;
            println!(
                "Config OK: {} location(s), {:?} store, ws://{}:{}{}",
                config.locations.len(),
                config.store.backend,
                config.gateway.host,
                config.gateway.port,
                config.gateway.ws_path
            );
        }
        Some(Commands::Serve { host, port, dev }) => {
            handle_serve(cli.config_path.as_deref(), host, port, dev).await?;
        }
        None => {
            handle_serve(cli.config_path.as_deref(), None, None, false).await?;
        }
    }

    Ok(())
}

fn init_tracing(dev: bool) {
    let env_filter = if dev {
        EnvFilter::new("deskcal=debug,warn")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("deskcal=info,warn"))
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .init();
}

async fn open_store(config: &Config) -> Result<Arc<dyn BookingStore>, DeskcalError> {
    let store: Arc<dyn BookingStore> = match config.store.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory booking store; bookings are lost on restart");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Sqlite => {
            info!("Opening booking database at {}", config.store.db_path.display());
            let store = SqliteStore::open(&config.store.db_path)
                .map_err(|e| DeskcalError::storage(e.to_string()))?;
            Arc::new(store)
        }
    };

    if config.locations.is_empty() {
        tracing::warn!("No locations configured; every booking will be rejected");
    }
    for seed in &config.locations {
        store
            .upsert_location(Location {
                id: seed.id.trim().to_string(),
                name: seed.name.clone(),
                capacity: seed.capacity,
            })
            .await
            .map_err(|e| DeskcalError::storage(e.to_string()))?;
    }

    Ok(store)
}

async fn handle_serve(
    config_path: Option<&str>,
    host: Option<String>,
    port: Option<u16>,
    dev: bool,
) -> Result<(), DeskcalError> {
    let mut config = ConfigLoader::load_or_default(config_path)?;
    if let Some(host) = host {
        config.gateway.host = host;
    }
    if let Some(port) = port {
        config.gateway.port = port;
    }
    ConfigValidator::validate(&config)?;

    println!("deskcal gateway");
    println!("---------------------------------");
    println!("  host:      {}", config.gateway.host);
    println!("  port:      {}", config.gateway.port);
    println!("  path:      {}", config.gateway.ws_path);
    println!("  store:     {:?}", config.store.backend);
    println!("  locations: {}", config.locations.len());
    println!("  mode:      {}", if dev { "development" } else { "production" });
    println!("---------------------------------");

    let store = open_store(&config).await?;
    let hub = Arc::new(PresenceHub::new());
    let bookings = Arc::new(BookingService::new(store, hub.clone()));
    let handlers = Arc::new(MethodHandlers::new(hub, bookings));
    let server = GatewayServer::new((&config.gateway).into(), handlers);

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);
    tokio::select! {
        result = server.start() => {
            result.map_err(|e| DeskcalError::network(addr, format!("{:#}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down");
        }
    }

    Ok(())
}
