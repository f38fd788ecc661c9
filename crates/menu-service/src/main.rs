use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use menu_config::{ApiConfig, ConfigLoader, MenuConfig};
use menu_core::{EngineBuilder, MenuEngine};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;

#[derive(Parser)]
#[command(name = "menu-service")]
#[command(about = "Group ordering service for a scraped store menu", long_about = None)]
struct Cli {
	#[command(subcommand)]
	command: Option<Commands>,

	#[arg(short, long, value_name = "FILE", default_value = "config/local.toml")]
	config: PathBuf,

	/// Overrides `service.log_level` from the configuration
	#[arg(long)]
	log_level: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
	/// Start the menu service
	Start,
	/// Validate the configuration file
	Validate,
	/// Refresh the catalog cache once and exit
	Scrape,
	/// Print all stored feedback
	ExportFeedback,
}

#[tokio::main]
async fn main() -> Result<()> {
	let cli = Cli::parse();

	let config = ConfigLoader::new()
		.with_file(&cli.config)
		.load()
		.await
		.with_context(|| format!("Failed to load configuration from {:?}", cli.config))?;

	// Initialize tracing
	let log_level = cli
		.log_level
		.clone()
		.unwrap_or_else(|| config.service.log_level.clone());
	setup_tracing(&log_level)?;
	info!("Configuration loaded from {:?}", cli.config);

	// Handle commands
	match cli.command {
		Some(Commands::Start) | None => start_service(config).await,
		Some(Commands::Validate) => validate_config(config),
		Some(Commands::Scrape) => scrape_once(config).await,
		Some(Commands::ExportFeedback) => export_feedback(config).await,
	}
}

async fn build_engine(config: &MenuConfig) -> Result<MenuEngine> {
	EngineBuilder::from_config(config)
		.context("Failed to create engine components")?
		.build()
		.await
		.context("Failed to build menu engine")
}

async fn start_service(config: MenuConfig) -> Result<()> {
	info!("Starting {}", config.service.name);
	info!("Catalog source: {}", config.source.source_type);
	info!("Order storage: {}", config.storage.storage_type);

	let engine = Arc::new(build_engine(&config).await?);

	engine
		.start()
		.await
		.context("Failed to start menu engine")?;

	info!("{} started successfully", config.service.name);
	serve_until_shutdown(engine, config.api.clone(), setup_shutdown_signal()).await?;

	info!("{} stopped", config.service.name);
	Ok(())
}

/// Runs the HTTP server, then shuts the engine down however the server ended.
///
/// A server failure is returned after the engine has been stopped.
async fn serve_until_shutdown(
	engine: Arc<MenuEngine>,
	api_config: ApiConfig,
	shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
	let http_engine = engine.clone();
	let http_handle =
		tokio::spawn(async move { api::start_http_server(http_engine, api_config, shutdown).await });

	let served = match http_handle.await {
		Ok(result) => result.context("HTTP server failed"),
		Err(e) => Err(anyhow::Error::new(e).context("HTTP server task ended abnormally")),
	};
	match &served {
		Ok(()) => info!("Shutdown signal received, stopping services..."),
		Err(e) => error!("{:#}", e),
	}

	let stopped = engine.shutdown().await;
	served?;
	stopped.context("Failed to shutdown menu engine")?;
	Ok(())
}

fn validate_config(config: MenuConfig) -> Result<()> {
	info!("Configuration is valid");
	info!("Service name: {}", config.service.name);
	info!("Cache file: {:?}", config.cache.file_path());
	info!("Refresh interval: {}", config.cache.refresh_interval);
	info!("Catalog source: {}", config.source.source_type);
	info!("Order storage: {}", config.storage.storage_type);
	info!("HTTP address: {}", config.api.bind_address());
	if config.api.enable_dev_routes {
		info!("Dev routes: enabled");
	}

	Ok(())
}

async fn scrape_once(config: MenuConfig) -> Result<()> {
	let engine = build_engine(&config).await?;
	let catalog = engine
		.catalog()
		.refresh()
		.await
		.context("Catalog refresh failed")?;

	println!(
		"{} categories, {} items, {} drinks",
		catalog.categories.len(),
		catalog.item_count(),
		catalog.drinks.len()
	);
	Ok(())
}

async fn export_feedback(config: MenuConfig) -> Result<()> {
	let engine = build_engine(&config).await?;
	let feedback = engine
		.orders()
		.list_feedback()
		.await
		.context("Failed to load feedback")?;

	if feedback.is_empty() {
		println!("No feedback stored.");
		return Ok(());
	}

	for entry in &feedback {
		println!(
			"[{}] [{}] on {}: {}",
			entry.timestamp.format("%Y-%m-%d %H:%M"),
			entry.kind,
			entry.page,
			entry.message
		);
	}
	Ok(())
}

fn setup_tracing(log_level: &str) -> Result<()> {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

	tracing_subscriber::registry()
		.with(env_filter)
		.with(tracing_subscriber::fmt::layer())
		.init();

	Ok(())
}

async fn setup_shutdown_signal() {
	let ctrl_c = async {
		signal::ctrl_c()
			.await
			.expect("failed to install Ctrl+C handler");
	};

	#[cfg(unix)]
	let terminate = async {
		signal::unix::signal(signal::unix::SignalKind::terminate())
			.expect("failed to install signal handler")
			.recv()
			.await;
	};

	#[cfg(not(unix))]
	let terminate = std::future::pending::<()>();

	tokio::select! {
		_ = ctrl_c => {},
		_ = terminate => {},
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use menu_core::LifecycleState;
	use menu_source::implementations::file::FileCatalogSource;
	use menu_storage::implementations::memory::MemoryOrderStore;
	use tempfile::TempDir;

	async fn running_engine(dir: &TempDir) -> Arc<MenuEngine> {
		let engine = EngineBuilder::new()
			.with_source(Arc::new(FileCatalogSource::new(dir.path().join("catalog.json"))))
			.with_store(Arc::new(MemoryOrderStore::new()))
			.with_cache_path(dir.path().join("cache").join("catalog.bin"))
			.build()
			.await
			.unwrap();
		engine.start().await.unwrap();
		Arc::new(engine)
	}

	fn local_api(port: u16) -> ApiConfig {
		ApiConfig {
			host: "127.0.0.1".to_string(),
			port,
			..ApiConfig::default()
		}
	}

	#[tokio::test]
	async fn test_bind_failure_is_returned_after_engine_stops() {
		let dir = TempDir::new().unwrap();
		let engine = running_engine(&dir).await;

		// Keep the port busy for the whole test
		let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
		let port = taken.local_addr().unwrap().port();

		let result =
			serve_until_shutdown(engine.clone(), local_api(port), std::future::pending()).await;

		assert!(result.is_err());
		assert!(format!("{:#}", result.unwrap_err()).contains("HTTP server failed"));
		assert_eq!(engine.state(), LifecycleState::Stopped);
	}

	#[tokio::test]
	async fn test_graceful_shutdown_is_ok() {
		let dir = TempDir::new().unwrap();
		let engine = running_engine(&dir).await;

		let result = serve_until_shutdown(engine.clone(), local_api(0), async {}).await;

		assert!(result.is_ok());
		assert_eq!(engine.state(), LifecycleState::Stopped);
	}
}
