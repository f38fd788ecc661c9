// menu-core/src/engine.rs

use crate::{
	catalog::CatalogService,
	error::CoreError,
	lifecycle::{LifecycleManager, LifecycleState},
	orders::OrderManager,
};
use menu_cache::SnapshotStore;
use menu_config::MenuConfig;
use menu_source::{create_source, CatalogSourceInterface};
use menu_storage::{create_store, OrderStoreInterface};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Owns the catalog service, the order manager and the background refresh task.
pub struct MenuEngine {
	catalog: Arc<CatalogService>,
	orders: Arc<OrderManager>,
	lifecycle: LifecycleManager,
	refresh_interval: String,
	tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl MenuEngine {
	/// Starts background tasks and marks the engine as running.
	pub async fn start(&self) -> Result<(), CoreError> {
		info!("Starting menu engine");
		self.lifecycle.initialize()?;

		let scheduler = self
			.catalog
			.spawn_refresh_scheduler(&self.refresh_interval, self.lifecycle.watch());
		self.tasks.lock().await.push(scheduler);

		self.lifecycle.start()?;
		info!("Menu engine started");
		Ok(())
	}

	/// Signals shutdown and waits for background tasks to finish.
	pub async fn shutdown(&self) -> Result<(), CoreError> {
		info!("Shutting down menu engine");
		self.lifecycle.shutdown()?;

		let tasks: Vec<_> = self.tasks.lock().await.drain(..).collect();
		for task in tasks {
			if let Err(e) = task.await {
				warn!("Background task ended abnormally: {}", e);
			}
		}

		info!("Menu engine stopped");
		Ok(())
	}

	pub fn catalog(&self) -> &Arc<CatalogService> {
		&self.catalog
	}

	pub fn orders(&self) -> &Arc<OrderManager> {
		&self.orders
	}

	pub fn state(&self) -> LifecycleState {
		self.lifecycle.state()
	}
}

/// Builder wiring a [`MenuEngine`] from its collaborators.
pub struct EngineBuilder {
	source: Option<Arc<dyn CatalogSourceInterface>>,
	store: Option<Arc<dyn OrderStoreInterface>>,
	cache_path: PathBuf,
	refresh_interval: String,
}

impl Default for EngineBuilder {
	fn default() -> Self {
		Self::new()
	}
}

impl EngineBuilder {
	pub fn new() -> Self {
		let defaults = MenuConfig::default();
		Self {
			source: None,
			store: None,
			cache_path: defaults.cache.file_path(),
			refresh_interval: defaults.cache.refresh_interval,
		}
	}

	/// Creates source and store from configuration via their factories.
	pub fn from_config(config: &MenuConfig) -> Result<Self, CoreError> {
		let source = create_source(&config.source.source_type, &config.source.settings_value())
			.map_err(|e| CoreError::Configuration(e.to_string()))?;
		let store = create_store(
			&config.storage.storage_type,
			&config.storage.settings_value(),
		)
		.map_err(|e| CoreError::Configuration(e.to_string()))?;

		Ok(Self::new()
			.with_source(Arc::from(source))
			.with_store(store)
			.with_cache_path(config.cache.file_path())
			.with_refresh_interval(config.cache.refresh_interval.clone()))
	}

	pub fn with_source(mut self, source: Arc<dyn CatalogSourceInterface>) -> Self {
		self.source = Some(source);
		self
	}

	pub fn with_store(mut self, store: Arc<dyn OrderStoreInterface>) -> Self {
		self.store = Some(store);
		self
	}

	pub fn with_cache_path(mut self, path: impl Into<PathBuf>) -> Self {
		self.cache_path = path.into();
		self
	}

	pub fn with_refresh_interval(mut self, interval: impl Into<String>) -> Self {
		self.refresh_interval = interval.into();
		self
	}

	/// Opens the catalog cache and assembles the engine.
	pub async fn build(self) -> Result<MenuEngine, CoreError> {
		let source = self
			.source
			.ok_or_else(|| CoreError::Configuration("No catalog source configured".to_string()))?;
		let store = self
			.store
			.ok_or_else(|| CoreError::Configuration("No order store configured".to_string()))?;

		let cache = SnapshotStore::open(&self.cache_path).await?;
		info!("Catalog cache at {:?}", cache.path());

		let catalog = Arc::new(CatalogService::new(source, cache));
		let orders = Arc::new(OrderManager::new(store, catalog.clone()));

		Ok(MenuEngine {
			catalog,
			orders,
			lifecycle: LifecycleManager::new(),
			refresh_interval: self.refresh_interval,
			tasks: Mutex::new(Vec::new()),
		})
	}
}
