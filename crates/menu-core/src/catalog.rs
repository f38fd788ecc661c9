//! Catalog refresh, hydration and read access.
//!
//! [`CatalogService`] is the only way the rest of the system reads the
//! catalog. A read on an empty cache hydrates it from the source; concurrent
//! misses share one refresh. Every read gets the synthetic surprise category
//! prepended, which is never written to the cache.

use crate::error::CoreError;
use crate::lifecycle::{wait_for_shutdown, LifecycleState};
use menu_cache::SnapshotStore;
use menu_config::parse_duration;
use menu_source::CatalogSourceInterface;
use menu_types::{Catalog, Category, StoreItem, Variant};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, error, info, instrument, warn};

/// Interval used when the configured one cannot be parsed.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(168 * 60 * 60);

/// Id of the synthetic category injected on every read.
pub const SURPRISE_CATEGORY_ID: &str = "__etc";
/// Id of the single item in the surprise category.
pub const SURPRISE_ITEM_ID: &str = "__surprise";

/// The "surprise me" category: someone else picks the item for you.
pub fn surprise_category() -> Category {
	Category {
		id: SURPRISE_CATEGORY_ID.to_string(),
		name: "Etc".to_string(),
		items: vec![StoreItem {
			id: SURPRISE_ITEM_ID.to_string(),
			title: "🎉 Überrasch mich 🎉".to_string(),
			description: "Die bestellende Person sucht sich etwas für dich aus 😎".to_string(),
			price: String::new(),
			variants: vec![
				Variant {
					name: "vegetarisch".to_string(),
					description: "Vegetarisch".to_string(),
				},
				Variant {
					name: "ohne zwiebeln".to_string(),
					description: "ohne Zwiebeln (wenn vorhanden)".to_string(),
				},
			],
			dips: Vec::new(),
		}],
	}
}

/// Resolves a configured refresh interval, falling back to one week.
///
/// Zero is treated as invalid since a timer cannot tick at a zero period.
pub fn resolve_refresh_interval(interval: &str) -> Duration {
	match parse_duration(interval) {
		Ok(duration) if !duration.is_zero() => duration,
		Ok(_) => {
			warn!(
				"Refresh interval {:?} is zero, falling back to {:?}",
				interval, DEFAULT_REFRESH_INTERVAL
			);
			DEFAULT_REFRESH_INTERVAL
		}
		Err(e) => {
			warn!(
				"Invalid refresh interval ({}), falling back to {:?}",
				e, DEFAULT_REFRESH_INTERVAL
			);
			DEFAULT_REFRESH_INTERVAL
		}
	}
}

pub struct CatalogService {
	source: Arc<dyn CatalogSourceInterface>,
	cache: SnapshotStore<Catalog>,
	/// Held for the whole fetch-and-store of a refresh.
	refresh_gate: Mutex<()>,
}

impl CatalogService {
	pub fn new(source: Arc<dyn CatalogSourceInterface>, cache: SnapshotStore<Catalog>) -> Self {
		Self {
			source,
			cache,
			refresh_gate: Mutex::new(()),
		}
	}

	/// Fetches a fresh catalog and installs it in the cache.
	///
	/// On a scrape failure the cached snapshot stays untouched. A failed cache
	/// write is a failure of the whole refresh.
	#[instrument(skip(self), fields(source = self.source.name()))]
	pub async fn refresh(&self) -> Result<Catalog, CoreError> {
		let _gate = self.refresh_gate.lock().await;
		self.refresh_locked().await
	}

	async fn refresh_locked(&self) -> Result<Catalog, CoreError> {
		info!("Refreshing catalog");
		let catalog = self.source.fetch_catalog().await?;
		self.cache.store(catalog.clone()).await?;

		info!(
			"Catalog refreshed: {} categories, {} items, {} drinks",
			catalog.categories.len(),
			catalog.item_count(),
			catalog.drinks.len()
		);
		Ok(catalog)
	}

	/// Returns the current catalog, hydrating the cache on a miss.
	pub async fn get_catalog(&self) -> Result<Catalog, CoreError> {
		let mut catalog = match self.cache.load().await {
			Some(catalog) => catalog,
			None => self.hydrate().await?,
		};

		catalog.categories.insert(0, surprise_category());
		Ok(catalog)
	}

	async fn hydrate(&self) -> Result<Catalog, CoreError> {
		let _gate = self.refresh_gate.lock().await;

		// Another caller may have filled the cache while we waited
		if let Some(catalog) = self.cache.load().await {
			debug!("Catalog hydrated by a concurrent refresh");
			return Ok(catalog);
		}

		info!("Catalog cache is empty, hydrating from source");
		self.refresh_locked().await
	}

	/// Spawns the periodic refresh task.
	///
	/// The first refresh happens one interval after start. Failures are
	/// logged and the stale snapshot keeps being served. The task ends once
	/// the engine starts shutting down.
	pub fn spawn_refresh_scheduler(
		self: &Arc<Self>,
		interval: &str,
		mut engine_state: watch::Receiver<LifecycleState>,
	) -> JoinHandle<()> {
		let period = resolve_refresh_interval(interval);
		let service = Arc::clone(self);

		tokio::spawn(async move {
			let mut ticker = interval_at(Instant::now() + period, period);
			ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
			info!("Catalog refresh scheduled every {:?}", period);

			loop {
				tokio::select! {
					_ = ticker.tick() => {
						info!("Starting scheduled catalog refresh");
						match service.refresh().await {
							Ok(_) => info!("Scheduled catalog refresh finished"),
							Err(e) => error!("Scheduled catalog refresh failed: {}", e),
						}
					}
					_ = wait_for_shutdown(&mut engine_state) => {
						info!("Catalog refresh scheduler stopping");
						break;
					}
				}
			}
		})
	}
}

#[cfg(test)]
pub(crate) mod tests {
	use super::*;
	use async_trait::async_trait;
	use menu_source::SourceError;
	use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
	use tempfile::TempDir;

	pub(crate) fn pizza_catalog() -> Catalog {
		Catalog {
			categories: vec![Category {
				id: "pizza".into(),
				name: "Pizza".into(),
				items: vec![StoreItem {
					id: "pizza".into(),
					title: "Pizza".into(),
					variants: vec![Variant {
						name: "extra cheese".into(),
						description: String::new(),
					}],
					dips: vec!["garlic".into()],
					..Default::default()
				}],
			}],
			drinks: vec![],
		}
	}

	/// Counts fetches and can be switched into failing mode.
	pub(crate) struct CountingSource {
		pub calls: AtomicUsize,
		pub failing: AtomicBool,
		pub delay: Duration,
	}

	impl CountingSource {
		pub fn new() -> Self {
			Self {
				calls: AtomicUsize::new(0),
				failing: AtomicBool::new(false),
				delay: Duration::ZERO,
			}
		}
	}

	#[async_trait]
	impl CatalogSourceInterface for CountingSource {
		fn name(&self) -> &str {
			"counting"
		}

		async fn fetch_catalog(&self) -> Result<Catalog, SourceError> {
			self.calls.fetch_add(1, Ordering::SeqCst);
			if !self.delay.is_zero() {
				tokio::time::sleep(self.delay).await;
			}
			if self.failing.load(Ordering::SeqCst) {
				return Err(SourceError::Http("store unreachable".into()));
			}
			Ok(pizza_catalog())
		}
	}

	async fn service_with(source: Arc<CountingSource>, dir: &TempDir) -> Arc<CatalogService> {
		let cache = SnapshotStore::open(dir.path().join("catalog.bin")).await.unwrap();
		Arc::new(CatalogService::new(source, cache))
	}

	#[tokio::test]
	async fn test_hydrate_on_miss_scrapes_once() {
		let dir = TempDir::new().unwrap();
		let source = Arc::new(CountingSource::new());
		let service = service_with(source.clone(), &dir).await;

		let catalog = service.get_catalog().await.unwrap();
		assert_eq!(source.calls.load(Ordering::SeqCst), 1);
		assert_eq!(catalog.categories[0].id, SURPRISE_CATEGORY_ID);
		assert_eq!(catalog.categories[1].id, "pizza");

		// Served from cache afterwards
		service.get_catalog().await.unwrap();
		assert_eq!(source.calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn test_concurrent_misses_share_one_refresh() {
		let dir = TempDir::new().unwrap();
		let mut source = CountingSource::new();
		source.delay = Duration::from_millis(50);
		let source = Arc::new(source);
		let service = service_with(source.clone(), &dir).await;

		let reads = (0..8).map(|_| {
			let service = service.clone();
			async move { service.get_catalog().await }
		});
		let results = futures::future::join_all(reads).await;

		assert!(results.iter().all(|r| r.is_ok()));
		assert_eq!(source.calls.load(Ordering::SeqCst), 1);
	}

	#[tokio::test]
	async fn test_surprise_category_is_never_persisted() {
		let dir = TempDir::new().unwrap();
		let service = service_with(Arc::new(CountingSource::new()), &dir).await;

		let first = service.get_catalog().await.unwrap();
		let second = service.get_catalog().await.unwrap();
		assert_eq!(first.categories.len(), 2);
		assert_eq!(second.categories.len(), 2);

		let reopened: SnapshotStore<Catalog> =
			SnapshotStore::open(dir.path().join("catalog.bin")).await.unwrap();
		assert_eq!(reopened.load().await.unwrap(), pizza_catalog());
	}

	#[tokio::test]
	async fn test_failed_refresh_keeps_stale_snapshot() {
		let dir = TempDir::new().unwrap();
		let source = Arc::new(CountingSource::new());
		let service = service_with(source.clone(), &dir).await;
		service.refresh().await.unwrap();

		source.failing.store(true, Ordering::SeqCst);
		assert!(matches!(
			service.refresh().await,
			Err(CoreError::ScrapeFailed(_))
		));

		let catalog = service.get_catalog().await.unwrap();
		assert!(catalog.find_item("pizza").is_some());
	}

	#[tokio::test]
	async fn test_hydration_failure_is_reported() {
		let dir = TempDir::new().unwrap();
		let source = Arc::new(CountingSource::new());
		source.failing.store(true, Ordering::SeqCst);
		let service = service_with(source, &dir).await;

		assert!(matches!(
			service.get_catalog().await,
			Err(CoreError::ScrapeFailed(_))
		));
	}

	#[tokio::test]
	async fn test_cache_write_failure_fails_refresh() {
		let dir = TempDir::new().unwrap();
		let path = dir.path().join("catalog.bin");
		let cache = SnapshotStore::open(&path).await.unwrap();
		let service = CatalogService::new(Arc::new(CountingSource::new()), cache);

		// A directory where the temp file should go makes the write fail
		std::fs::create_dir(path.with_extension("tmp")).unwrap();

		assert!(matches!(
			service.refresh().await,
			Err(CoreError::StoreFailed(_))
		));
	}

	#[test]
	fn test_resolve_refresh_interval() {
		assert_eq!(resolve_refresh_interval("1h"), Duration::from_secs(3600));
		assert_eq!(resolve_refresh_interval("weekly"), DEFAULT_REFRESH_INTERVAL);
		assert_eq!(resolve_refresh_interval("0"), DEFAULT_REFRESH_INTERVAL);
	}

	#[tokio::test]
	async fn test_scheduler_refreshes_until_shutdown() {
		let dir = TempDir::new().unwrap();
		let source = Arc::new(CountingSource::new());
		let service = service_with(source.clone(), &dir).await;

		let lifecycle = crate::lifecycle::LifecycleManager::new();
		let handle = service.spawn_refresh_scheduler("20ms", lifecycle.watch());

		tokio::time::sleep(Duration::from_millis(150)).await;
		assert!(source.calls.load(Ordering::SeqCst) >= 1);

		lifecycle.transition(LifecycleState::Failed).unwrap();
		tokio::time::timeout(Duration::from_secs(1), handle)
			.await
			.unwrap()
			.unwrap();
	}

	#[tokio::test]
	async fn test_scheduler_survives_failed_refreshes() {
		let dir = TempDir::new().unwrap();
		let source = Arc::new(CountingSource::new());
		let service = service_with(source.clone(), &dir).await;
		service.refresh().await.unwrap();

		source.failing.store(true, Ordering::SeqCst);
		let lifecycle = crate::lifecycle::LifecycleManager::new();
		let handle = service.spawn_refresh_scheduler("20ms", lifecycle.watch());

		tokio::time::sleep(Duration::from_millis(200)).await;
		// One warm-up fetch plus at least two failed scheduled ones
		assert!(source.calls.load(Ordering::SeqCst) >= 3);
		assert!(!handle.is_finished());

		let catalog = service.get_catalog().await.unwrap();
		assert!(catalog.find_item("pizza").is_some());

		lifecycle.transition(LifecycleState::Failed).unwrap();
		tokio::time::timeout(Duration::from_secs(1), handle)
			.await
			.unwrap()
			.unwrap();
	}
}
