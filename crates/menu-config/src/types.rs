//! Configuration types for the menu service.

use crate::duration::parse_duration;
use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Name of the catalog snapshot file inside the cache directory.
pub const CATALOG_FILE: &str = "catalog.bin";

/// Complete service configuration.
///
/// Every section has defaults, so an empty file is a valid configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct MenuConfig {
	/// Service identity and logging
	pub service: ServiceSettings,
	/// Catalog snapshot cache
	pub cache: CacheConfig,
	/// Where catalogs come from
	pub source: SourceConfig,
	/// Durable order storage
	pub storage: StorageConfig,
	/// HTTP API
	pub api: ApiConfig,
}

/// Service identity and logging.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceSettings {
	pub name: String,
	/// Default log filter when `RUST_LOG` is unset
	pub log_level: String,
}

impl Default for ServiceSettings {
	fn default() -> Self {
		Self {
			name: "menu-service".to_string(),
			log_level: "info".to_string(),
		}
	}
}

/// Catalog cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
	/// Directory holding the snapshot file
	pub directory: PathBuf,
	/// Periodic refresh interval as a duration string, e.g. `168h` or `1h30m`
	pub refresh_interval: String,
}

impl Default for CacheConfig {
	fn default() -> Self {
		Self {
			directory: PathBuf::from("./data/cache"),
			refresh_interval: "168h".to_string(),
		}
	}
}

impl CacheConfig {
	/// Full path of the catalog snapshot file.
	pub fn file_path(&self) -> PathBuf {
		self.directory.join(CATALOG_FILE)
	}

	/// Parses the refresh interval.
	pub fn refresh_interval(&self) -> Result<Duration, ConfigError> {
		parse_duration(&self.refresh_interval)
	}
}

/// Catalog source selection plus implementation-specific settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
	/// `http` or `file`
	#[serde(rename = "type")]
	pub source_type: String,
	/// Remaining keys, forwarded untouched to the source factory
	#[serde(flatten)]
	pub settings: toml::Table,
}

impl Default for SourceConfig {
	fn default() -> Self {
		Self {
			source_type: "http".to_string(),
			settings: toml::Table::new(),
		}
	}
}

impl SourceConfig {
	pub fn settings_value(&self) -> toml::Value {
		toml::Value::Table(self.settings.clone())
	}
}

/// Order storage selection plus implementation-specific settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
	/// `memory` or `sqlite`
	#[serde(rename = "type")]
	pub storage_type: String,
	#[serde(flatten)]
	pub settings: toml::Table,
}

impl Default for StorageConfig {
	fn default() -> Self {
		let mut settings = toml::Table::new();
		settings.insert(
			"path".to_string(),
			toml::Value::String("./data/orders.sqlite".to_string()),
		);
		Self {
			storage_type: "sqlite".to_string(),
			settings,
		}
	}
}

impl StorageConfig {
	pub fn settings_value(&self) -> toml::Value {
		toml::Value::Table(self.settings.clone())
	}
}

/// HTTP API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ApiConfig {
	pub host: String,
	pub port: u16,
	/// Maximum accepted JSON body in bytes
	pub max_request_size: usize,
	/// Exposes destructive maintenance routes under `/api/dev`
	pub enable_dev_routes: bool,
	/// Optional directory with a web frontend served at `/`
	pub static_dir: Option<PathBuf>,
}

impl Default for ApiConfig {
	fn default() -> Self {
		Self {
			host: "0.0.0.0".to_string(),
			port: 8080,
			max_request_size: 1024 * 1024,
			enable_dev_routes: false,
			static_dir: None,
		}
	}
}

impl ApiConfig {
	pub fn bind_address(&self) -> String {
		format!("{}:{}", self.host, self.port)
	}
}
