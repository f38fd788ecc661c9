//! Catalog source backed by a JSON file.
//!
//! Useful for running the service offline or pinning a known catalog.

use crate::{CatalogSourceInterface, SourceError};
use async_trait::async_trait;
use menu_types::Catalog;
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

/// Reads the catalog from a JSON document on every fetch.
pub struct FileCatalogSource {
	path: PathBuf,
}

impl FileCatalogSource {
	pub fn new(path: PathBuf) -> Self {
		Self { path }
	}

	/// Configuration parameters:
	/// - `path`: location of the JSON catalog (required)
	pub fn from_config(config: &toml::Value) -> Result<Self, SourceError> {
		let path = config
			.get("path")
			.and_then(|v| v.as_str())
			.ok_or_else(|| SourceError::Config("file source requires a `path`".to_string()))?;

		Ok(Self::new(PathBuf::from(path)))
	}
}

#[async_trait]
impl CatalogSourceInterface for FileCatalogSource {
	fn name(&self) -> &str {
		"file"
	}

	async fn fetch_catalog(&self) -> Result<Catalog, SourceError> {
		debug!("Reading catalog from {:?}", self.path);

		let content = fs::read_to_string(&self.path)
			.await
			.map_err(|e| SourceError::Io(format!("{}: {}", self.path.display(), e)))?;

		serde_json::from_str(&content)
			.map_err(|e| SourceError::Parse(format!("{}: {}", self.path.display(), e)))
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[tokio::test]
	async fn test_reads_catalog() {
		let temp_dir = TempDir::new().unwrap();
		let path = temp_dir.path().join("catalog.json");
		std::fs::write(
			&path,
			r#"{
				"categories": [{
					"id": "pizza",
					"name": "Pizza",
					"items": [{
						"id": "margherita",
						"title": "Margherita",
						"description": "",
						"price": "8,50 €",
						"variants": [{"name": "extra cheese", "description": ""}],
						"dips": ["garlic"]
					}]
				}],
				"drinks": []
			}"#,
		)
		.unwrap();

		let catalog = FileCatalogSource::new(path).fetch_catalog().await.unwrap();
		assert_eq!(catalog.item_count(), 1);
		assert!(catalog.find_item("margherita").unwrap().has_dip("garlic"));
	}

	#[tokio::test]
	async fn test_missing_file() {
		let temp_dir = TempDir::new().unwrap();
		let source = FileCatalogSource::new(temp_dir.path().join("missing.json"));
		assert!(matches!(source.fetch_catalog().await, Err(SourceError::Io(_))));
	}

	#[tokio::test]
	async fn test_malformed_file() {
		let temp_dir = TempDir::new().unwrap();
		let path = temp_dir.path().join("catalog.json");
		std::fs::write(&path, "{ not json").unwrap();

		let source = FileCatalogSource::new(path);
		assert!(matches!(source.fetch_catalog().await, Err(SourceError::Parse(_))));
	}
}
