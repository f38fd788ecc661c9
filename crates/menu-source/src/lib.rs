//! Catalog sources for the menu ordering system.
//!
//! A source produces a complete catalog snapshot in a single call or fails
//! as a whole; partial catalogs are never returned. The HTTP source scrapes
//! the store's web pages, the file source reads a catalog exported as JSON.

use async_trait::async_trait;
use menu_types::Catalog;
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod file;
	pub mod http;
}

/// Errors that can occur while fetching a catalog.
#[derive(Debug, Error)]
pub enum SourceError {
	/// Error that occurs when the remote store cannot be reached or answers
	/// with a non-success status.
	#[error("HTTP error: {0}")]
	Http(String),
	/// Error that occurs when fetched content cannot be turned into a catalog.
	#[error("Parse error: {0}")]
	Parse(String),
	/// Error that occurs when reading a local catalog file.
	#[error("IO error: {0}")]
	Io(String),
	/// Error that occurs when the source is misconfigured.
	#[error("Configuration error: {0}")]
	Config(String),
}

/// Trait defining the interface for catalog sources.
///
/// Implementations must return a self-consistent snapshot or an error.
#[async_trait]
pub trait CatalogSourceInterface: Send + Sync {
	/// Short name of the source, used in logs.
	fn name(&self) -> &str;

	/// Fetches the current catalog.
	async fn fetch_catalog(&self) -> Result<Catalog, SourceError>;
}

/// Factory function to create a catalog source from configuration.
///
/// `source_type` selects the implementation (`http` or `file`); `config` is
/// the implementation-specific table.
pub fn create_source(
	source_type: &str,
	config: &toml::Value,
) -> Result<Box<dyn CatalogSourceInterface>, SourceError> {
	match source_type {
		"http" => Ok(Box::new(implementations::http::HttpCatalogSource::from_config(
			config,
		)?)),
		"file" => Ok(Box::new(implementations::file::FileCatalogSource::from_config(
			config,
		)?)),
		other => Err(SourceError::Config(format!(
			"Unknown catalog source type: {}",
			other
		))),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_create_source_by_type() {
		let empty = toml::Value::Table(Default::default());
		assert_eq!(create_source("http", &empty).unwrap().name(), "http");

		let file: toml::Value = toml::from_str(r#"path = "catalog.json""#).unwrap();
		assert_eq!(create_source("file", &file).unwrap().name(), "file");

		assert!(matches!(
			create_source("carrier-pigeon", &empty),
			Err(SourceError::Config(_))
		));
	}
}
