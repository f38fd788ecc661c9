//! Configuration loading from files and environment.

use crate::types::MenuConfig;
use crate::ConfigError;
use regex::Regex;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Configuration loader with environment variable substitution
pub struct ConfigLoader {
	file_path: Option<PathBuf>,
	env_prefix: String,
}

impl Default for ConfigLoader {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			file_path: None,
			env_prefix: "MENU_".to_string(),
		}
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_path_buf());
		self
	}

	pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.env_prefix = prefix.into();
		self
	}

	/// Loads, overrides and validates the configuration.
	pub async fn load(&self) -> Result<MenuConfig, ConfigError> {
		let Some(file_path) = &self.file_path else {
			return Err(ConfigError::FileNotFound(
				"No configuration file specified".to_string(),
			));
		};

		info!("Loading configuration from {:?}", file_path);
		let mut config = self.load_from_file(file_path).await?;

		self.apply_env_overrides(&mut config)?;
		Self::validate(&config)?;

		Ok(config)
	}

	async fn load_from_file(&self, file_path: &Path) -> Result<MenuConfig, ConfigError> {
		if !file_path.exists() {
			return Err(ConfigError::FileNotFound(file_path.display().to_string()));
		}

		let content = tokio::fs::read_to_string(file_path).await?;
		let substituted = self.substitute_env_vars(&content)?;
		Self::from_toml(&substituted)
	}

	/// Parses a configuration from TOML without overrides or validation.
	pub fn from_toml(content: &str) -> Result<MenuConfig, ConfigError> {
		toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))
	}

	fn substitute_env_vars(&self, content: &str) -> Result<String, ConfigError> {
		let mut result = content.to_string();

		// Find and replace ${VAR_NAME} patterns
		let re = Regex::new(r"\$\{([^}]+)\}")
			.map_err(|e| ConfigError::ParseError(e.to_string()))?;

		for cap in re.captures_iter(content) {
			let full_match = &cap[0];
			let var_name = &cap[1];

			let env_value = env::var(var_name)
				.map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;

			result = result.replace(full_match, &env_value);
		}

		Ok(result)
	}

	fn apply_env_overrides(&self, config: &mut MenuConfig) -> Result<(), ConfigError> {
		let var = |name: &str| env::var(format!("{}{}", self.env_prefix, name)).ok();

		if let Some(log_level) = var("LOG_LEVEL") {
			debug!("Overriding log level from environment");
			config.service.log_level = log_level;
		}

		if let Some(http_port) = var("HTTP_PORT") {
			config.api.port = http_port
				.parse()
				.map_err(|e| ConfigError::ValidationError(format!("Invalid HTTP port: {}", e)))?;
		}

		if let Some(cache_dir) = var("CACHE_DIR") {
			debug!("Overriding cache directory from environment");
			config.cache.directory = PathBuf::from(cache_dir);
		}

		if let Some(interval) = var("REFRESH_INTERVAL") {
			config.cache.refresh_interval = interval;
		}

		Ok(())
	}

	/// Checks cross-field constraints.
	///
	/// The refresh interval is deliberately not checked here: an unparsable
	/// interval falls back to the default when the scheduler starts.
	pub fn validate(config: &MenuConfig) -> Result<(), ConfigError> {
		let level = config.service.log_level.to_lowercase();
		if !LOG_LEVELS.contains(&level.as_str()) {
			return Err(ConfigError::ValidationError(format!(
				"Unknown log level '{}'",
				config.service.log_level
			)));
		}

		if config.cache.directory.as_os_str().is_empty() {
			return Err(ConfigError::ValidationError(
				"cache.directory must not be empty".to_string(),
			));
		}

		match config.source.source_type.as_str() {
			"http" => {}
			"file" => {
				if config.source.settings.get("path").and_then(|v| v.as_str()).is_none() {
					return Err(ConfigError::ValidationError(
						"source.path is required for the file source".to_string(),
					));
				}
			}
			other => {
				return Err(ConfigError::ValidationError(format!(
					"Unknown source type '{}'",
					other
				)))
			}
		}

		if !matches!(config.storage.storage_type.as_str(), "memory" | "sqlite") {
			return Err(ConfigError::ValidationError(format!(
				"Unknown storage type '{}'",
				config.storage.storage_type
			)));
		}

		if config.api.host.is_empty() {
			return Err(ConfigError::ValidationError(
				"api.host must not be empty".to_string(),
			));
		}

		if config.api.max_request_size == 0 {
			return Err(ConfigError::ValidationError(
				"api.max_request_size must be greater than zero".to_string(),
			));
		}

		Ok(())
	}
}
